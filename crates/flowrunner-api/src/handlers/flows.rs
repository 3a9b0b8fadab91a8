use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use std::sync::Arc;

use flowrunner_types::{ExecutionStatus, Flow, FlowId, FlowInfo, FlowMetadata};

use crate::auth::AuthenticatedAccount;
use crate::dto::flow::{
    CreateFlowRequest, FlowSearchRequest, RunFlowRequest, RunFlowResponse, UpdateFlowMetadataRequest,
    UpdateFlowRequest,
};
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

fn derive_metadata(state: &AppState, yaml: &str) -> ApiResult<FlowMetadata> {
    let (_graph, metadata) = flowrunner_loader::load(yaml, &state.registry.known_types())?;
    Ok(metadata)
}

pub async fn create_flow(
    State(state): State<Arc<AppState>>,
    AuthenticatedAccount(account): AuthenticatedAccount,
    Json(request): Json<CreateFlowRequest>,
) -> ApiResult<(StatusCode, Json<FlowInfo>)> {
    let metadata = derive_metadata(&state, &request.yaml)?;
    let now = Utc::now();
    let flow = Flow {
        id: FlowId::new(),
        account_id: account.id.clone(),
        yaml: request.yaml,
        metadata,
        created_at: now,
        updated_at: now,
    };
    let created = state.store.create_flow(flow).await?;
    Ok((StatusCode::CREATED, Json(FlowInfo::from(&created))))
}

pub async fn list_flows(
    State(state): State<Arc<AppState>>,
    AuthenticatedAccount(account): AuthenticatedAccount,
) -> ApiResult<Json<Vec<FlowInfo>>> {
    let flows = state.store.list_flows(&account.id).await?;
    Ok(Json(flows.iter().map(FlowInfo::from).collect()))
}

pub async fn get_flow(
    State(state): State<Arc<AppState>>,
    AuthenticatedAccount(account): AuthenticatedAccount,
    Path(flow_id): Path<FlowId>,
) -> ApiResult<Json<Flow>> {
    let flow = state.store.get_flow(&account.id, &flow_id).await?;
    Ok(Json(flow))
}

pub async fn update_flow(
    State(state): State<Arc<AppState>>,
    AuthenticatedAccount(account): AuthenticatedAccount,
    Path(flow_id): Path<FlowId>,
    Json(request): Json<UpdateFlowRequest>,
) -> ApiResult<Json<Flow>> {
    let existing = state.store.get_flow(&account.id, &flow_id).await?;
    let metadata = derive_metadata(&state, &request.yaml)?;
    let updated = Flow {
        id: flow_id,
        account_id: account.id,
        yaml: request.yaml,
        metadata,
        created_at: existing.created_at,
        updated_at: Utc::now(),
    };
    let saved = state.store.update_flow(updated).await?;
    Ok(Json(saved))
}

pub async fn update_flow_metadata(
    State(state): State<Arc<AppState>>,
    AuthenticatedAccount(account): AuthenticatedAccount,
    Path(flow_id): Path<FlowId>,
    Json(request): Json<UpdateFlowMetadataRequest>,
) -> ApiResult<Json<Flow>> {
    let mut flow = state.store.get_flow(&account.id, &flow_id).await?;
    if let Some(name) = request.name {
        flow.metadata.name = name;
    }
    if let Some(description) = request.description {
        flow.metadata.description = Some(description);
    }
    if let Some(version) = request.version {
        flow.metadata.version = Some(version);
    }
    if let Some(tags) = request.tags {
        flow.metadata.tags = tags;
    }
    flow.updated_at = Utc::now();
    let saved = state.store.update_flow(flow).await?;
    Ok(Json(saved))
}

pub async fn delete_flow(
    State(state): State<Arc<AppState>>,
    AuthenticatedAccount(account): AuthenticatedAccount,
    Path(flow_id): Path<FlowId>,
) -> ApiResult<StatusCode> {
    state.store.delete_flow(&account.id, &flow_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn search_flows(
    State(state): State<Arc<AppState>>,
    AuthenticatedAccount(account): AuthenticatedAccount,
    Json(request): Json<FlowSearchRequest>,
) -> ApiResult<Json<Vec<FlowInfo>>> {
    let query = flowrunner_types::FlowSearchQuery::from(request);
    let flows = state.store.list_flows(&account.id).await?;
    let matched = flows
        .iter()
        .map(FlowInfo::from)
        .filter(|info| query.matches(info))
        .collect();
    Ok(Json(matched))
}

pub async fn run_flow(
    State(state): State<Arc<AppState>>,
    AuthenticatedAccount(account): AuthenticatedAccount,
    Path(flow_id): Path<FlowId>,
    Json(request): Json<RunFlowRequest>,
) -> ApiResult<(StatusCode, Json<RunFlowResponse>)> {
    let execution_id = state.engine.execute(&account.id, &flow_id, request.input).await?;
    Ok((
        StatusCode::CREATED,
        Json(RunFlowResponse {
            execution_id,
            status: ExecutionStatus::Running,
        }),
    ))
}

