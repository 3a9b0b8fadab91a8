use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use std::sync::Arc;

use flowrunner_types::{ExecutionId, ExecutionStatusView, LogEntry};

use crate::auth::AuthenticatedAccount;
use crate::error::ApiResult;
use crate::state::AppState;

pub async fn get_execution(
    State(state): State<Arc<AppState>>,
    AuthenticatedAccount(account): AuthenticatedAccount,
    Path(execution_id): Path<ExecutionId>,
) -> ApiResult<Json<ExecutionStatusView>> {
    let status = state.engine.get_status(&account.id, &execution_id).await?;
    Ok(Json(status))
}

pub async fn get_execution_logs(
    State(state): State<Arc<AppState>>,
    AuthenticatedAccount(account): AuthenticatedAccount,
    Path(execution_id): Path<ExecutionId>,
) -> ApiResult<Json<Vec<LogEntry>>> {
    let logs = state.engine.get_logs(&account.id, &execution_id).await?;
    Ok(Json(logs))
}

pub async fn cancel_execution(
    State(state): State<Arc<AppState>>,
    AuthenticatedAccount(account): AuthenticatedAccount,
    Path(execution_id): Path<ExecutionId>,
) -> ApiResult<StatusCode> {
    state.engine.cancel(&account.id, &execution_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
