use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use std::sync::Arc;

use flowrunner_types::AccountInfo;

use crate::dto::auth::{CreateAccountRequest, LoginRequest, LoginResponse};
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(request): Json<LoginRequest>,
) -> ApiResult<Json<LoginResponse>> {
    let account = state.accounts.login(&request.username, &request.password).await?;
    tracing::info!(account_id = %account.id, "account logged in");
    Ok(Json(LoginResponse {
        token: account.api_token,
    }))
}

pub async fn create_account(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CreateAccountRequest>,
) -> ApiResult<(StatusCode, Json<AccountInfo>)> {
    if request.username.trim().is_empty() {
        return Err(ApiError::InvalidRequest("username must not be empty".to_string()));
    }
    let account = state
        .accounts
        .create_account(&request.username, &request.password)
        .await?;
    tracing::info!(account_id = %account.id, "account created");
    Ok((StatusCode::CREATED, Json(AccountInfo::from(&account))))
}
