use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use std::sync::Arc;

use flowrunner_secrets::SecretSummary;
use flowrunner_types::{AccountId, SecretSearchQuery, StructuredSecret};

use super::accounts::ensure_self;
use crate::auth::AuthenticatedAccount;
use crate::dto::secret::{
    SecretFieldResponse, SecretSearchRequest, SecretValueResponse, SetSecretRequest, SetTypedSecretRequest,
    UpdateSecretMetadataRequest,
};
use crate::error::ApiResult;
use crate::state::AppState;

pub async fn set_secret(
    State(state): State<Arc<AppState>>,
    auth: AuthenticatedAccount,
    Path((account_id, key)): Path<(AccountId, String)>,
    Json(request): Json<SetSecretRequest>,
) -> ApiResult<StatusCode> {
    ensure_self(&auth, &account_id)?;
    state.vault.set(&account_id, &key, &request.value).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn set_oauth_secret(
    State(state): State<Arc<AppState>>,
    auth: AuthenticatedAccount,
    Path((account_id, key)): Path<(AccountId, String)>,
    Json(request): Json<SetTypedSecretRequest>,
) -> ApiResult<StatusCode> {
    ensure_self(&auth, &account_id)?;
    state.vault.set_oauth(&account_id, &key, request.payload).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn set_api_key_secret(
    State(state): State<Arc<AppState>>,
    auth: AuthenticatedAccount,
    Path((account_id, key)): Path<(AccountId, String)>,
    Json(request): Json<SetTypedSecretRequest>,
) -> ApiResult<StatusCode> {
    ensure_self(&auth, &account_id)?;
    state.vault.set_api_key(&account_id, &key, request.payload).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn set_database_secret(
    State(state): State<Arc<AppState>>,
    auth: AuthenticatedAccount,
    Path((account_id, key)): Path<(AccountId, String)>,
    Json(request): Json<SetTypedSecretRequest>,
) -> ApiResult<StatusCode> {
    ensure_self(&auth, &account_id)?;
    state.vault.set_database(&account_id, &key, request.payload).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn set_jwt_secret(
    State(state): State<Arc<AppState>>,
    auth: AuthenticatedAccount,
    Path((account_id, key)): Path<(AccountId, String)>,
    Json(request): Json<SetTypedSecretRequest>,
) -> ApiResult<StatusCode> {
    ensure_self(&auth, &account_id)?;
    state.vault.set_jwt(&account_id, &key, request.payload).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn get_secret(
    State(state): State<Arc<AppState>>,
    auth: AuthenticatedAccount,
    Path((account_id, key)): Path<(AccountId, String)>,
) -> ApiResult<Json<SecretValueResponse>> {
    ensure_self(&auth, &account_id)?;
    let value = state.vault.get(&account_id, &key).await?;
    Ok(Json(SecretValueResponse { value }))
}

pub async fn get_structured_secret(
    State(state): State<Arc<AppState>>,
    auth: AuthenticatedAccount,
    Path((account_id, key)): Path<(AccountId, String)>,
) -> ApiResult<Json<StructuredSecret>> {
    ensure_self(&auth, &account_id)?;
    let secret = state.vault.get_structured(&account_id, &key).await?;
    Ok(Json(secret))
}

pub async fn get_secret_field(
    State(state): State<Arc<AppState>>,
    auth: AuthenticatedAccount,
    Path((account_id, key, field)): Path<(AccountId, String, String)>,
) -> ApiResult<Json<SecretFieldResponse>> {
    ensure_self(&auth, &account_id)?;
    let value = state.vault.get_field(&account_id, &key, &field).await?;
    Ok(Json(SecretFieldResponse { value }))
}

pub async fn delete_secret(
    State(state): State<Arc<AppState>>,
    auth: AuthenticatedAccount,
    Path((account_id, key)): Path<(AccountId, String)>,
) -> ApiResult<StatusCode> {
    ensure_self(&auth, &account_id)?;
    state.vault.delete(&account_id, &key).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_secrets(
    State(state): State<Arc<AppState>>,
    auth: AuthenticatedAccount,
    Path(account_id): Path<AccountId>,
) -> ApiResult<Json<Vec<SecretSummary>>> {
    ensure_self(&auth, &account_id)?;
    let secrets = state.vault.list(&account_id).await?;
    Ok(Json(secrets))
}

pub async fn search_secrets(
    State(state): State<Arc<AppState>>,
    auth: AuthenticatedAccount,
    Path(account_id): Path<AccountId>,
    Json(request): Json<SecretSearchRequest>,
) -> ApiResult<Json<Vec<SecretSummary>>> {
    ensure_self(&auth, &account_id)?;
    let query = SecretSearchQuery::from(request);
    let secrets = state.vault.search(&account_id, &query).await?;
    Ok(Json(secrets))
}

pub async fn update_secret_metadata(
    State(state): State<Arc<AppState>>,
    auth: AuthenticatedAccount,
    Path((account_id, key)): Path<(AccountId, String)>,
    Json(request): Json<UpdateSecretMetadataRequest>,
) -> ApiResult<StatusCode> {
    ensure_self(&auth, &account_id)?;
    state
        .vault
        .update_metadata(&account_id, &key, request.tags, request.expires_at)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
