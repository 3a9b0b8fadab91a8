//! Bearer-or-Basic authentication (spec §6): authenticated routes accept
//! either `Authorization: Bearer <api_token>` or `Authorization: Basic
//! <username:password>`; `OPTIONS` requests bypass auth entirely so CORS
//! preflights never hit the account service.

use axum::extract::{FromRequestParts, State};
use axum::http::request::Parts;
use axum::http::Method;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use std::sync::Arc;

use flowrunner_types::{Account, AccountId};

use crate::error::ApiError;
use crate::state::AppState;

/// The authenticated account for the current request, attached to request
/// extensions by [`authenticate_middleware`].
#[derive(Debug, Clone)]
pub struct AuthenticatedAccount(pub Account);

impl AuthenticatedAccount {
    pub fn id(&self) -> &AccountId {
        &self.0.id
    }
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for AuthenticatedAccount
where
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthenticatedAccount>()
            .cloned()
            .ok_or_else(|| ApiError::Unauthenticated.into_response())
    }
}

/// Resolves the caller's account from the `Authorization` header and, on
/// success, applies the account's API rate limit before running the rest of
/// the chain. `OPTIONS` requests (CORS preflight) skip both checks.
pub async fn authenticate_middleware(
    State(state): State<Arc<AppState>>,
    mut req: axum::extract::Request,
    next: Next,
) -> Result<Response, Response> {
    if req.method() == Method::OPTIONS {
        return Ok(next.run(req).await);
    }

    let account = match authenticate(&state, req.headers()).await {
        Ok(account) => account,
        Err(err) => return Err(err.into_response()),
    };

    if let Err(err) = state.accounts.rate_limiter.check_account_limit(account.id.as_str()).await {
        return Err(ApiError::from(err).into_response());
    }

    req.extensions_mut().insert(AuthenticatedAccount(account));
    Ok(next.run(req).await)
}

async fn authenticate(state: &AppState, headers: &axum::http::HeaderMap) -> Result<Account, ApiError> {
    let header = headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or(ApiError::Unauthenticated)?;

    if let Some(token) = header.strip_prefix("Bearer ") {
        return Ok(state.accounts.authenticate_token(token).await?);
    }

    if let Some(encoded) = header.strip_prefix("Basic ") {
        let decoded = BASE64
            .decode(encoded)
            .map_err(|_| ApiError::Unauthenticated)?;
        let decoded = String::from_utf8(decoded).map_err(|_| ApiError::Unauthenticated)?;
        let (username, password) = decoded.split_once(':').ok_or(ApiError::Unauthenticated)?;
        return Ok(state.accounts.login(username, password).await?);
    }

    Err(ApiError::Unauthenticated)
}
