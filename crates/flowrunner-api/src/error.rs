use axum::body::Body;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};

use flowrunner_auth::AccountError;
use flowrunner_engine::EngineError;
use flowrunner_loader::LoaderError;
use flowrunner_secrets::VaultError;
use flowrunner_storage::StorageError;

pub type ApiResult<T> = Result<T, ApiError>;

/// Every error kind the HTTP/WebSocket surface can produce (spec §7).
/// `SecretNotFound`/`NodeFailed`/`Cancelled`/`Timeout` never escape a
/// `Runtime` call directly — they only ever show up inside a terminal
/// execution's `error` string — but `From<EngineError>` still folds them
/// somewhere sane in case a future caller surfaces the raw error.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("authentication required")]
    Unauthenticated,

    #[error("not permitted")]
    Unauthorized,

    #[error("not found")]
    NotFound,

    #[error("invalid flow: {0}")]
    InvalidFlow(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("rate limit exceeded, retry in {retry_after}s")]
    RateLimited { retry_after: u64 },

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("service unavailable")]
    ServiceUnavailable,

    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Unauthenticated => StatusCode::UNAUTHORIZED,
            Self::Unauthorized => StatusCode::FORBIDDEN,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::InvalidFlow(_) | Self::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            Self::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::ServiceUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Unauthenticated => "UNAUTHENTICATED",
            Self::Unauthorized => "UNAUTHORIZED",
            Self::NotFound => "NOT_FOUND",
            Self::InvalidFlow(_) => "INVALID_FLOW",
            Self::InvalidRequest(_) => "INVALID_REQUEST",
            Self::RateLimited { .. } => "RATE_LIMITED",
            Self::Conflict(_) => "CONFLICT",
            Self::ServiceUnavailable => "SERVICE_UNAVAILABLE",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    pub fn is_server_error(&self) -> bool {
        self.status_code().as_u16() >= 500
    }

    /// Message safe to return to a client: never echoes storage/internal detail.
    pub fn client_message(&self) -> String {
        match self {
            Self::Internal(_) | Self::ServiceUnavailable => "an internal error occurred".to_string(),
            _ => self.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after: Option<u64>,
}

impl From<&ApiError> for ErrorResponse {
    fn from(error: &ApiError) -> Self {
        let retry_after = match error {
            ApiError::RateLimited { retry_after } => Some(*retry_after),
            _ => None,
        };
        Self {
            code: error.error_code().to_string(),
            message: error.client_message(),
            retry_after,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.is_server_error() {
            tracing::error!(error = %self, code = self.error_code(), "request failed");
        }

        let status = self.status_code();
        let body = ErrorResponse::from(&self);
        let mut response = Response::builder()
            .status(status)
            .header("Content-Type", "application/json");

        if let ApiError::RateLimited { retry_after } = &self {
            response = response.header("Retry-After", retry_after.to_string());
        }

        response
            .body(Body::from(serde_json::to_vec(&body).unwrap_or_default()))
            .unwrap_or_else(|_| Response::new(Body::empty()))
    }
}

impl From<AccountError> for ApiError {
    fn from(err: AccountError) -> Self {
        match err {
            AccountError::InvalidCredentials | AccountError::InvalidToken => ApiError::Unauthenticated,
            AccountError::WeakPassword(msg) => ApiError::InvalidRequest(msg),
            AccountError::UsernameTaken => ApiError::Conflict("username already taken".to_string()),
            AccountError::NotFound => ApiError::NotFound,
            AccountError::RateLimitExceeded { retry_after } | AccountError::AccountLocked { retry_after } => {
                ApiError::RateLimited { retry_after }
            }
            AccountError::Storage(_) | AccountError::Internal(_) => ApiError::Internal(err.to_string()),
        }
    }
}

impl From<EngineError> for ApiError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::FlowNotFound | EngineError::ExecutionNotFound => ApiError::NotFound,
            EngineError::InvalidFlow(loader_err) => ApiError::InvalidFlow(loader_err.to_string()),
            EngineError::SecretNotFound(_)
            | EngineError::NodeFailed { .. }
            | EngineError::Cancelled
            | EngineError::Timeout
            | EngineError::Storage(_)
            | EngineError::Internal(_) => ApiError::Internal(err.to_string()),
        }
    }
}

impl From<LoaderError> for ApiError {
    fn from(err: LoaderError) -> Self {
        ApiError::InvalidFlow(err.to_string())
    }
}

impl From<VaultError> for ApiError {
    fn from(err: VaultError) -> Self {
        match err {
            VaultError::NotFound => ApiError::NotFound,
            VaultError::NoSuchField(key, field) => {
                ApiError::InvalidRequest(format!("secret '{key}' has no field '{field}'"))
            }
            // Never surfaced as NotFound: that would let a caller distinguish
            // "wrong key" from "no such secret" by response shape (spec §7).
            VaultError::DecryptionFailed | VaultError::Storage(_) | VaultError::Serialization(_) => {
                ApiError::Internal(err.to_string())
            }
        }
    }
}

impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound => ApiError::NotFound,
            StorageError::Conflict(msg) => ApiError::Conflict(msg),
            StorageError::Internal(msg) => ApiError::Internal(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes() {
        assert_eq!(ApiError::Unauthenticated.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(ApiError::NotFound.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(
            ApiError::RateLimited { retry_after: 30 }.status_code(),
            StatusCode::TOO_MANY_REQUESTS
        );
    }

    #[test]
    fn client_message_hides_internal_detail() {
        let err = ApiError::Internal("pool exhausted: password=hunter2".to_string());
        assert!(!err.client_message().contains("hunter2"));
    }

    #[test]
    fn decryption_failure_never_reads_as_not_found() {
        let err: ApiError = VaultError::DecryptionFailed.into();
        assert_ne!(err.status_code(), StatusCode::NOT_FOUND);
    }
}
