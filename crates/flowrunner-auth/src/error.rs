use serde::{Deserialize, Serialize};
use thiserror::Error;

pub type AccountResult<T> = Result<T, AccountError>;

#[derive(Debug, Error)]
pub enum AccountError {
    // =========================================================================
    // Credential errors
    // =========================================================================
    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("invalid or unknown bearer token")]
    InvalidToken,

    #[error("password does not meet requirements: {0}")]
    WeakPassword(String),

    // =========================================================================
    // Account state errors
    // =========================================================================
    #[error("username already taken")]
    UsernameTaken,

    #[error("account not found")]
    NotFound,

    // =========================================================================
    // Rate limiting
    // =========================================================================
    #[error("rate limit exceeded, retry in {retry_after}s")]
    RateLimitExceeded { retry_after: u64 },

    #[error("account locked, retry in {retry_after}s")]
    AccountLocked { retry_after: u64 },

    // =========================================================================
    // Internal
    // =========================================================================
    #[error("storage error: {0}")]
    Storage(#[from] flowrunner_storage::StorageError),

    #[error("internal error: {0}")]
    Internal(String),
}

impl AccountError {
    pub fn status_code(&self) -> u16 {
        match self {
            Self::InvalidCredentials | Self::InvalidToken => 401,
            Self::WeakPassword(_) => 400,
            Self::UsernameTaken => 409,
            Self::NotFound => 404,
            Self::RateLimitExceeded { .. } | Self::AccountLocked { .. } => 429,
            Self::Storage(_) | Self::Internal(_) => 500,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidCredentials => "INVALID_CREDENTIALS",
            Self::InvalidToken => "INVALID_TOKEN",
            Self::WeakPassword(_) => "WEAK_PASSWORD",
            Self::UsernameTaken => "USERNAME_TAKEN",
            Self::NotFound => "ACCOUNT_NOT_FOUND",
            Self::RateLimitExceeded { .. } => "RATE_LIMIT_EXCEEDED",
            Self::AccountLocked { .. } => "ACCOUNT_LOCKED",
            Self::Storage(_) | Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    pub fn is_server_error(&self) -> bool {
        self.status_code() >= 500
    }

    /// Message safe to return to a client: never echoes storage/internal detail.
    pub fn client_message(&self) -> String {
        match self {
            Self::Storage(_) | Self::Internal(_) => "an internal error occurred".to_string(),
            _ => self.to_string(),
        }
    }

    pub fn rate_limited(retry_after: std::time::Duration) -> Self {
        Self::RateLimitExceeded {
            retry_after: retry_after.as_secs(),
        }
    }

    pub fn account_locked(retry_after: std::time::Duration) -> Self {
        Self::AccountLocked {
            retry_after: retry_after.as_secs(),
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

impl From<&AccountError> for ErrorResponse {
    fn from(error: &AccountError) -> Self {
        let retry_after = match error {
            AccountError::RateLimitExceeded { retry_after } => Some(*retry_after),
            AccountError::AccountLocked { retry_after } => Some(*retry_after),
            _ => None,
        };
        Self {
            code: error.error_code().to_string(),
            message: error.client_message(),
            retry_after,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes() {
        assert_eq!(AccountError::InvalidCredentials.status_code(), 401);
        assert_eq!(AccountError::UsernameTaken.status_code(), 409);
        assert_eq!(
            AccountError::RateLimitExceeded { retry_after: 30 }.status_code(),
            429
        );
    }

    #[test]
    fn client_message_hides_internal_detail() {
        let err = AccountError::Internal("pool exhausted: password=hunter2".to_string());
        assert!(!err.client_message().contains("hunter2"));
    }
}
