use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use flowrunner_types::{JsonValue, SecretSearchQuery, SecretType};

#[derive(Debug, Clone, Deserialize)]
pub struct SetSecretRequest {
    pub value: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SetTypedSecretRequest {
    pub payload: JsonValue,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateSecretMetadataRequest {
    #[serde(default)]
    pub tags: Option<Vec<String>>,
    /// Double `Option`: absent means "leave untouched", `null` means "clear
    /// the expiry", a value means "set it".
    #[serde(default)]
    pub expires_at: Option<Option<DateTime<Utc>>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SecretSearchRequest {
    #[serde(default)]
    pub key_contains: Option<String>,
    #[serde(default)]
    pub secret_type: Option<SecretType>,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl From<SecretSearchRequest> for SecretSearchQuery {
    fn from(req: SecretSearchRequest) -> Self {
        Self {
            key_contains: req.key_contains,
            secret_type: req.secret_type,
            tags: req.tags,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SecretValueResponse {
    pub value: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SecretFieldResponse {
    pub value: JsonValue,
}
