use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::JsonValue;

/// The secret's payload shape. `Opaque` is a bare string value (the common
/// case: `${secret.KEY}` resolves to one of these); the typed variants carry
/// a structured payload so callers can address individual fields (see
/// `get_field` on the vault) without re-parsing a string blob.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SecretType {
    Opaque,
    Oauth,
    ApiKey,
    Database,
    Jwt,
    Custom,
}

impl SecretType {
    pub fn as_str(self) -> &'static str {
        match self {
            SecretType::Opaque => "opaque",
            SecretType::Oauth => "oauth",
            SecretType::ApiKey => "api_key",
            SecretType::Database => "database",
            SecretType::Jwt => "jwt",
            SecretType::Custom => "custom",
        }
    }
}

/// Cleartext metadata kept alongside a secret's ciphertext, enabling search
/// and expiry scans without touching the encrypted payload.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SecretMetadata {
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_used_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SecretMetadata {
    pub fn new_now() -> Self {
        let now = Utc::now();
        Self {
            tags: Vec::new(),
            expires_at: None,
            last_used_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_expiring_within(&self, horizon: chrono::Duration) -> bool {
        match self.expires_at {
            Some(expires_at) => expires_at <= Utc::now() + horizon,
            None => false,
        }
    }
}

/// A decrypted secret as returned by the vault's `get_structured`/`set_*`
/// APIs. The vault never persists this shape directly — only the ciphertext
/// of `payload` plus `metadata` in cleartext (see `flowrunner-secrets`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StructuredSecret {
    pub key: String,
    pub secret_type: SecretType,
    pub payload: JsonValue,
    pub metadata: SecretMetadata,
}

/// Filter used by `SecretVault::search`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SecretSearchQuery {
    #[serde(default)]
    pub key_contains: Option<String>,
    #[serde(default)]
    pub secret_type: Option<SecretType>,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl SecretSearchQuery {
    pub fn matches(&self, key: &str, secret_type: SecretType, metadata: &SecretMetadata) -> bool {
        if let Some(needle) = &self.key_contains {
            if !key.to_lowercase().contains(&needle.to_lowercase()) {
                return false;
            }
        }
        if let Some(wanted) = self.secret_type {
            if wanted != secret_type {
                return false;
            }
        }
        if !self.tags.is_empty() && !self.tags.iter().all(|t| metadata.tags.contains(t)) {
            return false;
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expiry_check_respects_horizon() {
        let mut metadata = SecretMetadata::new_now();
        metadata.expires_at = Some(Utc::now() + chrono::Duration::minutes(5));
        assert!(metadata.is_expiring_within(chrono::Duration::minutes(10)));
        assert!(!metadata.is_expiring_within(chrono::Duration::minutes(1)));
    }

    #[test]
    fn search_query_filters_by_type_and_tags() {
        let mut metadata = SecretMetadata::new_now();
        metadata.tags = vec!["prod".to_string(), "llm".to_string()];

        let query = SecretSearchQuery {
            key_contains: Some("OPENAI".to_string()),
            secret_type: Some(SecretType::ApiKey),
            tags: vec!["prod".to_string()],
        };
        assert!(query.matches("OPENAI_API_KEY", SecretType::ApiKey, &metadata));
        assert!(!query.matches("OPENAI_API_KEY", SecretType::Oauth, &metadata));
        assert!(!query.matches("AWS_KEY", SecretType::ApiKey, &metadata));
    }
}
