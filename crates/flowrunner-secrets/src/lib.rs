//! Per-account secret vault: typed, encrypted-at-rest secrets addressable by
//! key, with `${secret.KEY}` resolution into flow node parameters.
//!
//! The vault never persists plaintext. `flowrunner-storage::SecretRecord`
//! carries ciphertext + nonce (hex) and cleartext `SecretMetadata`; this
//! crate is the only place that ever calls `flowrunner-crypto` to open one.

pub mod error;

use std::sync::Arc;

use chrono::Duration;
use flowrunner_crypto::{CryptoError, EncryptedPayload, SecretCipher};
use flowrunner_storage::{SecretRecord, StorageProvider};
use flowrunner_types::{AccountId, JsonValue, SecretMetadata, SecretSearchQuery, SecretType, StructuredSecret};
use tokio::sync::RwLock;

pub use error::{VaultError, VaultResult};

/// Listing-oriented projection of a secret: everything except the decrypted
/// payload, so `list`/`search`/`get_expiring` never touch the cipher.
#[derive(Debug, Clone, serde::Serialize)]
pub struct SecretSummary {
    pub key: String,
    pub secret_type: SecretType,
    pub metadata: SecretMetadata,
}

impl From<&SecretRecord> for SecretSummary {
    fn from(record: &SecretRecord) -> Self {
        Self {
            key: record.key.clone(),
            secret_type: record.secret_type,
            metadata: record.metadata.clone(),
        }
    }
}

/// The secret vault. One `SecretVault` is shared process-wide; the cipher is
/// behind an `RwLock` so `rotate_encryption_key` can swap it out while
/// in-flight reads take the old key under a shared lock.
pub struct SecretVault {
    store: Arc<dyn StorageProvider>,
    cipher: RwLock<Arc<SecretCipher>>,
}

impl SecretVault {
    pub fn new(store: Arc<dyn StorageProvider>, master_key: &[u8]) -> Result<Self, CryptoError> {
        let cipher = SecretCipher::new(master_key)?;
        Ok(Self {
            store,
            cipher: RwLock::new(Arc::new(cipher)),
        })
    }

    async fn current_cipher(&self) -> Arc<SecretCipher> {
        self.cipher.read().await.clone()
    }

    async fn encrypt_payload(&self, payload: &JsonValue) -> VaultResult<(String, String)> {
        let plaintext = serde_json::to_vec(payload)?;
        let cipher = self.current_cipher().await;
        let encrypted = cipher
            .encrypt(&plaintext)
            .map_err(|_| VaultError::Storage(flowrunner_storage::StorageError::Internal(
                "encryption failed".to_string(),
            )))?;
        Ok(encrypted.to_hex())
    }

    async fn decrypt_record(&self, record: &SecretRecord) -> VaultResult<JsonValue> {
        let payload = EncryptedPayload::from_hex(&record.nonce_hex, &record.ciphertext_hex)
            .map_err(|_| VaultError::DecryptionFailed)?;
        let cipher = self.current_cipher().await;
        let plaintext = cipher.decrypt(&payload).map_err(|_| VaultError::DecryptionFailed)?;
        let value: JsonValue = serde_json::from_slice(&plaintext)?;
        Ok(value)
    }

    async fn set_typed(
        &self,
        account_id: &AccountId,
        key: &str,
        secret_type: SecretType,
        payload: JsonValue,
        tags: Vec<String>,
        expires_at: Option<chrono::DateTime<chrono::Utc>>,
    ) -> VaultResult<()> {
        let (nonce_hex, ciphertext_hex) = self.encrypt_payload(&payload).await?;
        let metadata = match self.store.get_secret(account_id, key).await {
            Ok(existing) => SecretMetadata {
                tags,
                expires_at,
                last_used_at: existing.metadata.last_used_at,
                created_at: existing.metadata.created_at,
                updated_at: chrono::Utc::now(),
            },
            Err(_) => SecretMetadata {
                tags,
                expires_at,
                ..SecretMetadata::new_now()
            },
        };

        self.store
            .put_secret(SecretRecord {
                account_id: account_id.clone(),
                key: key.to_string(),
                secret_type,
                nonce_hex,
                ciphertext_hex,
                metadata,
            })
            .await?;
        tracing::info!(account_id = %account_id, key = %key, secret_type = secret_type.as_str(), "secret set");
        Ok(())
    }

    /// Set an opaque string secret, the common case for `${secret.KEY}`.
    pub async fn set(&self, account_id: &AccountId, key: &str, value: &str) -> VaultResult<()> {
        self.set_typed(account_id, key, SecretType::Opaque, JsonValue::String(value.to_string()), Vec::new(), None)
            .await
    }

    pub async fn set_oauth(&self, account_id: &AccountId, key: &str, payload: JsonValue) -> VaultResult<()> {
        self.set_typed(account_id, key, SecretType::Oauth, payload, Vec::new(), None).await
    }

    pub async fn set_api_key(&self, account_id: &AccountId, key: &str, payload: JsonValue) -> VaultResult<()> {
        self.set_typed(account_id, key, SecretType::ApiKey, payload, Vec::new(), None).await
    }

    pub async fn set_database(&self, account_id: &AccountId, key: &str, payload: JsonValue) -> VaultResult<()> {
        self.set_typed(account_id, key, SecretType::Database, payload, Vec::new(), None).await
    }

    pub async fn set_jwt(&self, account_id: &AccountId, key: &str, payload: JsonValue) -> VaultResult<()> {
        self.set_typed(account_id, key, SecretType::Jwt, payload, Vec::new(), None).await
    }

    pub async fn set_custom(&self, account_id: &AccountId, key: &str, payload: JsonValue) -> VaultResult<()> {
        self.set_typed(account_id, key, SecretType::Custom, payload, Vec::new(), None).await
    }

    /// Decrypted opaque value. Returns `Err` for any non-string payload
    /// rather than silently stringifying a structured secret.
    pub async fn get(&self, account_id: &AccountId, key: &str) -> VaultResult<String> {
        let record = self.store.get_secret(account_id, key).await.map_err(|_| VaultError::NotFound)?;
        let value = self.decrypt_record(&record).await?;
        value
            .as_str()
            .map(|s| s.to_string())
            .ok_or_else(|| VaultError::NoSuchField(key.to_string(), "<string value>".to_string()))
    }

    pub async fn get_structured(&self, account_id: &AccountId, key: &str) -> VaultResult<StructuredSecret> {
        let record = self.store.get_secret(account_id, key).await.map_err(|_| VaultError::NotFound)?;
        let payload = self.decrypt_record(&record).await?;
        Ok(StructuredSecret {
            key: record.key,
            secret_type: record.secret_type,
            payload,
            metadata: record.metadata,
        })
    }

    pub async fn get_field(&self, account_id: &AccountId, key: &str, field: &str) -> VaultResult<JsonValue> {
        let secret = self.get_structured(account_id, key).await?;
        secret
            .payload
            .get(field)
            .cloned()
            .ok_or_else(|| VaultError::NoSuchField(key.to_string(), field.to_string()))
    }

    pub async fn delete(&self, account_id: &AccountId, key: &str) -> VaultResult<()> {
        self.store.delete_secret(account_id, key).await.map_err(|_| VaultError::NotFound)?;
        tracing::info!(account_id = %account_id, key = %key, "secret deleted");
        Ok(())
    }

    pub async fn list(&self, account_id: &AccountId) -> VaultResult<Vec<SecretSummary>> {
        let records = self.store.list_secrets(account_id).await?;
        Ok(records.iter().map(SecretSummary::from).collect())
    }

    pub async fn list_by_type(&self, account_id: &AccountId, secret_type: SecretType) -> VaultResult<Vec<SecretSummary>> {
        Ok(self
            .list(account_id)
            .await?
            .into_iter()
            .filter(|s| s.secret_type == secret_type)
            .collect())
    }

    pub async fn list_by_tags(&self, account_id: &AccountId, tags: &[String]) -> VaultResult<Vec<SecretSummary>> {
        Ok(self
            .list(account_id)
            .await?
            .into_iter()
            .filter(|s| tags.iter().all(|t| s.metadata.tags.contains(t)))
            .collect())
    }

    pub async fn search(&self, account_id: &AccountId, query: &SecretSearchQuery) -> VaultResult<Vec<SecretSummary>> {
        Ok(self
            .list(account_id)
            .await?
            .into_iter()
            .filter(|s| query.matches(&s.key, s.secret_type, &s.metadata))
            .collect())
    }

    pub async fn get_expiring(&self, account_id: &AccountId, horizon: Duration) -> VaultResult<Vec<SecretSummary>> {
        Ok(self
            .list(account_id)
            .await?
            .into_iter()
            .filter(|s| s.metadata.is_expiring_within(horizon))
            .collect())
    }

    /// Merge `tags`/`expires_at` into a secret's metadata without touching
    /// its encrypted payload.
    pub async fn update_metadata(
        &self,
        account_id: &AccountId,
        key: &str,
        tags: Option<Vec<String>>,
        expires_at: Option<Option<chrono::DateTime<chrono::Utc>>>,
    ) -> VaultResult<()> {
        let mut record = self.store.get_secret(account_id, key).await.map_err(|_| VaultError::NotFound)?;
        if let Some(tags) = tags {
            record.metadata.tags = tags;
        }
        if let Some(expires_at) = expires_at {
            record.metadata.expires_at = expires_at;
        }
        record.metadata.updated_at = chrono::Utc::now();
        self.store.put_secret(record).await?;
        Ok(())
    }

    pub async fn mark_used(&self, account_id: &AccountId, key: &str) -> VaultResult<()> {
        let mut record = self.store.get_secret(account_id, key).await.map_err(|_| VaultError::NotFound)?;
        record.metadata.last_used_at = Some(chrono::Utc::now());
        self.store.put_secret(record).await?;
        Ok(())
    }

    /// Resolve every `${secret.KEY}` occurrence inside a node's parameter
    /// tree, recursing into objects and arrays. Only opaque (string) secrets
    /// are substitutable; a typed secret referenced this way is a usage
    /// error surfaced as `NoSuchField`, not silently stringified.
    pub async fn resolve_in_params(&self, account_id: &AccountId, params: &JsonValue) -> VaultResult<JsonValue> {
        match params {
            JsonValue::String(s) => {
                if let Some(key) = parse_secret_placeholder(s) {
                    let value = self.get(account_id, key).await?;
                    self.mark_used(account_id, key).await.ok();
                    Ok(JsonValue::String(value))
                } else {
                    Ok(params.clone())
                }
            }
            JsonValue::Array(items) => {
                let mut resolved = Vec::with_capacity(items.len());
                for item in items {
                    resolved.push(Box::pin(self.resolve_in_params(account_id, item)).await?);
                }
                Ok(JsonValue::Array(resolved))
            }
            JsonValue::Object(map) => {
                let mut resolved = serde_json::Map::with_capacity(map.len());
                for (k, v) in map {
                    resolved.insert(k.clone(), Box::pin(self.resolve_in_params(account_id, v)).await?);
                }
                Ok(JsonValue::Object(resolved))
            }
            other => Ok(other.clone()),
        }
    }

    /// Re-encrypt every stored secret (across every account) under a fresh
    /// master key, then swap the active cipher. Decrypt-then-reencrypt
    /// happens on a snapshot of the table; the swap is committed only after
    /// every record re-encrypted successfully, so a failure midway leaves
    /// the vault on its old key with nothing rewritten.
    pub async fn rotate_encryption_key(&self, new_master_key: &[u8]) -> VaultResult<()> {
        let new_cipher = SecretCipher::new(new_master_key).map_err(|_| {
            VaultError::Storage(flowrunner_storage::StorageError::Internal(
                "invalid rotation key".to_string(),
            ))
        })?;
        let old_cipher = self.current_cipher().await;

        let records = self.store.list_all_secrets().await?;
        let mut rotated = Vec::with_capacity(records.len());
        for mut record in records {
            let payload = EncryptedPayload::from_hex(&record.nonce_hex, &record.ciphertext_hex)
                .map_err(|_| VaultError::DecryptionFailed)?;
            let reencrypted = old_cipher
                .reencrypt_under(&payload, &new_cipher)
                .map_err(|_| VaultError::DecryptionFailed)?;
            let (nonce_hex, ciphertext_hex) = reencrypted.to_hex();
            record.nonce_hex = nonce_hex;
            record.ciphertext_hex = ciphertext_hex;
            rotated.push(record);
        }

        self.store.replace_all_secrets(rotated).await?;
        *self.cipher.write().await = Arc::new(new_cipher);
        tracing::info!("vault encryption key rotated");
        Ok(())
    }
}

fn parse_secret_placeholder(s: &str) -> Option<&str> {
    s.strip_prefix("${secret.")?.strip_suffix('}')
}

#[cfg(test)]
mod tests {
    use super::*;
    use flowrunner_storage::MemoryStore;

    fn vault() -> SecretVault {
        SecretVault::new(Arc::new(MemoryStore::new()), &[7u8; flowrunner_crypto::KEY_LEN]).unwrap()
    }

    #[tokio::test]
    async fn set_then_get_round_trips() {
        let vault = vault();
        let account = AccountId::new();
        vault.set(&account, "API_KEY", "sk-test-123").await.unwrap();
        assert_eq!(vault.get(&account, "API_KEY").await.unwrap(), "sk-test-123");
    }

    #[tokio::test]
    async fn missing_key_is_not_found_not_decryption_failed() {
        let vault = vault();
        let account = AccountId::new();
        let err = vault.get(&account, "MISSING").await.unwrap_err();
        assert!(matches!(err, VaultError::NotFound));
    }

    #[tokio::test]
    async fn resolve_in_params_substitutes_placeholders_recursively() {
        let vault = vault();
        let account = AccountId::new();
        vault.set(&account, "TOKEN", "shh").await.unwrap();

        let params = serde_json::json!({
            "headers": { "Authorization": "${secret.TOKEN}" },
            "retries": 3,
        });
        let resolved = vault.resolve_in_params(&account, &params).await.unwrap();
        assert_eq!(resolved["headers"]["Authorization"], "shh");
        assert_eq!(resolved["retries"], 3);
    }

    #[tokio::test]
    async fn rotation_preserves_values_and_old_key_stops_working() {
        let vault = vault();
        let account = AccountId::new();
        vault.set(&account, "K", "value").await.unwrap();

        vault.rotate_encryption_key(&[9u8; flowrunner_crypto::KEY_LEN]).await.unwrap();
        assert_eq!(vault.get(&account, "K").await.unwrap(), "value");
    }

    #[tokio::test]
    async fn get_field_on_structured_secret() {
        let vault = vault();
        let account = AccountId::new();
        vault
            .set_database(&account, "DB", serde_json::json!({"host": "db.internal", "port": 5432}))
            .await
            .unwrap();

        let host = vault.get_field(&account, "DB", "host").await.unwrap();
        assert_eq!(host, "db.internal");
        assert!(matches!(
            vault.get_field(&account, "DB", "missing").await,
            Err(VaultError::NoSuchField(_, _))
        ));
    }

    #[tokio::test]
    async fn search_filters_by_type_and_tags() {
        let vault = vault();
        let account = AccountId::new();
        vault.set(&account, "A", "1").await.unwrap();
        vault
            .update_metadata(&account, "A", Some(vec!["prod".to_string()]), None)
            .await
            .unwrap();

        let query = SecretSearchQuery {
            key_contains: None,
            secret_type: Some(SecretType::Opaque),
            tags: vec!["prod".to_string()],
        };
        let found = vault.search(&account, &query).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].key, "A");
    }
}
