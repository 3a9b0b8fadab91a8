use flowrunner_types::{AccountId, SecretMetadata, SecretType};
use serde::{Deserialize, Serialize};

/// What the storage provider actually persists for a secret: ciphertext and
/// nonce (hex-encoded — the provider is opaque persistence, not a crypto
/// component) plus cleartext metadata for search/expiry scans. Decryption
/// and the `StructuredSecret` view live in `flowrunner-secrets`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecretRecord {
    pub account_id: AccountId,
    pub key: String,
    pub secret_type: SecretType,
    pub nonce_hex: String,
    pub ciphertext_hex: String,
    pub metadata: SecretMetadata,
}
