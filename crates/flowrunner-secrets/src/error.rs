#[derive(Debug, thiserror::Error)]
pub enum VaultError {
    #[error("secret not found")]
    NotFound,
    /// Distinct from `NotFound`: the record exists but could not be opened
    /// under the vault's current key. Never collapse this into `NotFound` —
    /// doing so would let an attacker use response shape to tell "wrong key"
    /// from "no such secret" apart.
    #[error("secret exists but could not be decrypted")]
    DecryptionFailed,
    #[error("secret '{0}' has no field '{1}'")]
    NoSuchField(String, String),
    #[error("storage error: {0}")]
    Storage(#[from] flowrunner_storage::StorageError),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type VaultResult<T> = Result<T, VaultError>;
