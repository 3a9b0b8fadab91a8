//! Application state shared across handlers.

use std::sync::Arc;

use flowrunner_auth::AccountService;
use flowrunner_engine::{NodeRegistry, Runtime};
use flowrunner_secrets::SecretVault;
use flowrunner_storage::StorageProvider;

/// Shared application state. One instance lives behind an `Arc` for the
/// lifetime of the process; handlers receive it through axum's `State`
/// extractor.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn StorageProvider>,
    pub accounts: Arc<AccountService>,
    pub vault: Arc<SecretVault>,
    pub engine: Arc<Runtime>,
    pub registry: Arc<NodeRegistry>,
}

impl AppState {
    pub fn new(
        store: Arc<dyn StorageProvider>,
        accounts: Arc<AccountService>,
        vault: Arc<SecretVault>,
        engine: Arc<Runtime>,
        registry: Arc<NodeRegistry>,
    ) -> Self {
        Self {
            store,
            accounts,
            vault,
            engine,
            registry,
        }
    }

    /// State for testing: an in-memory store, a fresh vault under a fixed
    /// key, and the default node registry.
    #[cfg(test)]
    pub fn test() -> Self {
        use flowrunner_auth::AccountConfig;
        use flowrunner_engine::RuntimeConfig;
        use flowrunner_storage::MemoryStore;

        let store: Arc<dyn StorageProvider> = Arc::new(MemoryStore::new());
        let accounts = Arc::new(AccountService::new(store.clone(), AccountConfig::default()));
        let vault = Arc::new(SecretVault::new(store.clone(), &[7u8; flowrunner_crypto::KEY_LEN]).unwrap());
        let registry = Arc::new(NodeRegistry::with_defaults());
        let engine = Arc::new(Runtime::new(
            store.clone(),
            vault.clone(),
            registry.clone(),
            RuntimeConfig::default(),
        ));

        Self {
            store,
            accounts,
            vault,
            engine,
            registry,
        }
    }
}
