//! Opaque persistence of FlowRunner's four entity kinds — accounts, flows,
//! executions, secrets — behind the `StorageProvider` trait. The engine and
//! the rest of the core depend only on this trait; `MemoryStore` is a
//! reference implementation so the service is runnable without an external
//! database, not a mandated storage technology.

pub mod error;
pub mod models;

use async_trait::async_trait;
use flowrunner_types::{Account, AccountId, Execution, ExecutionId, Flow, FlowId, LogEntry};
use std::collections::HashMap;
use tokio::sync::RwLock;

pub use error::{StorageError, StorageResult};
pub use models::SecretRecord;

/// Simple CRUD over the four collections. All flow/execution/secret
/// operations accept an account id and must enforce it: a lookup for a
/// record owned by a different account returns `NotFound`, never the data
/// and never a distinct "forbidden" signal (see spec §8, isolation +
/// no-existence-leak).
#[async_trait]
pub trait StorageProvider: Send + Sync {
    async fn create_account(&self, account: Account) -> StorageResult<Account>;
    async fn get_account(&self, id: &AccountId) -> StorageResult<Account>;
    async fn get_account_by_username(&self, username: &str) -> StorageResult<Account>;
    /// Looked up by bearer token. Implementations should compare the token
    /// in constant time: callers use this for request authentication, where
    /// a timing side-channel on a valid-prefix match would leak information
    /// about live tokens.
    async fn get_account_by_token(&self, token: &str) -> StorageResult<Account>;
    async fn update_account(&self, account: Account) -> StorageResult<Account>;

    async fn create_flow(&self, flow: Flow) -> StorageResult<Flow>;
    async fn get_flow(&self, account_id: &AccountId, id: &FlowId) -> StorageResult<Flow>;
    async fn list_flows(&self, account_id: &AccountId) -> StorageResult<Vec<Flow>>;
    async fn update_flow(&self, flow: Flow) -> StorageResult<Flow>;
    async fn delete_flow(&self, account_id: &AccountId, id: &FlowId) -> StorageResult<()>;

    async fn create_execution(&self, execution: Execution) -> StorageResult<Execution>;
    async fn get_execution(&self, id: &ExecutionId) -> StorageResult<Execution>;
    async fn update_execution(&self, execution: Execution) -> StorageResult<Execution>;
    async fn list_executions(&self, account_id: &AccountId) -> StorageResult<Vec<Execution>>;

    async fn append_logs(&self, execution_id: &ExecutionId, entries: &[LogEntry]) -> StorageResult<()>;
    async fn get_logs(&self, execution_id: &ExecutionId) -> StorageResult<Vec<LogEntry>>;

    async fn put_secret(&self, record: SecretRecord) -> StorageResult<()>;
    async fn get_secret(&self, account_id: &AccountId, key: &str) -> StorageResult<SecretRecord>;
    async fn delete_secret(&self, account_id: &AccountId, key: &str) -> StorageResult<()>;
    async fn list_secrets(&self, account_id: &AccountId) -> StorageResult<Vec<SecretRecord>>;

    /// All secret records across every account, used only by
    /// `rotate_encryption_key`.
    async fn list_all_secrets(&self) -> StorageResult<Vec<SecretRecord>>;
    /// Atomically replace every secret record (used to commit a key
    /// rotation in one step — either all records land under the new key or
    /// none do).
    async fn replace_all_secrets(&self, records: Vec<SecretRecord>) -> StorageResult<()>;
}

#[derive(Default)]
struct Tables {
    accounts: HashMap<AccountId, Account>,
    flows: HashMap<FlowId, Flow>,
    executions: HashMap<ExecutionId, Execution>,
    logs: HashMap<ExecutionId, Vec<LogEntry>>,
    secrets: HashMap<(AccountId, String), SecretRecord>,
}

/// In-memory reference implementation of `StorageProvider`, modeled on the
/// `Arc<RwLock<HashMap<..>>>` record-table shape used by in-process flow
/// trackers elsewhere in the ecosystem. Not durable across process restarts.
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            tables: RwLock::new(Tables::default()),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StorageProvider for MemoryStore {
    async fn create_account(&self, account: Account) -> StorageResult<Account> {
        let mut tables = self.tables.write().await;
        if tables
            .accounts
            .values()
            .any(|a| a.username == account.username)
        {
            return Err(StorageError::Conflict(format!(
                "username '{}' already exists",
                account.username
            )));
        }
        tables.accounts.insert(account.id.clone(), account.clone());
        Ok(account)
    }

    async fn get_account(&self, id: &AccountId) -> StorageResult<Account> {
        self.tables
            .read()
            .await
            .accounts
            .get(id)
            .cloned()
            .ok_or(StorageError::NotFound)
    }

    async fn get_account_by_username(&self, username: &str) -> StorageResult<Account> {
        self.tables
            .read()
            .await
            .accounts
            .values()
            .find(|a| a.username == username)
            .cloned()
            .ok_or(StorageError::NotFound)
    }

    async fn get_account_by_token(&self, token: &str) -> StorageResult<Account> {
        use subtle::ConstantTimeEq;
        self.tables
            .read()
            .await
            .accounts
            .values()
            .find(|a| {
                let matches: bool = a.api_token.as_bytes().ct_eq(token.as_bytes()).into();
                matches
            })
            .cloned()
            .ok_or(StorageError::NotFound)
    }

    async fn update_account(&self, account: Account) -> StorageResult<Account> {
        let mut tables = self.tables.write().await;
        if !tables.accounts.contains_key(&account.id) {
            return Err(StorageError::NotFound);
        }
        tables.accounts.insert(account.id.clone(), account.clone());
        Ok(account)
    }

    async fn create_flow(&self, flow: Flow) -> StorageResult<Flow> {
        let mut tables = self.tables.write().await;
        tables.flows.insert(flow.id.clone(), flow.clone());
        Ok(flow)
    }

    async fn get_flow(&self, account_id: &AccountId, id: &FlowId) -> StorageResult<Flow> {
        self.tables
            .read()
            .await
            .flows
            .get(id)
            .filter(|f| &f.account_id == account_id)
            .cloned()
            .ok_or(StorageError::NotFound)
    }

    async fn list_flows(&self, account_id: &AccountId) -> StorageResult<Vec<Flow>> {
        Ok(self
            .tables
            .read()
            .await
            .flows
            .values()
            .filter(|f| &f.account_id == account_id)
            .cloned()
            .collect())
    }

    async fn update_flow(&self, flow: Flow) -> StorageResult<Flow> {
        let mut tables = self.tables.write().await;
        match tables.flows.get(&flow.id) {
            Some(existing) if existing.account_id == flow.account_id => {
                tables.flows.insert(flow.id.clone(), flow.clone());
                Ok(flow)
            }
            _ => Err(StorageError::NotFound),
        }
    }

    async fn delete_flow(&self, account_id: &AccountId, id: &FlowId) -> StorageResult<()> {
        let mut tables = self.tables.write().await;
        match tables.flows.get(id) {
            Some(existing) if &existing.account_id == account_id => {
                tables.flows.remove(id);
                Ok(())
            }
            _ => Err(StorageError::NotFound),
        }
    }

    async fn create_execution(&self, execution: Execution) -> StorageResult<Execution> {
        let mut tables = self.tables.write().await;
        tables
            .executions
            .insert(execution.id.clone(), execution.clone());
        Ok(execution)
    }

    async fn get_execution(&self, id: &ExecutionId) -> StorageResult<Execution> {
        self.tables
            .read()
            .await
            .executions
            .get(id)
            .cloned()
            .ok_or(StorageError::NotFound)
    }

    async fn update_execution(&self, execution: Execution) -> StorageResult<Execution> {
        let mut tables = self.tables.write().await;
        tables
            .executions
            .insert(execution.id.clone(), execution.clone());
        Ok(execution)
    }

    async fn list_executions(&self, account_id: &AccountId) -> StorageResult<Vec<Execution>> {
        Ok(self
            .tables
            .read()
            .await
            .executions
            .values()
            .filter(|e| &e.account_id == account_id)
            .cloned()
            .collect())
    }

    async fn append_logs(&self, execution_id: &ExecutionId, entries: &[LogEntry]) -> StorageResult<()> {
        let mut tables = self.tables.write().await;
        tables
            .logs
            .entry(execution_id.clone())
            .or_default()
            .extend_from_slice(entries);
        Ok(())
    }

    async fn get_logs(&self, execution_id: &ExecutionId) -> StorageResult<Vec<LogEntry>> {
        Ok(self
            .tables
            .read()
            .await
            .logs
            .get(execution_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn put_secret(&self, record: SecretRecord) -> StorageResult<()> {
        let mut tables = self.tables.write().await;
        tables
            .secrets
            .insert((record.account_id.clone(), record.key.clone()), record);
        Ok(())
    }

    async fn get_secret(&self, account_id: &AccountId, key: &str) -> StorageResult<SecretRecord> {
        self.tables
            .read()
            .await
            .secrets
            .get(&(account_id.clone(), key.to_string()))
            .cloned()
            .ok_or(StorageError::NotFound)
    }

    async fn delete_secret(&self, account_id: &AccountId, key: &str) -> StorageResult<()> {
        let mut tables = self.tables.write().await;
        tables
            .secrets
            .remove(&(account_id.clone(), key.to_string()))
            .map(|_| ())
            .ok_or(StorageError::NotFound)
    }

    async fn list_secrets(&self, account_id: &AccountId) -> StorageResult<Vec<SecretRecord>> {
        Ok(self
            .tables
            .read()
            .await
            .secrets
            .values()
            .filter(|s| &s.account_id == account_id)
            .cloned()
            .collect())
    }

    async fn list_all_secrets(&self) -> StorageResult<Vec<SecretRecord>> {
        Ok(self.tables.read().await.secrets.values().cloned().collect())
    }

    async fn replace_all_secrets(&self, records: Vec<SecretRecord>) -> StorageResult<()> {
        let mut tables = self.tables.write().await;
        tables.secrets = records
            .into_iter()
            .map(|r| ((r.account_id.clone(), r.key.clone()), r))
            .collect();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flowrunner_types::{Flow, FlowMetadata};

    fn flow_for(account_id: &AccountId) -> Flow {
        let now = chrono::Utc::now();
        Flow {
            id: FlowId::new(),
            account_id: account_id.clone(),
            yaml: "nodes: {}".to_string(),
            metadata: FlowMetadata {
                name: "test".to_string(),
                ..Default::default()
            },
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn flows_are_isolated_by_account() {
        let store = MemoryStore::new();
        let a = AccountId::new();
        let b = AccountId::new();
        let flow = store.create_flow(flow_for(&a)).await.unwrap();

        assert!(store.get_flow(&a, &flow.id).await.is_ok());
        assert!(matches!(
            store.get_flow(&b, &flow.id).await,
            Err(StorageError::NotFound)
        ));
    }

    #[tokio::test]
    async fn duplicate_username_is_a_conflict() {
        let store = MemoryStore::new();
        let now = chrono::Utc::now();
        let make = || Account {
            id: AccountId::new(),
            username: "alice".to_string(),
            password_hash: "hash".to_string(),
            api_token: "token".to_string(),
            created_at: now,
            updated_at: now,
        };
        store.create_account(make()).await.unwrap();
        assert!(matches!(
            store.create_account(make()).await,
            Err(StorageError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn secret_rotation_replaces_the_whole_table_atomically() {
        let store = MemoryStore::new();
        let account = AccountId::new();
        let metadata = flowrunner_types::SecretMetadata::new_now();
        store
            .put_secret(SecretRecord {
                account_id: account.clone(),
                key: "K".to_string(),
                secret_type: flowrunner_types::SecretType::Opaque,
                nonce_hex: "aa".to_string(),
                ciphertext_hex: "bb".to_string(),
                metadata,
            })
            .await
            .unwrap();

        let mut all = store.list_all_secrets().await.unwrap();
        all[0].ciphertext_hex = "rotated".to_string();
        store.replace_all_secrets(all).await.unwrap();

        let record = store.get_secret(&account, "K").await.unwrap();
        assert_eq!(record.ciphertext_hex, "rotated");
    }
}
