use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use flowrunner_secrets::SecretVault;
use flowrunner_storage::StorageProvider;
use flowrunner_types::{
    AccountId, Execution, ExecutionId, ExecutionStatus, ExecutionStatusView, ExecutionUpdate, FlowId, JsonValue,
    LogEntry,
};
use tokio::sync::{broadcast, Mutex as AsyncMutex, RwLock};
use tokio_util::sync::CancellationToken;

use crate::error::{EngineError, EngineResult};
use crate::logbuf::{LogRingBuffer, DEFAULT_LOG_CAPACITY};
use crate::node::SharedContext;
use crate::registry::NodeRegistry;
use crate::supervisor::Supervisor;

const DEFAULT_EVENT_CHANNEL_CAPACITY: usize = 256;
const DEFAULT_TIMEOUT_GRACE_PERIOD: Duration = Duration::from_secs(5);

#[derive(Clone)]
pub struct RuntimeConfig {
    pub log_capacity: usize,
    /// Per-execution wall-clock budget. `None` means no timeout (spec §5
    /// describes this as "configurable").
    pub execution_timeout: Option<Duration>,
    pub timeout_grace_period: Duration,
    pub event_channel_capacity: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            log_capacity: DEFAULT_LOG_CAPACITY,
            execution_timeout: None,
            timeout_grace_period: DEFAULT_TIMEOUT_GRACE_PERIOD,
            event_channel_capacity: DEFAULT_EVENT_CHANNEL_CAPACITY,
        }
    }
}

/// Bookkeeping for one in-flight execution. Removed from the live table the
/// moment the supervisor (or the timeout watchdog) finalizes it; after that,
/// `Runtime` falls back to the persisted `Execution`/logs.
pub(crate) struct LiveExecution {
    pub account_id: AccountId,
    pub snapshot: Arc<AsyncMutex<Execution>>,
    pub cancellation: CancellationToken,
    pub events: broadcast::Sender<ExecutionUpdate>,
    pub logs: Arc<AsyncMutex<LogRingBuffer>>,
}

/// The engine. One `Runtime` is shared process-wide (behind an `Arc`);
/// `execute()` launches a supervisor task per invocation and returns as soon
/// as it is scheduled (spec §4.3.1).
pub struct Runtime {
    store: Arc<dyn StorageProvider>,
    vault: Arc<SecretVault>,
    registry: Arc<NodeRegistry>,
    live: Arc<RwLock<HashMap<ExecutionId, LiveExecution>>>,
    config: RuntimeConfig,
}

impl Runtime {
    pub fn new(
        store: Arc<dyn StorageProvider>,
        vault: Arc<SecretVault>,
        registry: Arc<NodeRegistry>,
        config: RuntimeConfig,
    ) -> Self {
        Self {
            store,
            vault,
            registry,
            live: Arc::new(RwLock::new(HashMap::new())),
            config,
        }
    }

    pub async fn execute(
        &self,
        account_id: &AccountId,
        flow_id: &FlowId,
        input: JsonValue,
    ) -> EngineResult<ExecutionId> {
        let flow = self
            .store
            .get_flow(account_id, flow_id)
            .await
            .map_err(|_| EngineError::FlowNotFound)?;

        let (graph, _metadata) = flowrunner_loader::load(&flow.yaml, &self.registry.known_types())?;

        let execution_id = ExecutionId::new();
        let execution = Execution::new_pending(execution_id.clone(), flow_id.clone(), account_id.clone());
        self.store.create_execution(execution.clone()).await?;

        let cancellation = CancellationToken::new();
        let (events, _receiver) = broadcast::channel(self.config.event_channel_capacity);
        let snapshot = Arc::new(AsyncMutex::new(execution));
        let logs = Arc::new(AsyncMutex::new(LogRingBuffer::new(self.config.log_capacity)));

        {
            let mut live = self.live.write().await;
            live.insert(
                execution_id.clone(),
                LiveExecution {
                    account_id: account_id.clone(),
                    snapshot: snapshot.clone(),
                    cancellation: cancellation.clone(),
                    events: events.clone(),
                    logs: logs.clone(),
                },
            );
        }

        let supervisor = Supervisor {
            store: self.store.clone(),
            vault: self.vault.clone(),
            registry: self.registry.clone(),
            live: self.live.clone(),
            execution_id: execution_id.clone(),
            account_id: account_id.clone(),
            graph: Arc::new(graph),
            snapshot,
            shared: SharedContext::new(),
            cancellation: cancellation.clone(),
            events,
            logs,
        };

        tracing::info!(account_id = %account_id, flow_id = %flow_id, execution_id = %execution_id, "execution scheduled");
        tokio::spawn(supervisor.run(input));

        if let Some(timeout) = self.config.execution_timeout {
            self.spawn_timeout_watchdog(execution_id.clone(), cancellation, timeout);
        }

        Ok(execution_id)
    }

    pub async fn get_status(
        &self,
        account_id: &AccountId,
        execution_id: &ExecutionId,
    ) -> EngineResult<ExecutionStatusView> {
        if let Some(live) = self.live.read().await.get(execution_id) {
            if &live.account_id != account_id {
                return Err(EngineError::ExecutionNotFound);
            }
            return Ok(live.snapshot.lock().await.to_status_view());
        }

        let execution = self.store.get_execution(execution_id).await?;
        if &execution.account_id != account_id {
            return Err(EngineError::ExecutionNotFound);
        }
        Ok(execution.to_status_view())
    }

    pub async fn get_logs(&self, account_id: &AccountId, execution_id: &ExecutionId) -> EngineResult<Vec<LogEntry>> {
        if let Some(live) = self.live.read().await.get(execution_id) {
            if &live.account_id != account_id {
                return Err(EngineError::ExecutionNotFound);
            }
            return Ok(live.logs.lock().await.snapshot());
        }

        let execution = self.store.get_execution(execution_id).await?;
        if &execution.account_id != account_id {
            return Err(EngineError::ExecutionNotFound);
        }
        Ok(self.store.get_logs(execution_id).await?)
    }

    /// Idempotent: cancelling an execution that is already terminal is a
    /// no-op success (spec §5); only an execution id that never existed, or
    /// belongs to a different account, is an error.
    pub async fn cancel(&self, account_id: &AccountId, execution_id: &ExecutionId) -> EngineResult<()> {
        if let Some(live) = self.live.read().await.get(execution_id) {
            if &live.account_id != account_id {
                return Err(EngineError::ExecutionNotFound);
            }
            live.cancellation.cancel();
            return Ok(());
        }

        let execution = self.store.get_execution(execution_id).await?;
        if &execution.account_id != account_id {
            return Err(EngineError::ExecutionNotFound);
        }
        Ok(())
    }

    /// Only live (not-yet-terminal) executions can be subscribed to: the
    /// stream for a terminal execution has already ended.
    pub async fn subscribe(
        &self,
        account_id: &AccountId,
        execution_id: &ExecutionId,
    ) -> EngineResult<broadcast::Receiver<ExecutionUpdate>> {
        let live = self.live.read().await;
        match live.get(execution_id) {
            Some(entry) if &entry.account_id == account_id => Ok(entry.events.subscribe()),
            _ => Err(EngineError::ExecutionNotFound),
        }
    }

    fn spawn_timeout_watchdog(&self, execution_id: ExecutionId, cancellation: CancellationToken, timeout: Duration) {
        let live = self.live.clone();
        let store = self.store.clone();
        let grace = self.config.timeout_grace_period;

        tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            if cancellation.is_cancelled() {
                return;
            }
            cancellation.cancel();
            tokio::time::sleep(grace).await;

            // Whoever removes the entry first wins: if the supervisor
            // already finalized normally, this is a no-op.
            let entry = live.write().await.remove(&execution_id);
            let Some(entry) = entry else { return };

            let dropped = entry.logs.lock().await.dropped_count();
            let persisted = {
                let mut snapshot = entry.snapshot.lock().await;
                snapshot.status = ExecutionStatus::Failed;
                snapshot.end_time = Some(Utc::now());
                snapshot.current_node = None;
                snapshot.error = Some("execution timed out".to_string());
                snapshot.metadata.dropped_log_count = dropped;
                snapshot.clone()
            };
            store.update_execution(persisted.clone()).await.ok();
            entry
                .events
                .send(ExecutionUpdate::status(execution_id.clone(), persisted.status))
                .ok();
        });
    }
}
