use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use chrono::Utc;
use flowrunner_loader::{Graph, GraphNode, DEFAULT_LABEL};
use flowrunner_secrets::{SecretVault, VaultError};
use flowrunner_storage::StorageProvider;
use flowrunner_types::{
    AccountId, Execution, ExecutionId, ExecutionStatus, ExecutionUpdate, JsonValue, LogEntry, LogLevel,
};
use serde_json::json;
use tokio::sync::{broadcast, Mutex as AsyncMutex};
use tokio_util::sync::CancellationToken;

use crate::logbuf::LogRingBuffer;
use crate::node::{NodeContext, NodeOutput, SharedContext};
use crate::registry::NodeRegistry;

/// Why a chain (the top-level run, or one branch of a split) stopped
/// without reaching a terminal node on its own.
pub(crate) enum SupervisorStop {
    Cancelled,
    Failed(String),
}

/// Monotonic visited/reachable counter behind a shared atomic so concurrent
/// sibling branches can all contribute to one execution's progress figure.
#[derive(Clone)]
struct Progress {
    visited: Arc<AtomicUsize>,
    reachable: usize,
}

impl Progress {
    fn new(reachable: usize) -> Self {
        Self {
            visited: Arc::new(AtomicUsize::new(0)),
            reachable: reachable.max(1),
        }
    }

    fn record(&self) {
        self.visited.fetch_add(1, Ordering::Relaxed);
    }

    fn ratio(&self) -> f64 {
        (self.visited.load(Ordering::Relaxed) as f64 / self.reachable as f64).min(1.0)
    }
}

/// Drives one execution from its entry node to a terminal status. Built
/// fresh per `execute()` call and consumed by a single `tokio::spawn`;
/// shared mutable state (`shared` namespace, live snapshot, log buffer) is
/// behind its own lock so sibling branch tasks spawned for a `split` can
/// touch them concurrently.
pub(crate) struct Supervisor {
    pub store: Arc<dyn StorageProvider>,
    pub vault: Arc<SecretVault>,
    pub registry: Arc<NodeRegistry>,
    pub live: Arc<tokio::sync::RwLock<HashMap<ExecutionId, crate::runtime::LiveExecution>>>,
    pub execution_id: ExecutionId,
    pub account_id: AccountId,
    pub graph: Arc<Graph>,
    pub snapshot: Arc<AsyncMutex<Execution>>,
    pub shared: SharedContext,
    pub cancellation: CancellationToken,
    pub events: broadcast::Sender<ExecutionUpdate>,
    pub logs: Arc<AsyncMutex<LogRingBuffer>>,
}

impl Supervisor {
    pub async fn run(self, input: JsonValue) {
        self.transition_running().await;

        let results = Arc::new(AsyncMutex::new(HashMap::new()));
        let progress = Progress::new(self.graph.nodes.len());

        let outcome = self
            .run_from(self.graph.entry.clone(), input, None, &results, &progress)
            .await;

        let results = Arc::try_unwrap(results)
            .map(AsyncMutex::into_inner)
            .unwrap_or_default();

        match outcome {
            Ok(_) => self.finalize(ExecutionStatus::Completed, results, None).await,
            Err(SupervisorStop::Cancelled) => {
                self.finalize(ExecutionStatus::Cancelled, results, None).await
            }
            Err(SupervisorStop::Failed(message)) => {
                self.finalize(ExecutionStatus::Failed, results, Some(message)).await
            }
        }
    }

    /// Follows a single chain of nodes from `start`, stopping either at a
    /// terminal node (no successor for the returned branch — merges into
    /// `results` and returns), or at `stop_at` (the join target a sibling
    /// branch of an enclosing `split` must not itself execute). A `split`
    /// encountered along the way fans out into sibling chains (boxed
    /// recursive calls of this same function) and, once every sibling
    /// reaches the split's own join point, continues as this chain.
    fn run_from(
        &self,
        start: String,
        incoming: JsonValue,
        stop_at: Option<String>,
        results: &Arc<AsyncMutex<HashMap<String, JsonValue>>>,
        progress: &Progress,
    ) -> Pin<Box<dyn Future<Output = Result<JsonValue, SupervisorStop>> + Send + '_>> {
        let results = results.clone();
        let progress = progress.clone();
        Box::pin(async move {
            let mut node_name = start;
            let mut value = incoming;

            loop {
                if self.cancellation.is_cancelled() {
                    return Err(SupervisorStop::Cancelled);
                }
                if stop_at.as_ref() == Some(&node_name) {
                    return Ok(value);
                }

                let graph_node = self
                    .graph
                    .node(&node_name)
                    .cloned()
                    .ok_or_else(|| SupervisorStop::Failed(format!("node '{node_name}' missing from graph")))?;

                self.touch_current_node(&node_name, &progress).await;

                if graph_node.is_split() {
                    value = match self
                        .run_split(&node_name, &graph_node, value, &results, &progress)
                        .await?
                    {
                        SplitOutcome::Continue(next, merged) => {
                            node_name = next;
                            merged
                        }
                        SplitOutcome::Terminal(merged) => return Ok(merged),
                    };
                    continue;
                }

                match self.run_node(&node_name, &graph_node, value.clone()).await {
                    Ok(output) => {
                        progress.record();
                        self.log(
                            LogLevel::Info,
                            Some(node_name.clone()),
                            format!("node '{node_name}' completed"),
                            Some(json!({"input": value, "result": output.value})),
                        )
                        .await;

                        let successor = graph_node.successor_for(&output.branch).map(str::to_string);
                        match successor {
                            Some(next) if stop_at.as_ref() == Some(&next) => return Ok(output.value),
                            Some(next) => {
                                node_name = next;
                                value = output.value;
                            }
                            None => {
                                return Ok(self.merge_terminal(&results, &node_name, output.value).await);
                            }
                        }
                    }
                    Err(err) => {
                        if self.cancellation.is_cancelled() {
                            return Err(SupervisorStop::Cancelled);
                        }
                        self.log(
                            LogLevel::Error,
                            Some(node_name.clone()),
                            format!("node '{node_name}' failed: {err}"),
                            Some(json!({"error": err})),
                        )
                        .await;

                        match graph_node.error_successor().map(str::to_string) {
                            Some(handler) => {
                                self.log(
                                    LogLevel::Warn,
                                    Some(node_name.clone()),
                                    format!("recovering '{node_name}' via on_error"),
                                    None,
                                )
                                .await;
                                node_name = handler;
                                value = json!({ "error": err });
                            }
                            None => {
                                return Err(SupervisorStop::Failed(format!(
                                    "node '{node_name}' failed: {err}"
                                )));
                            }
                        }
                    }
                }
            }
        })
    }

    async fn run_split(
        &self,
        node_name: &str,
        graph_node: &GraphNode,
        incoming: JsonValue,
        results: &Arc<AsyncMutex<HashMap<String, JsonValue>>>,
        progress: &Progress,
    ) -> Result<SplitOutcome, SupervisorStop> {
        let join_target = graph_node.next.get(DEFAULT_LABEL).cloned();
        let siblings: Vec<String> = graph_node
            .next
            .iter()
            .filter(|(label, _)| label.as_str() != DEFAULT_LABEL)
            .map(|(_, target)| target.clone())
            .collect();

        self.log(
            LogLevel::Info,
            Some(node_name.to_string()),
            format!("split '{node_name}' fanning out to {} branches", siblings.len()),
            None,
        )
        .await;
        progress.record();

        let branch_futures = siblings
            .into_iter()
            .map(|branch_start| self.run_from(branch_start, incoming.clone(), join_target.clone(), results, progress));
        let branch_results = futures::future::join_all(branch_futures).await;

        let mut branch_values = Vec::with_capacity(branch_results.len());
        for result in branch_results {
            branch_values.push(result?);
        }

        let (merged, conflicts) = merge_sibling_outputs(branch_values);
        for key in conflicts {
            self.log(
                LogLevel::Warn,
                Some(node_name.to_string()),
                format!("duplicate key '{key}' written by parallel branches of '{node_name}', last writer wins"),
                None,
            )
            .await;
        }

        match join_target {
            Some(join) => Ok(SplitOutcome::Continue(join, merged)),
            None => {
                let merged_for_results = self.merge_terminal(results, node_name, merged).await;
                Ok(SplitOutcome::Terminal(merged_for_results))
            }
        }
    }

    async fn run_node(
        &self,
        node_name: &str,
        graph_node: &GraphNode,
        incoming: JsonValue,
    ) -> Result<NodeOutput, String> {
        let node = self
            .registry
            .create(&graph_node.node_type)
            .ok_or_else(|| format!("no node factory registered for type '{}'", graph_node.node_type))?;

        let resolved_params = match self.vault.resolve_in_params(&self.account_id, &graph_node.params).await {
            Ok(params) => params,
            Err(VaultError::NotFound) => return Err("SecretNotFound".to_string()),
            Err(other) => return Err(format!("secret resolution error: {other}")),
        };

        let ctx = NodeContext {
            node_name: node_name.to_string(),
            params: resolved_params,
            input: incoming,
            shared: self.shared.clone(),
            cancellation: self.cancellation.clone(),
        };

        node.run(&ctx).await.map_err(|e| e.0)
    }

    async fn merge_terminal(
        &self,
        results: &Arc<AsyncMutex<HashMap<String, JsonValue>>>,
        node_name: &str,
        value: JsonValue,
    ) -> JsonValue {
        let conflicts = {
            let mut guard = results.lock().await;
            merge_into_results(&mut guard, node_name, value.clone())
        };
        for key in conflicts {
            self.log(
                LogLevel::Warn,
                Some(node_name.to_string()),
                format!("duplicate result key '{key}' overwritten by node '{node_name}'"),
                None,
            )
            .await;
        }
        value
    }

    async fn touch_current_node(&self, node_name: &str, progress: &Progress) {
        let mut snapshot = self.snapshot.lock().await;
        snapshot.current_node = Some(node_name.to_string());
        snapshot.progress = progress.ratio();
    }

    async fn transition_running(&self) {
        let persisted = {
            let mut snapshot = self.snapshot.lock().await;
            snapshot.status = ExecutionStatus::Running;
            snapshot.start_time = Some(Utc::now());
            snapshot.clone()
        };
        self.store.update_execution(persisted.clone()).await.ok();
        self.emit_status(persisted.status).await;
    }

    async fn finalize(&self, status: ExecutionStatus, results: HashMap<String, JsonValue>, error: Option<String>) {
        let dropped = self.logs.lock().await.dropped_count();
        let persisted = {
            let mut snapshot = self.snapshot.lock().await;
            snapshot.status = status;
            snapshot.end_time = Some(Utc::now());
            snapshot.current_node = None;
            snapshot.results = results;
            snapshot.error = error;
            snapshot.metadata.dropped_log_count = dropped;
            if status == ExecutionStatus::Completed {
                snapshot.progress = 1.0;
            }
            snapshot.clone()
        };
        self.store.update_execution(persisted.clone()).await.ok();
        tracing::info!(
            execution_id = %self.execution_id,
            account_id = %self.account_id,
            status = ?persisted.status,
            dropped_logs = dropped,
            "execution finalized"
        );
        // The terminal event is sent before the live entry is dropped so any
        // subscriber still attached receives it (spec §5: terminal is last).
        self.emit_status(persisted.status).await;
        self.live.write().await.remove(&self.execution_id);
    }

    async fn emit_status(&self, status: ExecutionStatus) {
        self.events
            .send(ExecutionUpdate::status(self.execution_id.clone(), status))
            .ok();
    }

    async fn log(&self, level: LogLevel, node_id: Option<String>, message: String, data: Option<JsonValue>) {
        let entry = LogEntry {
            execution_id: self.execution_id.clone(),
            timestamp: Utc::now(),
            level,
            node_id,
            message,
            data,
        };
        self.logs.lock().await.push(entry.clone());
        self.store
            .append_logs(&self.execution_id, std::slice::from_ref(&entry))
            .await
            .ok();
        self.events
            .send(ExecutionUpdate::log(self.execution_id.clone(), entry))
            .ok();
    }
}

enum SplitOutcome {
    /// Continue the enclosing chain at this node with this incoming value.
    Continue(String, JsonValue),
    /// The split had no `default` edge: its merged sibling output is itself
    /// the chain's terminal value.
    Terminal(JsonValue),
}

/// Shallow-merges a node's (or a split's merged-sibling) output into the
/// execution's flat `results` map: object keys are unioned; a bare scalar
/// is filed under the producing node's name. Returns the keys that
/// overwrote an existing entry, for the caller to log as a warning.
fn merge_into_results(results: &mut HashMap<String, JsonValue>, node_name: &str, value: JsonValue) -> Vec<String> {
    let mut conflicts = Vec::new();
    match value {
        JsonValue::Object(map) => {
            for (key, val) in map {
                if results.contains_key(&key) {
                    conflicts.push(key.clone());
                }
                results.insert(key, val);
            }
        }
        other => {
            if results.contains_key(node_name) {
                conflicts.push(node_name.to_string());
            }
            results.insert(node_name.to_string(), other);
        }
    }
    conflicts
}

/// Combines the per-branch outputs of a `split`'s siblings into the single
/// value handed to the join node (spec §4.3.3: disjoint keys are unioned,
/// duplicates are last-writer-wins with the conflicting keys reported back
/// to the caller to log).
fn merge_sibling_outputs(values: Vec<JsonValue>) -> (JsonValue, Vec<String>) {
    let mut merged = serde_json::Map::new();
    let mut conflicts = Vec::new();
    let mut scalars = Vec::new();

    for value in values {
        match value {
            JsonValue::Object(map) => {
                for (key, val) in map {
                    if merged.contains_key(&key) {
                        conflicts.push(key.clone());
                    }
                    merged.insert(key, val);
                }
            }
            other => scalars.push(other),
        }
    }

    if merged.is_empty() && !scalars.is_empty() {
        (scalars.into_iter().last().unwrap_or(JsonValue::Null), conflicts)
    } else {
        (JsonValue::Object(merged), conflicts)
    }
}
