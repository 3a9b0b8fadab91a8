use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use flowrunner_types::JsonValue;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

/// Mutable per-execution mapping visible to every node in that execution.
/// The lock is held only for the duration of a single read or write, never
/// across a node's `run`.
#[derive(Clone, Default)]
pub struct SharedContext(Arc<Mutex<HashMap<String, JsonValue>>>);

impl SharedContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, key: &str) -> Option<JsonValue> {
        self.0.lock().await.get(key).cloned()
    }

    pub async fn set(&self, key: impl Into<String>, value: JsonValue) {
        self.0.lock().await.insert(key.into(), value);
    }

    pub async fn snapshot(&self) -> HashMap<String, JsonValue> {
        self.0.lock().await.clone()
    }
}

/// Everything a node needs to run one step: its (already secret-resolved)
/// params, the value handed to it by the edge that scheduled it, the
/// execution-wide shared namespace, and a cancellation token long-running
/// nodes are expected to observe.
pub struct NodeContext {
    pub node_name: String,
    pub params: JsonValue,
    pub input: JsonValue,
    pub shared: SharedContext,
    pub cancellation: CancellationToken,
}

impl NodeContext {
    pub fn param(&self, key: &str) -> Option<&JsonValue> {
        self.params.get(key)
    }

    pub fn require_param(&self, key: &str) -> Result<&JsonValue, NodeError> {
        self.param(key)
            .ok_or_else(|| NodeError(format!("missing required param '{key}'")))
    }
}

/// A node's result: the branch label used to pick its successor, and the
/// value handed to that successor (or merged into `results` if the node is
/// terminal).
#[derive(Debug, Clone)]
pub struct NodeOutput {
    pub branch: String,
    pub value: JsonValue,
}

impl NodeOutput {
    pub fn default_branch(value: JsonValue) -> Self {
        Self {
            branch: flowrunner_loader::DEFAULT_LABEL.to_string(),
            value,
        }
    }

    pub fn branch(label: impl Into<String>, value: JsonValue) -> Self {
        Self {
            branch: label.into(),
            value,
        }
    }
}

/// A node's own failure. Deliberately a single opaque message: node
/// implementations are plugins outside this crate's concern (spec's
/// `Non-goals`), so the engine only needs something it can log and fold
/// into `EngineError::NodeFailed`.
#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct NodeError(pub String);

impl NodeError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// The node protocol. Implementations are values, not ambient dispatch:
/// `node_type` names the factory slot, `run` does the work.
#[async_trait]
pub trait Node: Send + Sync {
    fn node_type(&self) -> &'static str;
    async fn run(&self, ctx: &NodeContext) -> Result<NodeOutput, NodeError>;
}

/// Builds a fresh `Node` instance for a given type name. Factories are
/// stateless by convention — any per-run state lives in the returned node,
/// not the factory.
pub trait NodeFactory: Send + Sync {
    fn node_type(&self) -> &'static str;
    fn create(&self) -> Arc<dyn Node>;
}
