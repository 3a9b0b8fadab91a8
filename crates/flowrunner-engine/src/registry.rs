use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::node::{Node, NodeFactory};
use crate::nodes::{BaseNodeFactory, DelayNodeFactory};
use flowrunner_loader::SPLIT_NODE_TYPE;

/// Process-wide `name -> factory` table (spec §9: "effectively append-only
/// after startup"). `split` is a reserved control construct handled
/// directly by the supervisor, not a factory slot — it is still reported as
/// a known type so the loader accepts it.
pub struct NodeRegistry {
    factories: HashMap<String, Arc<dyn NodeFactory>>,
}

impl NodeRegistry {
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// The registry used when nothing else is configured: the built-in
    /// reference nodes needed to exercise the engine end to end.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(BaseNodeFactory));
        registry.register(Arc::new(DelayNodeFactory));
        registry
    }

    pub fn register(&mut self, factory: Arc<dyn NodeFactory>) {
        self.factories.insert(factory.node_type().to_string(), factory);
    }

    pub fn create(&self, node_type: &str) -> Option<Arc<dyn Node>> {
        self.factories.get(node_type).map(|f| f.create())
    }

    /// Union of registered factory types plus the reserved `split` type,
    /// handed to the loader for validation.
    pub fn known_types(&self) -> HashSet<String> {
        let mut types: HashSet<String> = self.factories.keys().cloned().collect();
        types.insert(SPLIT_NODE_TYPE.to_string());
        types
    }
}

impl Default for NodeRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}
