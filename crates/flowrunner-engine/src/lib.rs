//! The FlowRunner execution engine: the node protocol, the supervisor that
//! walks a validated graph (sequential edges, `split` fan-out/join,
//! `on_error` recovery), the per-execution status/log/event bookkeeping,
//! and the handful of reference node types needed to exercise it.

pub mod error;
pub mod logbuf;
pub mod node;
pub mod nodes;
pub mod registry;
pub mod runtime;
mod supervisor;

pub use error::{EngineError, EngineResult};
pub use node::{Node, NodeContext, NodeError, NodeFactory, NodeOutput, SharedContext};
pub use registry::NodeRegistry;
pub use runtime::{Runtime, RuntimeConfig};

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;
    use flowrunner_secrets::SecretVault;
    use flowrunner_storage::MemoryStore;
    use flowrunner_types::{AccountId, ExecutionStatus, Flow, FlowMetadata};
    use serde_json::json;

    use super::*;
    use crate::node::{Node, NodeContext, NodeError, NodeFactory, NodeOutput};

    fn make_runtime(registry: NodeRegistry) -> (Runtime, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let vault = Arc::new(SecretVault::new(store.clone(), &[3u8; flowrunner_crypto::KEY_LEN]).unwrap());
        let runtime = Runtime::new(store.clone(), vault, Arc::new(registry), RuntimeConfig::default());
        (runtime, store)
    }

    async fn create_flow(store: &MemoryStore, account_id: &AccountId, yaml: &str) -> flowrunner_types::FlowId {
        use flowrunner_storage::StorageProvider;
        let now = chrono::Utc::now();
        let flow = Flow {
            id: flowrunner_types::FlowId::new(),
            account_id: account_id.clone(),
            yaml: yaml.to_string(),
            metadata: FlowMetadata {
                name: "test".to_string(),
                ..Default::default()
            },
            created_at: now,
            updated_at: now,
        };
        let created = store.create_flow(flow).await.unwrap();
        created.id
    }

    async fn wait_for_terminal(runtime: &Runtime, account_id: &AccountId, execution_id: &flowrunner_types::ExecutionId) {
        for _ in 0..200 {
            let status = runtime.get_status(account_id, execution_id).await.unwrap();
            if status.status.is_terminal() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("execution did not reach a terminal status in time");
    }

    #[tokio::test]
    async fn linear_flow_completes_with_nonempty_results() {
        let (runtime, store) = make_runtime(NodeRegistry::with_defaults());
        let account_id = AccountId::new();
        let flow_id = create_flow(
            &store,
            &account_id,
            r#"
metadata:
  name: linear
nodes:
  start:
    type: base
    next:
      default: end
  end:
    type: base
"#,
        )
        .await;

        let execution_id = runtime.execute(&account_id, &flow_id, json!({})).await.unwrap();
        wait_for_terminal(&runtime, &account_id, &execution_id).await;

        let status = runtime.get_status(&account_id, &execution_id).await.unwrap();
        assert_eq!(status.status, ExecutionStatus::Completed);
        assert!(!status.results.is_empty());

        let logs = runtime.get_logs(&account_id, &execution_id).await.unwrap();
        let node_order: Vec<&str> = logs
            .iter()
            .filter_map(|entry| entry.node_id.as_deref())
            .collect();
        assert_eq!(node_order, vec!["start", "end"]);
    }

    struct WriteKeyNode(&'static str);

    #[async_trait]
    impl Node for WriteKeyNode {
        fn node_type(&self) -> &'static str {
            "write_key"
        }

        async fn run(&self, ctx: &NodeContext) -> Result<NodeOutput, NodeError> {
            Ok(NodeOutput::default_branch(json!({ self.0: ctx.node_name.clone() })))
        }
    }

    struct WriteKeyFactory(&'static str);

    impl NodeFactory for WriteKeyFactory {
        fn node_type(&self) -> &'static str {
            "write_key"
        }

        fn create(&self) -> Arc<dyn Node> {
            Arc::new(WriteKeyNode(self.0))
        }
    }

    #[tokio::test]
    async fn split_fan_out_joins_sibling_outputs() {
        let mut registry = NodeRegistry::with_defaults();
        registry.register(Arc::new(WriteKeyFactory("a")));
        let (runtime, store) = make_runtime(registry);
        let account_id = AccountId::new();
        let flow_id = create_flow(
            &store,
            &account_id,
            r#"
metadata:
  name: split
nodes:
  start:
    type: split
    next:
      branch1: t1
      branch2: t2
      default: out
  t1:
    type: write_key
  t2:
    type: write_key
  out:
    type: base
"#,
        )
        .await;

        let execution_id = runtime.execute(&account_id, &flow_id, json!({})).await.unwrap();
        wait_for_terminal(&runtime, &account_id, &execution_id).await;

        let status = runtime.get_status(&account_id, &execution_id).await.unwrap();
        assert_eq!(status.status, ExecutionStatus::Completed);
        assert!(status.results.contains_key("a"));
    }

    #[tokio::test]
    async fn cancellation_stops_a_sleeping_execution_promptly() {
        let (runtime, store) = make_runtime(NodeRegistry::with_defaults());
        let account_id = AccountId::new();
        let flow_id = create_flow(
            &store,
            &account_id,
            r#"
metadata:
  name: sleepy
nodes:
  start:
    type: delay
    params:
      seconds: 10
"#,
        )
        .await;

        let execution_id = runtime.execute(&account_id, &flow_id, json!({})).await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        runtime.cancel(&account_id, &execution_id).await.unwrap();
        wait_for_terminal(&runtime, &account_id, &execution_id).await;

        let status = runtime.get_status(&account_id, &execution_id).await.unwrap();
        assert_eq!(status.status, ExecutionStatus::Cancelled);

        // A second cancel on an already-terminal execution is still a
        // success (spec §5).
        assert!(runtime.cancel(&account_id, &execution_id).await.is_ok());
    }

    struct EchoParamNode;

    #[async_trait]
    impl Node for EchoParamNode {
        fn node_type(&self) -> &'static str {
            "echo_param"
        }

        async fn run(&self, ctx: &NodeContext) -> Result<NodeOutput, NodeError> {
            let value = ctx.require_param("key")?.clone();
            Ok(NodeOutput::default_branch(json!({ "echoed": value })))
        }
    }

    struct EchoParamFactory;

    impl NodeFactory for EchoParamFactory {
        fn node_type(&self) -> &'static str {
            "echo_param"
        }

        fn create(&self) -> Arc<dyn Node> {
            Arc::new(EchoParamNode)
        }
    }

    fn secret_flow_yaml() -> &'static str {
        r#"
metadata:
  name: secret
nodes:
  start:
    type: echo_param
    params:
      key: "${secret.OPENAI_API_KEY}"
"#
    }

    #[tokio::test]
    async fn secret_injection_resolves_for_the_owning_account() {
        let mut registry = NodeRegistry::with_defaults();
        registry.register(Arc::new(EchoParamFactory));
        let store = Arc::new(MemoryStore::new());
        let vault = Arc::new(SecretVault::new(store.clone(), &[5u8; flowrunner_crypto::KEY_LEN]).unwrap());
        let runtime = Runtime::new(store.clone(), vault.clone(), Arc::new(registry), RuntimeConfig::default());

        let account_id = AccountId::new();
        vault.set(&account_id, "OPENAI_API_KEY", "s3cret").await.unwrap();
        let flow_id = create_flow(&store, &account_id, secret_flow_yaml()).await;

        let execution_id = runtime.execute(&account_id, &flow_id, json!({})).await.unwrap();
        wait_for_terminal(&runtime, &account_id, &execution_id).await;

        let status = runtime.get_status(&account_id, &execution_id).await.unwrap();
        assert_eq!(status.status, ExecutionStatus::Completed);
        assert_eq!(status.results["echoed"], "s3cret");
    }

    #[tokio::test]
    async fn secret_injection_fails_the_execution_for_an_account_without_the_secret() {
        let mut registry = NodeRegistry::with_defaults();
        registry.register(Arc::new(EchoParamFactory));
        let (runtime, store) = make_runtime(registry);

        let account_id = AccountId::new();
        let flow_id = create_flow(&store, &account_id, secret_flow_yaml()).await;

        let execution_id = runtime.execute(&account_id, &flow_id, json!({})).await.unwrap();
        wait_for_terminal(&runtime, &account_id, &execution_id).await;

        let status = runtime.get_status(&account_id, &execution_id).await.unwrap();
        assert_eq!(status.status, ExecutionStatus::Failed);
        assert!(status.error.unwrap().contains("SecretNotFound"));
    }

    struct AlwaysFailsNode;

    #[async_trait]
    impl Node for AlwaysFailsNode {
        fn node_type(&self) -> &'static str {
            "always_fails"
        }

        async fn run(&self, _ctx: &NodeContext) -> Result<NodeOutput, NodeError> {
            Err(NodeError::new("boom"))
        }
    }

    struct AlwaysFailsFactory;

    impl NodeFactory for AlwaysFailsFactory {
        fn node_type(&self) -> &'static str {
            "always_fails"
        }

        fn create(&self) -> Arc<dyn Node> {
            Arc::new(AlwaysFailsNode)
        }
    }

    #[tokio::test]
    async fn on_error_edge_recovers_a_failing_node() {
        let mut registry = NodeRegistry::with_defaults();
        registry.register(Arc::new(AlwaysFailsFactory));
        let (runtime, store) = make_runtime(registry);
        let account_id = AccountId::new();
        let flow_id = create_flow(
            &store,
            &account_id,
            r#"
metadata:
  name: recovers
nodes:
  start:
    type: always_fails
    next:
      on_error: fallback
  fallback:
    type: base
"#,
        )
        .await;

        let execution_id = runtime.execute(&account_id, &flow_id, json!({})).await.unwrap();
        wait_for_terminal(&runtime, &account_id, &execution_id).await;

        let status = runtime.get_status(&account_id, &execution_id).await.unwrap();
        assert_eq!(status.status, ExecutionStatus::Completed);
    }

    #[tokio::test]
    async fn without_on_error_a_failing_node_fails_the_execution() {
        let mut registry = NodeRegistry::with_defaults();
        registry.register(Arc::new(AlwaysFailsFactory));
        let (runtime, store) = make_runtime(registry);
        let account_id = AccountId::new();
        let flow_id = create_flow(
            &store,
            &account_id,
            r#"
metadata:
  name: unrecovered
nodes:
  start:
    type: always_fails
"#,
        )
        .await;

        let execution_id = runtime.execute(&account_id, &flow_id, json!({})).await.unwrap();
        wait_for_terminal(&runtime, &account_id, &execution_id).await;

        let status = runtime.get_status(&account_id, &execution_id).await.unwrap();
        assert_eq!(status.status, ExecutionStatus::Failed);
        assert!(status.error.unwrap().contains("boom"));
    }

    #[tokio::test]
    async fn an_execution_from_a_different_account_is_not_found() {
        let (runtime, store) = make_runtime(NodeRegistry::with_defaults());
        let owner = AccountId::new();
        let intruder = AccountId::new();
        let flow_id = create_flow(
            &store,
            &owner,
            r#"
metadata:
  name: isolated
nodes:
  start:
    type: base
"#,
        )
        .await;

        let execution_id = runtime.execute(&owner, &flow_id, json!({})).await.unwrap();
        wait_for_terminal(&runtime, &owner, &execution_id).await;

        assert!(matches!(
            runtime.get_status(&intruder, &execution_id).await,
            Err(EngineError::ExecutionNotFound)
        ));
    }

    #[tokio::test]
    async fn subscribe_receives_a_terminal_frame_last() {
        let (runtime, store) = make_runtime(NodeRegistry::with_defaults());
        let account_id = AccountId::new();
        let flow_id = create_flow(
            &store,
            &account_id,
            r#"
metadata:
  name: linear
nodes:
  start:
    type: base
"#,
        )
        .await;

        let execution_id = runtime.execute(&account_id, &flow_id, json!({})).await.unwrap();
        let mut receiver = runtime.subscribe(&account_id, &execution_id).await.unwrap();

        let mut saw_terminal = false;
        loop {
            match tokio::time::timeout(Duration::from_secs(1), receiver.recv()).await {
                Ok(Ok(update)) => {
                    if let Some(status) = update.status {
                        if status.is_terminal() {
                            saw_terminal = true;
                            break;
                        }
                    }
                }
                _ => break,
            }
        }
        assert!(saw_terminal, "subscriber never observed a terminal status frame");
    }
}
