use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;

use crate::node::{Node, NodeContext, NodeError, NodeFactory, NodeOutput};

const DEFAULT_SECONDS: f64 = 10.0;

/// Sleeps for `params.seconds` (default 10s), racing the cancellation
/// token so a `cancel()` call lands promptly instead of waiting out the
/// full sleep. This is the node the cancellation scenario in spec §8 runs.
pub struct DelayNode;

#[async_trait]
impl Node for DelayNode {
    fn node_type(&self) -> &'static str {
        "delay"
    }

    async fn run(&self, ctx: &NodeContext) -> Result<NodeOutput, NodeError> {
        let seconds = ctx
            .param("seconds")
            .and_then(|v| v.as_f64())
            .unwrap_or(DEFAULT_SECONDS);
        let duration = Duration::from_secs_f64(seconds.max(0.0));

        tokio::select! {
            _ = tokio::time::sleep(duration) => {
                Ok(NodeOutput::default_branch(json!({ "slept_seconds": seconds })))
            }
            _ = ctx.cancellation.cancelled() => {
                Err(NodeError::new("delay node cancelled"))
            }
        }
    }
}

pub struct DelayNodeFactory;

impl NodeFactory for DelayNodeFactory {
    fn node_type(&self) -> &'static str {
        "delay"
    }

    fn create(&self) -> Arc<dyn Node> {
        Arc::new(DelayNode)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::SharedContext;
    use tokio_util::sync::CancellationToken;

    #[tokio::test]
    async fn completes_after_the_configured_delay() {
        let node = DelayNode;
        let ctx = NodeContext {
            node_name: "wait".to_string(),
            params: json!({ "seconds": 0.01 }),
            input: json!(null),
            shared: SharedContext::new(),
            cancellation: CancellationToken::new(),
        };
        let output = node.run(&ctx).await.unwrap();
        assert_eq!(output.value["slept_seconds"], 0.01);
    }

    #[tokio::test]
    async fn returns_promptly_when_cancelled() {
        let node = DelayNode;
        let token = CancellationToken::new();
        let ctx = NodeContext {
            node_name: "wait".to_string(),
            params: json!({ "seconds": 10.0 }),
            input: json!(null),
            shared: SharedContext::new(),
            cancellation: token.clone(),
        };
        token.cancel();
        let result = tokio::time::timeout(Duration::from_millis(200), node.run(&ctx)).await;
        assert!(result.is_ok(), "node did not observe cancellation promptly");
        assert!(result.unwrap().is_err());
    }
}
