use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;

use crate::node::{Node, NodeContext, NodeError, NodeFactory, NodeOutput};

/// Identity node: echoes its input back, tagged with its own name so a
/// chain of `base` nodes always produces a non-empty result even when the
/// execution's original input was `{}`.
pub struct BaseNode;

#[async_trait]
impl Node for BaseNode {
    fn node_type(&self) -> &'static str {
        "base"
    }

    async fn run(&self, ctx: &NodeContext) -> Result<NodeOutput, NodeError> {
        Ok(NodeOutput::default_branch(json!({
            "node": ctx.node_name,
            "input": ctx.input,
        })))
    }
}

pub struct BaseNodeFactory;

impl NodeFactory for BaseNodeFactory {
    fn node_type(&self) -> &'static str {
        "base"
    }

    fn create(&self) -> Arc<dyn Node> {
        Arc::new(BaseNode)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::SharedContext;
    use tokio_util::sync::CancellationToken;

    #[tokio::test]
    async fn echoes_input_tagged_with_its_own_name() {
        let node = BaseNode;
        let ctx = NodeContext {
            node_name: "start".to_string(),
            params: json!({}),
            input: json!({"x": 1}),
            shared: SharedContext::new(),
            cancellation: CancellationToken::new(),
        };
        let output = node.run(&ctx).await.unwrap();
        assert_eq!(output.branch, "default");
        assert_eq!(output.value["node"], "start");
        assert_eq!(output.value["input"]["x"], 1);
    }
}
