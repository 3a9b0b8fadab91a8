//! Pure YAML-to-graph loading for FlowRunner flow documents. Knows nothing
//! about node execution, secrets, or storage — only the declarative shape
//! in spec §6 and how to validate it.

pub mod error;
pub mod graph;
pub mod raw;

use std::collections::HashSet;

use flowrunner_types::FlowMetadata;

pub use error::{LoaderError, LoaderResult};
pub use graph::{Graph, GraphNode, DEFAULT_LABEL, ON_ERROR_LABEL, SPLIT_NODE_TYPE};
pub use raw::{RawFlowDocument, RawNode};

/// Parses `yaml_text` and validates it into a `(Graph, FlowMetadata)` pair
/// against `known_types` — the caller's union of the core node factory
/// table and whatever plugins are registered. Rejects unknown node types,
/// dangling successors, a missing or ambiguous entry point, and cycles.
pub fn load(yaml_text: &str, known_types: &HashSet<String>) -> LoaderResult<(Graph, FlowMetadata)> {
    let doc: RawFlowDocument = serde_yaml::from_str(yaml_text)?;
    let metadata = doc.metadata.clone();
    let graph = graph::build_graph(doc, known_types)?;
    Ok((graph, metadata))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn known() -> HashSet<String> {
        ["base"].iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn loads_a_minimal_linear_flow() {
        let yaml = r#"
metadata:
  name: "linear"
nodes:
  start:
    type: base
    next:
      default: end
  end:
    type: base
"#;
        let (graph, metadata) = load(yaml, &known()).unwrap();
        assert_eq!(graph.entry, "start");
        assert_eq!(metadata.name, "linear");
        assert_eq!(graph.node("end").unwrap().node_type, "base");
    }

    #[test]
    fn bad_yaml_syntax_is_a_loader_error() {
        let yaml = "nodes: [this, is, not, a, map}";
        assert!(matches!(load(yaml, &known()), Err(LoaderError::Yaml(_))));
    }

    #[test]
    fn missing_nodes_map_is_an_empty_flow() {
        let yaml = "metadata:\n  name: empty\n";
        assert!(matches!(load(yaml, &known()), Err(LoaderError::EmptyFlow)));
    }
}
