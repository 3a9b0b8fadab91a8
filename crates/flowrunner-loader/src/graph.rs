use std::collections::{HashMap, HashSet};

use serde_json::Value;

use crate::error::{LoaderError, LoaderResult};
use crate::raw::RawFlowDocument;

pub const SPLIT_NODE_TYPE: &str = "split";
pub const DEFAULT_LABEL: &str = "default";
pub const ON_ERROR_LABEL: &str = "on_error";
const ENTRY_NODE_NAME: &str = "start";

/// One node's validated shape: its type, bound params (not yet
/// secret-resolved — that happens per execution), and successor edges keyed
/// by branch label.
#[derive(Debug, Clone)]
pub struct GraphNode {
    pub node_type: String,
    pub params: Value,
    pub next: HashMap<String, String>,
}

impl GraphNode {
    pub fn is_split(&self) -> bool {
        self.node_type == SPLIT_NODE_TYPE
    }

    /// Successor for a returned branch label, falling back to `default`
    /// per spec §4.3.2 step 4.
    pub fn successor_for(&self, label: &str) -> Option<&str> {
        self.next
            .get(label)
            .or_else(|| self.next.get(DEFAULT_LABEL))
            .map(String::as_str)
    }

    pub fn error_successor(&self) -> Option<&str> {
        self.next.get(ON_ERROR_LABEL).map(String::as_str)
    }
}

/// A validated, immutable node graph. The only thing the loader produces;
/// the engine is the only thing that instantiates nodes from it.
#[derive(Debug, Clone)]
pub struct Graph {
    pub entry: String,
    pub nodes: HashMap<String, GraphNode>,
}

impl Graph {
    pub fn node(&self, name: &str) -> Option<&GraphNode> {
        self.nodes.get(name)
    }

    pub fn node_names(&self) -> impl Iterator<Item = &str> {
        self.nodes.keys().map(String::as_str)
    }
}

/// Validates a parsed document against a table of known node type names
/// (the union of the core factory table and the plugin registry — loaded
/// elsewhere; this crate has no notion of what a node *does*) and lowers it
/// into a `Graph`.
pub fn build_graph(doc: RawFlowDocument, known_types: &HashSet<String>) -> LoaderResult<Graph> {
    if doc.nodes.is_empty() {
        return Err(LoaderError::EmptyFlow);
    }

    for (name, raw) in &doc.nodes {
        if !known_types.contains(&raw.node_type) {
            return Err(LoaderError::UnknownNodeType {
                node: name.clone(),
                node_type: raw.node_type.clone(),
            });
        }
        for (label, target) in &raw.next {
            if !doc.nodes.contains_key(target) {
                return Err(LoaderError::UnknownSuccessor {
                    node: name.clone(),
                    label: label.clone(),
                    target: target.clone(),
                });
            }
        }
    }

    let entry = infer_entry(&doc.nodes)?;

    let nodes = doc
        .nodes
        .into_iter()
        .map(|(name, raw)| {
            (
                name,
                GraphNode {
                    node_type: raw.node_type,
                    params: raw.params,
                    next: raw.next,
                },
            )
        })
        .collect::<HashMap<_, _>>();

    detect_cycle(&nodes, &entry)?;

    Ok(Graph { entry, nodes })
}

fn infer_entry(nodes: &HashMap<String, crate::raw::RawNode>) -> LoaderResult<String> {
    if nodes.contains_key(ENTRY_NODE_NAME) {
        return Ok(ENTRY_NODE_NAME.to_string());
    }

    let referenced: HashSet<&str> = nodes
        .values()
        .flat_map(|n| n.next.values().map(String::as_str))
        .collect();

    let mut roots: Vec<&String> = nodes
        .keys()
        .filter(|name| !referenced.contains(name.as_str()))
        .collect();

    match roots.len() {
        0 => Err(LoaderError::NoEntryPoint),
        1 => Ok(roots.remove(0).clone()),
        _ => {
            roots.sort();
            Err(LoaderError::AmbiguousEntryPoint(
                roots.into_iter().cloned().collect(),
            ))
        }
    }
}

/// DFS cycle check over the successor edges, starting from the entry point.
/// A `split` node's successors are edges like any other here — the engine's
/// parallel join semantics don't change whether a path back to an ancestor
/// exists.
fn detect_cycle(nodes: &HashMap<String, GraphNode>, entry: &str) -> LoaderResult<()> {
    #[derive(Clone, Copy, PartialEq)]
    enum Mark {
        InProgress,
        Done,
    }

    fn visit(
        name: &str,
        nodes: &HashMap<String, GraphNode>,
        marks: &mut HashMap<String, Mark>,
        path: &mut Vec<String>,
    ) -> LoaderResult<()> {
        match marks.get(name) {
            Some(Mark::Done) => return Ok(()),
            Some(Mark::InProgress) => {
                let mut cycle = path.clone();
                cycle.push(name.to_string());
                return Err(LoaderError::CycleDetected(cycle));
            }
            None => {}
        }

        marks.insert(name.to_string(), Mark::InProgress);
        path.push(name.to_string());

        if let Some(node) = nodes.get(name) {
            for target in node.next.values() {
                visit(target, nodes, marks, path)?;
            }
        }

        path.pop();
        marks.insert(name.to_string(), Mark::Done);
        Ok(())
    }

    let mut marks = HashMap::new();
    let mut path = Vec::new();
    visit(entry, nodes, &mut marks, &mut path)?;

    // The entry point's reachable set may not cover every node (an isolated
    // node the loader still accepted as long as it isn't referenced); check
    // each remaining node as its own DFS root so an unreachable cycle is
    // still caught.
    for name in nodes.keys() {
        if !matches!(marks.get(name), Some(Mark::Done)) {
            visit(name, nodes, &mut marks, &mut path)?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raw::RawNode;

    fn known() -> HashSet<String> {
        ["base", "split", "transform"].iter().map(|s| s.to_string()).collect()
    }

    fn node(node_type: &str, next: &[(&str, &str)]) -> RawNode {
        RawNode {
            node_type: node_type.to_string(),
            params: Value::Null,
            next: next
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }

    #[test]
    fn infers_start_by_name() {
        let mut nodes = HashMap::new();
        nodes.insert("start".to_string(), node("base", &[("default", "end")]));
        nodes.insert("end".to_string(), node("base", &[]));
        let doc = RawFlowDocument {
            metadata: Default::default(),
            nodes,
        };
        let graph = build_graph(doc, &known()).unwrap();
        assert_eq!(graph.entry, "start");
    }

    #[test]
    fn infers_entry_from_unique_root_when_no_start_node() {
        let mut nodes = HashMap::new();
        nodes.insert("first".to_string(), node("base", &[("default", "second")]));
        nodes.insert("second".to_string(), node("base", &[]));
        let doc = RawFlowDocument {
            metadata: Default::default(),
            nodes,
        };
        let graph = build_graph(doc, &known()).unwrap();
        assert_eq!(graph.entry, "first");
    }

    #[test]
    fn rejects_unknown_node_type() {
        let mut nodes = HashMap::new();
        nodes.insert("start".to_string(), node("nonexistent", &[]));
        let doc = RawFlowDocument {
            metadata: Default::default(),
            nodes,
        };
        assert!(matches!(
            build_graph(doc, &known()),
            Err(LoaderError::UnknownNodeType { .. })
        ));
    }

    #[test]
    fn rejects_dangling_successor() {
        let mut nodes = HashMap::new();
        nodes.insert("start".to_string(), node("base", &[("default", "nope")]));
        let doc = RawFlowDocument {
            metadata: Default::default(),
            nodes,
        };
        assert!(matches!(
            build_graph(doc, &known()),
            Err(LoaderError::UnknownSuccessor { .. })
        ));
    }

    #[test]
    fn rejects_ambiguous_entry_point() {
        let mut nodes = HashMap::new();
        nodes.insert("a".to_string(), node("base", &[]));
        nodes.insert("b".to_string(), node("base", &[]));
        let doc = RawFlowDocument {
            metadata: Default::default(),
            nodes,
        };
        assert!(matches!(
            build_graph(doc, &known()),
            Err(LoaderError::AmbiguousEntryPoint(_))
        ));
    }

    #[test]
    fn rejects_cycles() {
        let mut nodes = HashMap::new();
        nodes.insert("start".to_string(), node("base", &[("default", "loop")]));
        nodes.insert("loop".to_string(), node("base", &[("default", "start")]));
        let doc = RawFlowDocument {
            metadata: Default::default(),
            nodes,
        };
        assert!(matches!(
            build_graph(doc, &known()),
            Err(LoaderError::CycleDetected(_))
        ));
    }

    #[test]
    fn split_fan_out_to_a_shared_join_is_not_a_cycle() {
        let mut nodes = HashMap::new();
        nodes.insert(
            "start".to_string(),
            node("split", &[("branch1", "t1"), ("branch2", "t2"), ("default", "out")]),
        );
        nodes.insert("t1".to_string(), node("base", &[("default", "out")]));
        nodes.insert("t2".to_string(), node("base", &[("default", "out")]));
        nodes.insert("out".to_string(), node("base", &[]));
        let doc = RawFlowDocument {
            metadata: Default::default(),
            nodes,
        };
        let graph = build_graph(doc, &known()).unwrap();
        assert!(graph.node("start").unwrap().is_split());
    }
}
