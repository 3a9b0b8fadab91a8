use std::collections::HashMap;

use flowrunner_types::FlowMetadata;
use serde::Deserialize;
use serde_json::Value;

/// Direct serde mirror of the YAML flow format (spec §6): deliberately
/// tolerant on input so the validation pass in `graph.rs` can report one
/// precise `LoaderError` instead of a serde parse failure.
#[derive(Debug, Deserialize)]
pub struct RawFlowDocument {
    #[serde(default)]
    pub metadata: FlowMetadata,
    #[serde(default)]
    pub nodes: HashMap<String, RawNode>,
}

#[derive(Debug, Deserialize)]
pub struct RawNode {
    #[serde(rename = "type")]
    pub node_type: String,
    #[serde(default)]
    pub params: Value,
    #[serde(default)]
    pub next: HashMap<String, String>,
}
