use thiserror::Error;

#[derive(Debug, Error)]
pub enum LoaderError {
    #[error("failed to parse flow YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("flow has no nodes")]
    EmptyFlow,

    #[error("node '{node}' has unknown type '{node_type}'")]
    UnknownNodeType { node: String, node_type: String },

    #[error("node '{node}' has successor '{target}' under label '{label}' that does not exist")]
    UnknownSuccessor {
        node: String,
        label: String,
        target: String,
    },

    #[error("flow has no entry point: no node named 'start' and no node without predecessors")]
    NoEntryPoint,

    #[error("flow entry point is ambiguous: candidates {0:?}")]
    AmbiguousEntryPoint(Vec<String>),

    #[error("flow contains a cycle: {0:?}")]
    CycleDetected(Vec<String>),
}

pub type LoaderResult<T> = Result<T, LoaderError>;
