use flowrunner_loader::LoaderError;
use flowrunner_storage::StorageError;

pub type EngineResult<T> = Result<T, EngineError>;

/// Errors surfaced by the `Runtime`. Node-local failures are folded into
/// `NodeFailed` before they reach here; everything else is a runtime-level
/// concern (missing flow, bad graph, unknown execution, cancellation).
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    // --- Lookup errors -----------------------------------------------
    #[error("flow not found")]
    FlowNotFound,
    #[error("execution not found")]
    ExecutionNotFound,

    // --- Graph/validation errors --------------------------------------
    #[error("invalid flow: {0}")]
    InvalidFlow(#[from] LoaderError),

    // --- Execution-time errors -----------------------------------------
    #[error("secret not found: {0}")]
    SecretNotFound(String),
    #[error("node '{node}' failed: {cause}")]
    NodeFailed { node: String, cause: String },
    #[error("execution cancelled")]
    Cancelled,
    #[error("execution timed out")]
    Timeout,

    // --- Internal --------------------------------------------------------
    #[error("storage error: {0}")]
    Storage(StorageError),
    #[error("internal engine error: {0}")]
    Internal(String),
}

impl From<StorageError> for EngineError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound => EngineError::ExecutionNotFound,
            other => EngineError::Storage(other),
        }
    }
}
