//! Shared domain types for FlowRunner: Account, Flow, Execution, LogEntry,
//! StructuredSecret, and the opaque id newtypes that key them.

pub mod account;
pub mod event;
pub mod execution;
pub mod flow;
pub mod ids;
pub mod log;
pub mod secret;

pub use account::{Account, AccountInfo};
pub use event::{ExecutionUpdate, ExecutionUpdateKind};
pub use execution::{Execution, ExecutionMetadata, ExecutionStatus, ExecutionStatusView};
pub use flow::{Flow, FlowInfo, FlowMetadata, FlowSearchQuery};
pub use ids::{AccountId, ExecutionId, FlowId};
pub use log::{LogEntry, LogLevel};
pub use secret::{SecretMetadata, SecretSearchQuery, SecretType, StructuredSecret};

/// The JSON value type used for node parameters, node outputs, and the
/// `shared` execution namespace.
pub type JsonValue = serde_json::Value;
