use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::execution::ExecutionStatus;
use crate::ids::ExecutionId;
use crate::log::LogEntry;

/// One push frame on an execution's subscription stream: either a status
/// transition, a log line, the terminal "complete" marker, or a
/// WebSocket-level pong. Wire shape is spec-pinned (§6) for client
/// compatibility — `status`/`log` are mutually exclusive with the frame's
/// `kind`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionUpdate {
    #[serde(rename = "type")]
    pub kind: ExecutionUpdateKind,
    pub execution_id: ExecutionId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<ExecutionStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log: Option<LogEntry>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionUpdateKind {
    Status,
    Log,
    Complete,
    Pong,
}

impl ExecutionUpdate {
    pub fn status(execution_id: ExecutionId, status: ExecutionStatus) -> Self {
        Self {
            kind: if status.is_terminal() {
                ExecutionUpdateKind::Complete
            } else {
                ExecutionUpdateKind::Status
            },
            execution_id,
            status: Some(status),
            log: None,
            timestamp: Utc::now(),
        }
    }

    pub fn log(execution_id: ExecutionId, entry: LogEntry) -> Self {
        Self {
            kind: ExecutionUpdateKind::Log,
            execution_id,
            status: None,
            log: Some(entry),
            timestamp: Utc::now(),
        }
    }
}
