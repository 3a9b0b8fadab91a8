use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ids::{AccountId, ExecutionId, FlowId};

/// `pending -> running -> {completed | failed | cancelled}`. Terminal
/// variants are absorbing: once reached, no further transition is valid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl ExecutionStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            ExecutionStatus::Completed | ExecutionStatus::Failed | ExecutionStatus::Cancelled
        )
    }

    /// Ordinal used to check that observed statuses never go backwards.
    /// Terminal states share an ordinal: the spec only requires
    /// `pending < running < {terminal}`, not an order among terminal kinds.
    pub fn rank(self) -> u8 {
        match self {
            ExecutionStatus::Pending => 0,
            ExecutionStatus::Running => 1,
            ExecutionStatus::Completed | ExecutionStatus::Failed | ExecutionStatus::Cancelled => 2,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExecutionMetadata {
    /// Number of log entries evicted from the bounded ring buffer.
    #[serde(default)]
    pub dropped_log_count: u64,
}

/// One invocation of a flow. See `ExecutionStatus` for the status machine and
/// the invariants tying `end_time`/`current_node`/`error` to it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Execution {
    pub id: ExecutionId,
    pub flow_id: FlowId,
    pub account_id: AccountId,
    pub status: ExecutionStatus,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub current_node: Option<String>,
    /// Advisory estimate in [0, 1]: `visited_nodes / reachable_nodes`.
    pub progress: f64,
    pub results: HashMap<String, Value>,
    pub error: Option<String>,
    pub metadata: ExecutionMetadata,
}

impl Execution {
    pub fn new_pending(id: ExecutionId, flow_id: FlowId, account_id: AccountId) -> Self {
        Self {
            id,
            flow_id,
            account_id,
            status: ExecutionStatus::Pending,
            start_time: None,
            end_time: None,
            current_node: None,
            progress: 0.0,
            results: HashMap::new(),
            error: None,
            metadata: ExecutionMetadata::default(),
        }
    }

    /// Serializable view used by the HTTP layer, which additionally aliases
    /// `results` as `result` for backward compatibility (spec §6).
    pub fn to_status_view(&self) -> ExecutionStatusView {
        ExecutionStatusView {
            id: self.id.clone(),
            flow_id: self.flow_id.clone(),
            account_id: self.account_id.clone(),
            status: self.status,
            start_time: self.start_time,
            end_time: self.end_time,
            current_node: self.current_node.clone(),
            progress: self.progress,
            results: self.results.clone(),
            result: self.results.clone(),
            error: self.error.clone(),
            metadata: self.metadata.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionStatusView {
    pub id: ExecutionId,
    pub flow_id: FlowId,
    pub account_id: AccountId,
    pub status: ExecutionStatus,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub current_node: Option<String>,
    pub progress: f64,
    pub results: HashMap<String, Value>,
    /// Alias of `results`, kept for clients written against the older field
    /// name.
    pub result: HashMap<String, Value>,
    pub error: Option<String>,
    pub metadata: ExecutionMetadata,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rank_is_monotonic_across_the_status_machine() {
        assert!(ExecutionStatus::Pending.rank() < ExecutionStatus::Running.rank());
        assert!(ExecutionStatus::Running.rank() < ExecutionStatus::Completed.rank());
        assert!(ExecutionStatus::Running.rank() < ExecutionStatus::Failed.rank());
        assert!(ExecutionStatus::Running.rank() < ExecutionStatus::Cancelled.rank());
    }

    #[test]
    fn terminal_states_are_recognized() {
        assert!(ExecutionStatus::Completed.is_terminal());
        assert!(ExecutionStatus::Failed.is_terminal());
        assert!(ExecutionStatus::Cancelled.is_terminal());
        assert!(!ExecutionStatus::Pending.is_terminal());
        assert!(!ExecutionStatus::Running.is_terminal());
    }
}
