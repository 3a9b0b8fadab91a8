use std::collections::VecDeque;

use flowrunner_types::LogEntry;

/// Bounded per-execution log buffer (spec §5: "ring buffer of bounded
/// capacity, default 10 000 entries; overflow evicts oldest and increments
/// a drop counter").
pub struct LogRingBuffer {
    capacity: usize,
    entries: VecDeque<LogEntry>,
    dropped: u64,
}

pub const DEFAULT_LOG_CAPACITY: usize = 10_000;

impl LogRingBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: VecDeque::new(),
            dropped: 0,
        }
    }

    pub fn push(&mut self, entry: LogEntry) {
        if self.entries.len() >= self.capacity {
            self.entries.pop_front();
            self.dropped += 1;
        }
        self.entries.push_back(entry);
    }

    pub fn snapshot(&self) -> Vec<LogEntry> {
        self.entries.iter().cloned().collect()
    }

    pub fn dropped_count(&self) -> u64 {
        self.dropped
    }
}

impl Default for LogRingBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_LOG_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use flowrunner_types::{ExecutionId, LogLevel};

    fn entry(msg: &str) -> LogEntry {
        LogEntry {
            execution_id: ExecutionId::new(),
            timestamp: Utc::now(),
            level: LogLevel::Info,
            node_id: None,
            message: msg.to_string(),
            data: None,
        }
    }

    #[test]
    fn evicts_oldest_and_counts_drops_past_capacity() {
        let mut buf = LogRingBuffer::new(2);
        buf.push(entry("a"));
        buf.push(entry("b"));
        buf.push(entry("c"));
        let snapshot = buf.snapshot();
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot[0].message, "b");
        assert_eq!(snapshot[1].message, "c");
        assert_eq!(buf.dropped_count(), 1);
    }
}
