//! Execution status/log responses are served directly as
//! `flowrunner_types::ExecutionStatusView`/`Vec<LogEntry>` — no wrapper DTO
//! needed, they're already the wire shape spec §6 pins.
