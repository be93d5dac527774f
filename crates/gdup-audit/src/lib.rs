//! gdup Audit - transaction log recording
//!
//! Provides:
//! - `AuditRecorder`: opens one `AuditSpan` per remote operation and writes
//!   exactly one record when the span finishes (or is dropped)
//! - `FileAuditSink` / `MemoryAuditSink`: `IAuditSink` implementations
//! - `AuditTally`: per-status and per-operation counts
//! - `read_log`: parses a transaction log back into records

pub mod reader;
pub mod recorder;
pub mod sink;
pub mod tally;

pub use reader::{read_log, LogContents};
pub use recorder::{AuditRecorder, AuditSpan, Outcome, SessionContext};
pub use sink::{FileAuditSink, MemoryAuditSink};
pub use tally::AuditTally;
