//! Audit sink port (driven/secondary port)
//!
//! The sink receives finished [`AuditRecord`]s. It is shared by the walker
//! and every worker, so implementations must serialize concurrent appends:
//! two records may never interleave within one line.

use crate::domain::audit::AuditRecord;

/// Destination for transaction log records
///
/// `append` is synchronous; a record is a single short line and the
/// recorder calls it from inside async tasks while holding no other locks.
pub trait IAuditSink: Send + Sync {
    /// Writes one record
    ///
    /// Errors are reported to the caller, which logs and discards them.
    fn append(&self, record: &AuditRecord) -> anyhow::Result<()>;
}
