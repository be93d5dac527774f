//! Record counts by status and by operation

use std::collections::BTreeMap;

use gdup_core::domain::audit::{AuditOperation, AuditRecord, StatusCode};
use serde::Serialize;

/// Running counts of audit records
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AuditTally {
    total: u64,
    bytes_transferred: u64,
    by_status: BTreeMap<StatusCode, u64>,
    by_operation: BTreeMap<AuditOperation, BTreeMap<StatusCode, u64>>,
}

impl AuditTally {
    pub fn new() -> Self {
        Self::default()
    }

    /// Counts one record
    pub fn add(&mut self, record: &AuditRecord) {
        self.total += 1;
        self.bytes_transferred += record.bytes_transferred();
        *self.by_status.entry(record.status()).or_default() += 1;
        *self
            .by_operation
            .entry(record.operation())
            .or_default()
            .entry(record.status())
            .or_default() += 1;
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    /// Sum of `bytes_transferred` over every record
    pub fn bytes_transferred(&self) -> u64 {
        self.bytes_transferred
    }

    /// Number of records with the given status
    pub fn count(&self, status: StatusCode) -> u64 {
        self.by_status.get(&status).copied().unwrap_or(0)
    }

    /// Number of records for the given operation and status
    pub fn count_for(&self, operation: AuditOperation, status: StatusCode) -> u64 {
        self.by_operation
            .get(&operation)
            .and_then(|m| m.get(&status))
            .copied()
            .unwrap_or(0)
    }

    /// Number of records for the given operation, any status
    pub fn operation_total(&self, operation: AuditOperation) -> u64 {
        self.by_operation
            .get(&operation)
            .map(|m| m.values().sum())
            .unwrap_or(0)
    }

    pub fn by_status(&self) -> &BTreeMap<StatusCode, u64> {
        &self.by_status
    }

    pub fn by_operation(&self) -> &BTreeMap<AuditOperation, BTreeMap<StatusCode, u64>> {
        &self.by_operation
    }

    /// Records whose status is neither 200 nor 304
    pub fn failures(&self) -> u64 {
        self.total - self.count(StatusCode::SUCCESS) - self.count(StatusCode::NOT_MODIFIED)
    }
}

impl<'a> FromIterator<&'a AuditRecord> for AuditTally {
    fn from_iter<I: IntoIterator<Item = &'a AuditRecord>>(iter: I) -> Self {
        let mut tally = AuditTally::new();
        for record in iter {
            tally.add(record);
        }
        tally
    }
}

#[cfg(test)]
mod tests {
    use gdup_core::domain::newtypes::{SessionId, TargetParent};

    use super::*;

    fn record(op: AuditOperation, status: StatusCode) -> AuditRecord {
        let mut r = AuditRecord::new(op, TargetParent::Broken, None, SessionId::nil(), "127.0.0.1", 1);
        r.set_status(status);
        r
    }

    #[test]
    fn test_counts() {
        let records = vec![
            record(AuditOperation::Stat, StatusCode::NOT_FOUND),
            record(AuditOperation::Insert, StatusCode::SUCCESS),
            record(AuditOperation::Stat, StatusCode::SUCCESS),
            record(AuditOperation::Update, StatusCode::NOT_MODIFIED),
            record(AuditOperation::BadSource, StatusCode::UNSUPPORTED_SOURCE),
        ];
        let tally: AuditTally = records.iter().collect();

        assert_eq!(tally.total(), 5);
        assert_eq!(tally.count(StatusCode::SUCCESS), 2);
        assert_eq!(tally.count_for(AuditOperation::Stat, StatusCode::NOT_FOUND), 1);
        assert_eq!(tally.operation_total(AuditOperation::Stat), 2);
        assert_eq!(tally.operation_total(AuditOperation::Mkdir), 0);
        assert_eq!(tally.failures(), 2);
    }

    #[test]
    fn test_empty() {
        let tally = AuditTally::new();
        assert_eq!(tally.total(), 0);
        assert_eq!(tally.failures(), 0);
    }
}
