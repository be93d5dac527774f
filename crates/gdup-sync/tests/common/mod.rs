//! Shared fixtures for gdup-sync integration tests

#![allow(dead_code)]

use std::path::Path;
use std::sync::Arc;

use gdup_audit::{AuditRecorder, MemoryAuditSink, SessionContext};
use gdup_core::domain::audit::{AuditOperation, AuditRecord};
use gdup_core::domain::newtypes::SessionId;
use gdup_drive::InMemoryRemoteStore;
use gdup_sync::SyncProtocol;

/// A protocol wired to an in-memory store and an in-memory audit sink
pub struct Harness {
    pub store: Arc<InMemoryRemoteStore>,
    pub sink: Arc<MemoryAuditSink>,
    pub protocol: SyncProtocol,
}

impl Harness {
    pub fn new() -> Self {
        let store = Arc::new(InMemoryRemoteStore::new());
        let sink = Arc::new(MemoryAuditSink::new());
        let recorder = Arc::new(AuditRecorder::new(
            sink.clone(),
            SessionContext::new(SessionId::new(), "test-host", 4242),
        ));
        let protocol = SyncProtocol::new(store.clone(), recorder);
        Self {
            store,
            sink,
            protocol,
        }
    }

    pub fn records(&self) -> Vec<AuditRecord> {
        self.sink.records()
    }

    /// Records of one operation, in write order
    pub fn records_of(&self, operation: AuditOperation) -> Vec<AuditRecord> {
        self.records()
            .into_iter()
            .filter(|r| r.operation() == operation)
            .collect()
    }
}

pub fn write_file(path: &Path, content: &[u8]) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(path, content).unwrap();
}
