//! Audit sink implementations
//!
//! - [`FileAuditSink`] appends rendered records to the transaction log file.
//! - [`MemoryAuditSink`] keeps records in memory (dry runs and tests).

use std::fs::{File, OpenOptions};
use std::io::{LineWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::Context;
use gdup_core::{domain::audit::AuditRecord, ports::audit_sink::IAuditSink};

/// Appends one line per record to a file
///
/// The writer sits behind a mutex held for the whole line, so records
/// from concurrent workers never interleave.
pub struct FileAuditSink {
    path: PathBuf,
    writer: Mutex<LineWriter<File>>,
}

impl FileAuditSink {
    /// Opens `path` for appending, creating it and its parent directory if needed
    pub fn open(path: &Path) -> anyhow::Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating audit log directory {}", parent.display()))?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("opening audit log {}", path.display()))?;

        tracing::debug!(path = %path.display(), "Opened audit log");
        Ok(Self {
            path: path.to_path_buf(),
            writer: Mutex::new(LineWriter::new(file)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl IAuditSink for FileAuditSink {
    fn append(&self, record: &AuditRecord) -> anyhow::Result<()> {
        let mut writer = self
            .writer
            .lock()
            .map_err(|_| anyhow::anyhow!("audit log writer lock poisoned"))?;
        writeln!(writer, "{record}")?;
        writer.flush()?;
        Ok(())
    }
}

/// Keeps records in memory
#[derive(Default)]
pub struct MemoryAuditSink {
    records: Mutex<Vec<AuditRecord>>,
}

impl MemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every record appended so far
    pub fn records(&self) -> Vec<AuditRecord> {
        self.records.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn len(&self) -> usize {
        self.records.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl IAuditSink for MemoryAuditSink {
    fn append(&self, record: &AuditRecord) -> anyhow::Result<()> {
        self.records
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(record.clone());
        Ok(())
    }
}
