//! Transaction log reader

use std::io::{BufRead, BufReader};
use std::path::Path;

use anyhow::Context;
use gdup_core::domain::audit::AuditRecord;

/// Parsed contents of a transaction log
#[derive(Debug, Default)]
pub struct LogContents {
    pub records: Vec<AuditRecord>,
    /// `(line number, error)` for every line that did not parse
    pub malformed: Vec<(usize, String)>,
}

/// Reads every record in the log at `path`
///
/// Blank lines are skipped. Lines that fail to parse are collected in
/// [`LogContents::malformed`] rather than aborting the read.
pub fn read_log(path: &Path) -> anyhow::Result<LogContents> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("opening audit log {}", path.display()))?;

    let mut contents = LogContents::default();
    for (idx, line) in BufReader::new(file).lines().enumerate() {
        let line = line.with_context(|| format!("reading audit log {}", path.display()))?;
        if line.trim().is_empty() {
            continue;
        }
        match line.parse::<AuditRecord>() {
            Ok(record) => contents.records.push(record),
            Err(e) => {
                tracing::warn!(line = idx + 1, error = %e, "Skipping malformed audit line");
                contents.malformed.push((idx + 1, e.to_string()));
            }
        }
    }
    Ok(contents)
}
