//! Audit command - read the transaction log
//!
//! Provides the `gdup audit` CLI command which:
//! 1. Reads every record from the transaction log (or `--file`)
//! 2. Filters by status, operation and failures
//! 3. Prints the records, or with `--summary` the counts per operation
//!    and status

use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use clap::Args;
use gdup_audit::{read_log, AuditTally};
use gdup_core::domain::audit::{AuditOperation, AuditRecord, StatusCode};
use tracing::info;

use super::ConfigSource;
use crate::output::{get_formatter, OutputFormat, OutputFormatter};

#[derive(Debug, Args)]
pub struct AuditCommand {
    /// Transaction log to read (default: audit.file from the config)
    #[arg(long)]
    pub file: Option<PathBuf>,

    /// Only records with this status code
    #[arg(long)]
    pub status: Option<u16>,

    /// Only records of this operation (mkdir, stat, insert, update, bad_source)
    #[arg(long)]
    pub op: Option<String>,

    /// Only records that neither succeeded nor were already up to date
    #[arg(long)]
    pub failures: bool,

    /// Show only the last N matching records
    #[arg(long)]
    pub limit: Option<usize>,

    /// Print counts per operation and status instead of records
    #[arg(long)]
    pub summary: bool,
}

/// Record predicate built from the command line
#[derive(Debug, Default)]
struct Filter {
    status: Option<StatusCode>,
    operation: Option<AuditOperation>,
    failures: bool,
}

impl Filter {
    fn matches(&self, record: &AuditRecord) -> bool {
        if self.status.is_some_and(|s| s != record.status()) {
            return false;
        }
        if self.operation.is_some_and(|op| op != record.operation()) {
            return false;
        }
        if self.failures
            && matches!(record.status(), StatusCode::SUCCESS | StatusCode::NOT_MODIFIED)
        {
            return false;
        }
        true
    }
}

impl AuditCommand {
    fn filter(&self) -> Result<Filter> {
        let operation = self
            .op
            .as_deref()
            .map(str::parse::<AuditOperation>)
            .transpose()
            .context("Invalid --op value")?;
        Ok(Filter {
            status: self.status.map(StatusCode::new),
            operation,
            failures: self.failures,
        })
    }

    pub async fn execute(&self, source: &ConfigSource, format: OutputFormat) -> Result<()> {
        let formatter = get_formatter(format);
        let filter = self.filter()?;

        let path = match &self.file {
            Some(path) => path.clone(),
            None => source.load()?.audit.resolved_file(),
        };
        if !path.exists() {
            formatter.error(&format!(
                "No transaction log at {}. Run 'gdup run' first.",
                path.display()
            ));
            return Ok(());
        }

        let contents = read_log(&path)?;
        info!(
            log = %path.display(),
            records = contents.records.len(),
            malformed = contents.malformed.len(),
            "Read transaction log"
        );

        let mut matching: Vec<&AuditRecord> =
            contents.records.iter().filter(|r| filter.matches(r)).collect();
        if let Some(limit) = self.limit {
            let skip = matching.len().saturating_sub(limit);
            matching.drain(..skip);
        }

        if self.summary {
            let tally: AuditTally = matching.iter().copied().collect();
            if format.is_json() {
                formatter.print_json(&serde_json::to_value(&tally)?);
            } else {
                print_tally(formatter.as_ref(), &tally);
            }
        } else if format.is_json() {
            formatter.print_json(&serde_json::to_value(&matching)?);
        } else if matching.is_empty() {
            formatter.info("No matching records");
        } else {
            for record in &matching {
                formatter.line(&format_record(record));
            }
        }

        if !contents.malformed.is_empty() {
            formatter.warn(&format!(
                "{} malformed lines skipped (first at line {})",
                contents.malformed.len(),
                contents.malformed[0].0
            ));
        }
        Ok(())
    }
}

fn format_record(record: &AuditRecord) -> String {
    let time = DateTime::from_timestamp_millis(record.start_time_ms())
        .map(|t| t.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| record.start_time_ms().to_string());
    let subject = record
        .title()
        .or(record.source())
        .unwrap_or("-");
    format!(
        "{time}  {:>3}  {:<10}  {:>6}ms  {}  {subject}",
        record.status().as_u16(),
        record.operation().as_str(),
        record.duration_ms(),
        record.parent(),
    )
}

fn print_tally(formatter: &dyn OutputFormatter, tally: &AuditTally) {
    formatter.success(&format!("{} records", tally.total()));
    for (operation, statuses) in tally.by_operation() {
        let counts: Vec<String> = statuses
            .iter()
            .map(|(status, count)| format!("{}={count}", status.as_u16()))
            .collect();
        formatter.info(&format!("{:<10} {}", operation.as_str(), counts.join(" ")));
    }
    if tally.failures() > 0 {
        formatter.warn(&format!("{} records did not succeed", tally.failures()));
    }
}

#[cfg(test)]
mod tests {
    use gdup_core::domain::newtypes::{SessionId, TargetParent};

    use super::*;

    fn record(op: AuditOperation, status: StatusCode) -> AuditRecord {
        let mut r = AuditRecord::new(
            op,
            TargetParent::Broken,
            Some("a b.txt".to_string()),
            SessionId::nil(),
            "127.0.0.1",
            7,
        );
        r.set_status(status);
        r
    }

    fn command(op: Option<&str>, status: Option<u16>, failures: bool) -> AuditCommand {
        AuditCommand {
            file: None,
            status,
            op: op.map(str::to_string),
            failures,
            limit: None,
            summary: false,
        }
    }

    #[test]
    fn test_filter_by_operation_and_status() {
        let filter = command(Some("insert"), Some(200), false).filter().unwrap();
        assert!(filter.matches(&record(AuditOperation::Insert, StatusCode::SUCCESS)));
        assert!(!filter.matches(&record(AuditOperation::Update, StatusCode::SUCCESS)));
        assert!(!filter.matches(&record(AuditOperation::Insert, StatusCode::CONFLICT)));
    }

    #[test]
    fn test_failures_filter() {
        let filter = command(None, None, true).filter().unwrap();
        assert!(!filter.matches(&record(AuditOperation::Stat, StatusCode::SUCCESS)));
        assert!(!filter.matches(&record(AuditOperation::Update, StatusCode::NOT_MODIFIED)));
        assert!(filter.matches(&record(AuditOperation::Stat, StatusCode::NOT_FOUND)));
    }

    #[test]
    fn test_unknown_operation_is_rejected() {
        assert!(command(Some("delete"), None, false).filter().is_err());
    }

    #[test]
    fn test_format_record_shows_title() {
        let line = format_record(&record(AuditOperation::Mkdir, StatusCode::CONFLICT));
        assert!(line.contains("409"));
        assert!(line.contains("mkdir"));
        assert!(line.ends_with("a b.txt"));
    }

    #[tokio::test]
    async fn test_reads_log_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("transaction.log");
        let lines = [
            record(AuditOperation::Stat, StatusCode::NOT_FOUND).to_string(),
            record(AuditOperation::Insert, StatusCode::SUCCESS).to_string(),
            "garbage".to_string(),
        ];
        std::fs::write(&path, lines.join("\n")).unwrap();

        let cmd = AuditCommand {
            file: Some(path),
            summary: true,
            ..command(None, None, false)
        };
        cmd.execute(&ConfigSource::resolve(None), OutputFormat::Json)
            .await
            .unwrap();
    }
}
