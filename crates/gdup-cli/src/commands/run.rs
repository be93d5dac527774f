//! Run command - synchronize every configured directory
//!
//! Provides the `gdup run` CLI command which:
//! 1. Loads and validates the configuration
//! 2. Opens the Drive store and the transaction log
//! 3. Runs the sync engine until the upload queue drains
//! 4. Prints a summary of the records written
//!
//! Individual transfer failures do not change the exit status; they are in
//! the transaction log.

use anyhow::Result;
use clap::Args;
use gdup_sync::{RunSummary, SyncEngine};
use tracing::info;

use super::{ConfigSource, Session};
use crate::output::{get_formatter, human_size, OutputFormat, OutputFormatter};

#[derive(Debug, Args)]
pub struct RunCommand {
    /// Walk and plan against an empty in-memory store; nothing is uploaded
    #[arg(long)]
    pub dry_run: bool,

    /// Override the configured number of upload workers
    #[arg(long, allow_negative_numbers = true)]
    pub workers: Option<i64>,
}

impl RunCommand {
    pub async fn execute(&self, source: &ConfigSource, format: OutputFormat) -> Result<()> {
        let formatter = get_formatter(format);
        let mut config = source.load_valid()?;
        if let Some(workers) = self.workers {
            config.workers = workers;
        }

        if config.directories.is_empty() {
            formatter.warn(&format!(
                "No directories configured in {}",
                source.path().display()
            ));
            return Ok(());
        }

        let session = Session::open(&config, self.dry_run)?;
        let engine = SyncEngine::from_config(session.protocol.clone(), &config);
        info!(
            workers = engine.workers(),
            directories = config.directories.len(),
            dry_run = self.dry_run,
            "Starting run"
        );

        let summary = engine.run(&session.target_root, &config.directories).await;

        if format.is_json() {
            let mut json = serde_json::to_value(&summary)?;
            json["dry_run"] = serde_json::Value::Bool(self.dry_run);
            formatter.print_json(&json);
        } else {
            print_summary(formatter.as_ref(), &summary, self.dry_run);
        }
        Ok(())
    }
}

fn print_summary(formatter: &dyn OutputFormatter, summary: &RunSummary, dry_run: bool) {
    let heading = if dry_run { "Dry run complete" } else { "Run complete" };
    formatter.success(&format!(
        "{heading} in {:.1}s",
        summary.duration_ms as f64 / 1000.0
    ));
    formatter.info(&format!(
        "Directories: {} walked, {} skipped",
        summary.mappings_walked, summary.mappings_skipped
    ));
    formatter.info(&format!(
        "Files: {} scheduled, {} processed",
        summary.files_scheduled, summary.tasks_completed
    ));
    formatter.info(&format!(
        "Folders: {} seen, {} failed",
        summary.directories, summary.mkdir_failures
    ));
    if summary.bad_sources > 0 {
        formatter.warn(&format!("{} unsupported or unreadable entries", summary.bad_sources));
    }

    formatter.info("");
    formatter.info("Records by status:");
    for (status, count) in summary.records.by_status() {
        formatter.info(&format!("  {:>3} {:<14} {count}", status.as_u16(), status.label()));
    }
    let bytes = summary.records.bytes_transferred();
    if bytes > 0 {
        formatter.info(&format!("Transferred: {}", human_size(bytes)));
    }
    if summary.records.failures() > 0 {
        formatter.warn(&format!(
            "{} records did not succeed; see the transaction log",
            summary.records.failures()
        ));
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    fn write_config(dir: &std::path::Path, source: &std::path::Path) -> PathBuf {
        let path = dir.join("config.yaml");
        let yaml = format!(
            "workers: 2\ndirectories:\n  - source: {}\n    target: backup/docs\n    recursive: yes\n",
            source.display()
        );
        std::fs::write(&path, yaml).unwrap();
        path
    }

    #[tokio::test]
    async fn test_dry_run_completes_without_token() {
        let dir = tempfile::tempdir().unwrap();
        let tree = dir.path().join("docs");
        std::fs::create_dir_all(tree.join("nested")).unwrap();
        std::fs::write(tree.join("a.txt"), b"a").unwrap();
        std::fs::write(tree.join("nested/b.txt"), b"b").unwrap();

        let source = ConfigSource::resolve(Some(write_config(dir.path(), &tree)));
        let cmd = RunCommand {
            dry_run: true,
            workers: None,
        };
        cmd.execute(&source, OutputFormat::Json).await.unwrap();
    }

    #[tokio::test]
    async fn test_real_run_without_token_fails() {
        if std::env::var(gdup_core::config::ACCESS_TOKEN_ENV).is_ok() {
            return;
        }
        let dir = tempfile::tempdir().unwrap();
        let source = ConfigSource::resolve(Some(write_config(dir.path(), dir.path())));
        let cmd = RunCommand {
            dry_run: false,
            workers: None,
        };
        let err = cmd.execute(&source, OutputFormat::Json).await.unwrap_err();
        assert!(err.to_string().contains("access token"));
    }
}
