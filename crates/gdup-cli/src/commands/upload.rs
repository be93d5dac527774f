//! Upload command - push a single file
//!
//! Runs the same idempotent upload the workers use: an identical remote
//! copy is left alone, a different one is replaced.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Args;
use gdup_core::domain::{audit::StatusCode, newtypes::TargetParent};

use super::{parse_remote_id, ConfigSource, Session};
use crate::output::{get_formatter, human_size, OutputFormat};

#[derive(Debug, Args)]
pub struct UploadCommand {
    /// Local file to upload
    pub file: PathBuf,

    /// Folder to upload into (default: target_root)
    #[arg(long)]
    pub parent: Option<String>,

    /// Remote title (default: the file name)
    #[arg(long)]
    pub title: Option<String>,
}

impl UploadCommand {
    /// Remote title for the upload
    fn resolve_title(&self) -> Result<String> {
        if let Some(title) = &self.title {
            return Ok(title.clone());
        }
        self.file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .with_context(|| format!("{} has no file name", self.file.display()))
    }

    pub async fn execute(&self, source: &ConfigSource, format: OutputFormat) -> Result<()> {
        let formatter = get_formatter(format);
        if !self.file.is_file() {
            bail!("{} is not a regular file", self.file.display());
        }
        let title = self.resolve_title()?;

        let config = source.load_valid()?;
        let session = Session::open(&config, false)?;
        let parent = match &self.parent {
            Some(id) => parse_remote_id(id)?,
            None => session.target_root.clone(),
        };

        let outcome = session
            .protocol
            .upload(&self.file, &TargetParent::Folder(parent), &title)
            .await;
        let status = outcome.status;
        let Some(stat) = outcome.value else {
            bail!(
                "Upload of {} failed ({} {})",
                self.file.display(),
                status.as_u16(),
                status.label()
            );
        };

        if format.is_json() {
            formatter.print_json(&serde_json::json!({
                "file": self.file.display().to_string(),
                "title": title,
                "status": status.as_u16(),
                "remote": stat,
            }));
        } else {
            let verb = if status == StatusCode::NOT_MODIFIED {
                "Unchanged"
            } else {
                "Uploaded"
            };
            formatter.success(&format!("{verb} {title} ({})", stat.id()));
            if let (Some(size), Some(hash)) = (stat.size(), stat.content_hash()) {
                formatter.info(&format!("{} md5 {hash}", human_size(size)));
            }
        }
        Ok(())
    }
}
