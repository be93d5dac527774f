//! Mkpath command - create a folder path on Drive
//!
//! `gdup mkpath backup/photos/2024` creates every missing component below
//! the target root (or `--parent`) and prints the id of the last one.

use anyhow::{bail, Result};
use clap::Args;
use gdup_core::domain::audit::StatusCode;

use super::{parse_remote_id, ConfigSource, Session};
use crate::output::{get_formatter, OutputFormat};

#[derive(Debug, Args)]
pub struct MkpathCommand {
    /// Folder path, `/` or `\` separated
    pub path: String,

    /// Folder to create the path under (default: target_root)
    #[arg(long)]
    pub parent: Option<String>,
}

impl MkpathCommand {
    pub async fn execute(&self, source: &ConfigSource, format: OutputFormat) -> Result<()> {
        let formatter = get_formatter(format);
        let config = source.load_valid()?;
        let session = Session::open(&config, false)?;
        let parent = match &self.parent {
            Some(id) => parse_remote_id(id)?,
            None => session.target_root.clone(),
        };

        let outcome = session.protocol.mkpath(&parent, &self.path).await;
        let Some(id) = outcome.value else {
            bail!(
                "Could not create '{}' ({} {})",
                self.path,
                outcome.status.as_u16(),
                outcome.status.label()
            );
        };

        if format.is_json() {
            formatter.print_json(&serde_json::json!({
                "path": self.path,
                "parent": parent.to_string(),
                "id": id.to_string(),
                "status": outcome.status.as_u16(),
            }));
        } else if outcome.status == StatusCode::NOT_MODIFIED {
            formatter.success(&format!("{} already exists ({id})", self.path));
        } else {
            formatter.success(&format!("Created {} ({id})", self.path));
        }
        Ok(())
    }
}
