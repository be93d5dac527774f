//! Ls command - list a remote folder

use anyhow::{Context, Result};
use clap::Args;
use gdup_core::ports::remote_store::RemoteChild;

use super::{parse_remote_id, ConfigSource, Session};
use crate::output::{get_formatter, human_size, OutputFormat};

#[derive(Debug, Args)]
pub struct LsCommand {
    /// Folder id to list (default: target_root)
    pub parent: Option<String>,
}

impl LsCommand {
    pub async fn execute(&self, source: &ConfigSource, format: OutputFormat) -> Result<()> {
        let formatter = get_formatter(format);
        let config = source.load_valid()?;
        let session = Session::open(&config, false)?;
        let parent = match &self.parent {
            Some(id) => parse_remote_id(id)?,
            None => session.target_root.clone(),
        };

        let mut children = session
            .protocol
            .store()
            .list_children(&parent)
            .await
            .with_context(|| format!("Failed to list {parent}"))?;
        children.sort_by(|a, b| {
            b.stat
                .is_folder()
                .cmp(&a.stat.is_folder())
                .then_with(|| a.title.cmp(&b.title))
        });

        if format.is_json() {
            formatter.print_json(&serde_json::to_value(&children)?);
            return Ok(());
        }
        if children.is_empty() {
            formatter.info(&format!("{parent} is empty"));
            return Ok(());
        }
        for child in &children {
            formatter.line(&format_child(child));
        }
        Ok(())
    }
}

fn format_child(child: &RemoteChild) -> String {
    let stat = &child.stat;
    if stat.is_folder() {
        format!("{:<7} {:>10}  {:<32}  {}/  {}", "folder", "-", "-", child.title, stat.id())
    } else {
        let size = stat.size().map(human_size).unwrap_or_else(|| "-".to_string());
        let hash = stat
            .content_hash()
            .map(|h| h.to_string())
            .unwrap_or_else(|| "-".to_string());
        format!("{:<7} {:>10}  {:<32}  {}  {}", "file", size, hash, child.title, stat.id())
    }
}
