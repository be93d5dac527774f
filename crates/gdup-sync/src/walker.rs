//! Local directory traversal
//!
//! The walker visits one directory level at a time in file-name order:
//!
//! - regular files become [`UploadTask`]s on the queue (no remote call yet)
//! - directories are created remotely right away with `mkdir`; when
//!   recursing, a failed `mkdir` continues below the broken parent so every
//!   operation in that subtree fails visibly in the audit log
//! - anything else (symlinks, FIFOs, sockets, devices) is reported with
//!   `bad_source` and skipped; symlinks are never followed
//!
//! A source directory that is missing or unreadable is reported once with
//! `bad_source` and nothing is scheduled.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::Arc;

use gdup_core::domain::{newtypes::TargetParent, task::UploadTask};
use tracing::{debug, info, warn};

use crate::protocol::SyncProtocol;
use crate::queue::TaskQueue;

/// Counts for one `walk` call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WalkStats {
    pub files_scheduled: u64,
    pub directories: u64,
    pub mkdir_failures: u64,
    pub bad_sources: u64,
}

impl std::ops::AddAssign for WalkStats {
    fn add_assign(&mut self, other: Self) {
        self.files_scheduled += other.files_scheduled;
        self.directories += other.directories;
        self.mkdir_failures += other.mkdir_failures;
        self.bad_sources += other.bad_sources;
    }
}

enum EntryKind {
    File,
    Directory,
    Unsupported,
}

/// Walks local trees and feeds the task queue
pub struct DirectoryWalker {
    protocol: SyncProtocol,
    queue: Arc<TaskQueue>,
}

impl DirectoryWalker {
    pub fn new(protocol: SyncProtocol, queue: Arc<TaskQueue>) -> Self {
        Self { protocol, queue }
    }

    /// Schedules the content of `source` below `parent`
    pub async fn walk(&self, source: &Path, parent: &TargetParent, recursive: bool) -> WalkStats {
        info!(source = %source.display(), parent = %parent, recursive, "Walking directory");
        let mut stats = WalkStats::default();
        self.walk_dir(source.to_path_buf(), parent.clone(), recursive, &mut stats)
            .await;
        stats
    }

    fn walk_dir<'a>(
        &'a self,
        dir: PathBuf,
        parent: TargetParent,
        recursive: bool,
        stats: &'a mut WalkStats,
    ) -> Pin<Box<dyn Future<Output = ()> + Send + 'a>> {
        Box::pin(async move {
            let entries = match read_sorted(&dir).await {
                Ok(entries) => entries,
                Err(e) => {
                    debug!(path = %dir.display(), error = %e, "Source directory is not readable");
                    self.protocol.bad_source(&dir, &parent).await;
                    stats.bad_sources += 1;
                    return;
                }
            };

            for (name, path, kind) in entries {
                match kind {
                    EntryKind::File => {
                        self.queue.enqueue(UploadTask::new(path, parent.clone(), name));
                        stats.files_scheduled += 1;
                    }
                    EntryKind::Directory => {
                        stats.directories += 1;
                        let outcome = self.protocol.mkdir(&parent, &name).await;
                        let child = match outcome.value {
                            Some(id) => TargetParent::Folder(id),
                            None => {
                                warn!(
                                    path = %path.display(),
                                    status = %outcome.status,
                                    "Could not create remote folder"
                                );
                                stats.mkdir_failures += 1;
                                TargetParent::Broken
                            }
                        };
                        if recursive {
                            self.walk_dir(path, child, recursive, &mut *stats).await;
                        }
                    }
                    EntryKind::Unsupported => {
                        debug!(path = %path.display(), "Unsupported entry type, not synchronized");
                        self.protocol.bad_source(&path, &parent).await;
                        stats.bad_sources += 1;
                    }
                }
            }
        })
    }
}

/// Lists `dir` sorted by file name, classifying entries without following links
async fn read_sorted(dir: &Path) -> std::io::Result<Vec<(String, PathBuf, EntryKind)>> {
    let mut reader = tokio::fs::read_dir(dir).await?;
    let mut entries = Vec::new();
    while let Some(entry) = reader.next_entry().await? {
        let file_type = entry.file_type().await?;
        let kind = if file_type.is_file() {
            EntryKind::File
        } else if file_type.is_dir() {
            EntryKind::Directory
        } else {
            EntryKind::Unsupported
        };
        let name = entry.file_name().to_string_lossy().into_owned();
        entries.push((name, entry.path(), kind));
    }
    entries.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(entries)
}
