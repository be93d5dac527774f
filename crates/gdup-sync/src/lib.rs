//! gdup Sync - one-way directory synchronization engine
//!
//! Provides:
//! - Idempotent remote operations (`stat`, `mkdir`, `mkpath`, `upload`)
//! - A recursive directory walker feeding a task queue
//! - A bounded pool of upload workers draining that queue
//!
//! ## Modules
//!
//! - [`protocol`] - Audited remote operations on top of `IRemoteStore`
//! - [`queue`] - FIFO handoff between the walker and the workers
//! - [`walker`] - Local tree traversal and scheduling
//! - [`pool`] - Upload worker pool
//! - [`engine`] - Runs every configured directory mapping to completion
//! - [`hashing`] - Streaming MD5 of local files

pub mod engine;
pub mod hashing;
pub mod mime;
pub mod pool;
pub mod protocol;
pub mod queue;
pub mod walker;

use std::path::PathBuf;

use thiserror::Error;

pub use engine::{RunSummary, SyncEngine};
pub use pool::WorkerPool;
pub use protocol::SyncProtocol;
pub use queue::TaskQueue;
pub use walker::{DirectoryWalker, WalkStats};

/// Errors raised while reading local files
#[derive(Debug, Error)]
pub enum SyncError {
    /// An I/O error occurred during file operations
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl SyncError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        SyncError::Io {
            path: path.into(),
            source,
        }
    }
}
