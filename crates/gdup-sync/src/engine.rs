//! Sync engine
//!
//! The [`SyncEngine`] runs every configured directory mapping once:
//!
//! 1. start the upload workers
//! 2. for each mapping, `mkpath` the target below the target root and walk
//!    the source into it (mappings whose target cannot be created are
//!    skipped with a warning)
//! 3. wait until the queue drains, then shut the workers down
//!
//! Individual failures never fail the run; they are in the audit log and
//! in the returned [`RunSummary`].

use std::sync::Arc;
use std::time::Instant;

use gdup_audit::AuditTally;
use gdup_core::{
    config::{Config, DirectoryMapping},
    domain::newtypes::{RemoteId, TargetParent},
};
use serde::Serialize;
use tracing::{info, warn};

use crate::pool::WorkerPool;
use crate::protocol::SyncProtocol;
use crate::queue::TaskQueue;
use crate::walker::{DirectoryWalker, WalkStats};

// ============================================================================
// RunSummary
// ============================================================================

/// Result of one complete run
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    /// Mappings that were walked
    pub mappings_walked: usize,
    /// Mappings skipped because their target path could not be created
    pub mappings_skipped: usize,
    pub files_scheduled: u64,
    pub directories: u64,
    pub mkdir_failures: u64,
    pub bad_sources: u64,
    /// Upload tasks the workers finished
    pub tasks_completed: u64,
    /// Records written during the run, by status and operation
    pub records: AuditTally,
    /// Wall-clock duration of the run in milliseconds
    pub duration_ms: u64,
}

// ============================================================================
// SyncEngine
// ============================================================================

/// Runs directory mappings to completion
pub struct SyncEngine {
    protocol: SyncProtocol,
    workers: usize,
}

impl SyncEngine {
    /// Creates an engine with exactly `workers` upload workers (at least one)
    pub fn new(protocol: SyncProtocol, workers: usize) -> Self {
        Self {
            protocol,
            workers: workers.max(1),
        }
    }

    /// Creates an engine sized from `config.workers`
    ///
    /// Values outside `1..=20` fall back to a single worker.
    pub fn from_config(protocol: SyncProtocol, config: &Config) -> Self {
        if !config.workers_in_range() {
            warn!(
                configured = config.workers,
                "Worker count out of range 1..=20, falling back to 1"
            );
        }
        Self::new(protocol, config.effective_workers())
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Synchronizes every mapping below `target_root`
    pub async fn run(&self, target_root: &RemoteId, mappings: &[DirectoryMapping]) -> RunSummary {
        let started = Instant::now();
        let queue = Arc::new(TaskQueue::new());
        let pool = WorkerPool::start(self.workers, Arc::clone(&queue), self.protocol.clone());
        let walker = DirectoryWalker::new(self.protocol.clone(), Arc::clone(&queue));

        let mut walked = 0;
        let mut skipped = 0;
        let mut stats = WalkStats::default();

        for mapping in mappings {
            let target = self.protocol.mkpath(target_root, &mapping.target).await;
            let Some(target_id) = target.value else {
                warn!(
                    source = %mapping.source.display(),
                    target = %mapping.target,
                    status = %target.status,
                    "Could not create target path, skipping directory"
                );
                skipped += 1;
                continue;
            };

            stats += walker
                .walk(&mapping.source, &TargetParent::Folder(target_id), mapping.recursive)
                .await;
            walked += 1;
        }

        info!(scheduled = queue.enqueued(), "Walk complete, waiting for uploads");
        queue.await_drained().await;
        let tasks_completed = queue.completed();
        pool.shutdown().await;

        let summary = RunSummary {
            mappings_walked: walked,
            mappings_skipped: skipped,
            files_scheduled: stats.files_scheduled,
            directories: stats.directories,
            mkdir_failures: stats.mkdir_failures,
            bad_sources: stats.bad_sources,
            tasks_completed,
            records: self.protocol.recorder().tally(),
            duration_ms: u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
        };
        info!(
            files = summary.files_scheduled,
            completed = summary.tasks_completed,
            records = summary.records.total(),
            failures = summary.records.failures(),
            duration_ms = summary.duration_ms,
            "Run complete"
        );
        summary
    }
}
