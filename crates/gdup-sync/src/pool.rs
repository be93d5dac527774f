//! Upload worker pool
//!
//! `N` workers share one [`TaskQueue`] and one [`SyncProtocol`]. Each
//! worker takes one task at a time and runs the upload in its own tokio
//! task, so a panic inside an upload is caught at the join point and logged
//! instead of taking the worker down. Every dequeued task is marked done
//! exactly once, whatever happened to it. Nothing is retried.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::protocol::SyncProtocol;
use crate::queue::TaskQueue;

/// A running set of upload workers
pub struct WorkerPool {
    queue: Arc<TaskQueue>,
    workers: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Spawns `workers` upload workers on the current runtime
    pub fn start(workers: usize, queue: Arc<TaskQueue>, protocol: SyncProtocol) -> Self {
        info!(workers, "Starting upload workers");
        let handles = (0..workers)
            .map(|worker_id| {
                let queue = Arc::clone(&queue);
                let protocol = protocol.clone();
                tokio::spawn(worker_loop(worker_id, queue, protocol))
            })
            .collect();
        Self {
            queue,
            workers: handles,
        }
    }

    pub fn size(&self) -> usize {
        self.workers.len()
    }

    /// Closes the queue and waits for every worker to exit
    ///
    /// Tasks still queued are processed before the workers stop.
    pub async fn shutdown(self) {
        self.queue.close();
        for handle in self.workers {
            if let Err(e) = handle.await {
                error!(error = %e, "Upload worker terminated abnormally");
            }
        }
        debug!("Upload workers stopped");
    }
}

async fn worker_loop(worker_id: usize, queue: Arc<TaskQueue>, protocol: SyncProtocol) {
    debug!(worker_id, "Upload worker started");
    while let Some(task) = queue.dequeue().await {
        debug!(
            worker_id,
            source = %task.source_path().display(),
            parent = %task.parent(),
            title = task.title(),
            "Processing upload task"
        );

        let protocol = protocol.clone();
        let upload = tokio::spawn(async move {
            let outcome = protocol
                .upload(task.source_path(), task.parent(), task.title())
                .await;
            (task, outcome.status)
        });

        match upload.await {
            Ok((task, status)) => {
                debug!(worker_id, title = task.title(), status = %status, "Upload task finished");
            }
            Err(e) if e.is_panic() => {
                error!(worker_id, error = %e, "Upload task panicked");
            }
            Err(e) => {
                error!(worker_id, error = %e, "Upload task was cancelled");
            }
        }
        queue.mark_done();
    }
    debug!(worker_id, "Upload worker exiting");
}
