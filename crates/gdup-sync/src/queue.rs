//! Task queue between the directory walker and the upload workers
//!
//! A plain FIFO with two counters: tasks enqueued and tasks marked done.
//! The queue is drained when both are equal. Workers park on
//! [`TaskQueue::dequeue`] until a task arrives or the queue is closed.

use std::collections::VecDeque;
use std::sync::Mutex;

use gdup_core::domain::task::UploadTask;
use tokio::sync::Notify;

#[derive(Debug, Default)]
struct QueueState {
    tasks: VecDeque<UploadTask>,
    enqueued: u64,
    completed: u64,
    closed: bool,
}

/// Thread-safe FIFO of upload tasks
#[derive(Debug, Default)]
pub struct TaskQueue {
    state: Mutex<QueueState>,
    available: Notify,
    drained: Notify,
}

impl TaskQueue {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Appends a task. Never blocks.
    ///
    /// Tasks enqueued after [`TaskQueue::close`] are dropped with a warning.
    pub fn enqueue(&self, task: UploadTask) {
        {
            let mut state = self.lock();
            if state.closed {
                tracing::warn!(source = %task.source_path().display(), "Queue closed, dropping task");
                return;
            }
            state.tasks.push_back(task);
            state.enqueued += 1;
        }
        self.available.notify_one();
    }

    /// Takes the oldest task, waiting until one is available
    ///
    /// Returns `None` once the queue is closed and empty.
    pub async fn dequeue(&self) -> Option<UploadTask> {
        loop {
            let notified = self.available.notified();
            {
                let mut state = self.lock();
                if let Some(task) = state.tasks.pop_front() {
                    let more = !state.tasks.is_empty();
                    drop(state);
                    // Pass the wakeup on if others are still waiting for work
                    if more {
                        self.available.notify_one();
                    }
                    return Some(task);
                }
                if state.closed {
                    return None;
                }
            }
            notified.await;
        }
    }

    /// Records that one dequeued task has been fully processed
    pub fn mark_done(&self) {
        let drained = {
            let mut state = self.lock();
            state.completed += 1;
            state.completed >= state.enqueued
        };
        if drained {
            self.drained.notify_waiters();
        }
    }

    /// Waits until every enqueued task has been marked done
    pub async fn await_drained(&self) {
        loop {
            let notified = self.drained.notified();
            tokio::pin!(notified);
            // Register before checking so a concurrent mark_done is not missed
            notified.as_mut().enable();
            if self.is_drained() {
                return;
            }
            notified.await;
        }
    }

    /// Stops accepting tasks and wakes every idle worker
    pub fn close(&self) {
        self.lock().closed = true;
        self.available.notify_waiters();
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    pub fn is_drained(&self) -> bool {
        let state = self.lock();
        state.completed >= state.enqueued
    }

    /// Tasks waiting to be dequeued
    pub fn pending(&self) -> usize {
        self.lock().tasks.len()
    }

    /// Total tasks accepted so far
    pub fn enqueued(&self) -> u64 {
        self.lock().enqueued
    }

    /// Total tasks marked done so far
    pub fn completed(&self) -> u64 {
        self.lock().completed
    }
}
