//! # TaskTracker: registry of in-flight publish tasks.
//!
//! Every `report_*` call on the bus spawns one publish task; its
//! [`JoinHandle`] lands here. The tracker answers two questions:
//! - [`TaskTracker::is_active`] — is anything still running right now?
//! - [`TaskTracker::wait`] — suspend until everything tracked so far is done.
//!
//! ## Rules
//! - `wait()` **snapshots** the registry at entry: tasks tracked concurrently
//!   after `wait()` begins are not guaranteed to be waited on. This race is
//!   acceptable because [`FeedbackBus::stop`](crate::FeedbackBus::stop)
//!   sequences `wait()` strictly before cancelling the scope.
//! - `track()` is safe from any number of producer contexts; the lock is
//!   never held across an await.
//! - Join outcomes are ignored: a panicking publish task does not poison the
//!   tracker or fail `wait()`.

use std::sync::Mutex;

use futures::future::join_all;
use tokio::task::JoinHandle;

/// Concurrency-safe registry of outstanding publish tasks.
pub struct TaskTracker {
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl TaskTracker {
    /// Creates a new, empty tracker.
    pub fn new() -> Self {
        Self {
            tasks: Mutex::new(Vec::new()),
        }
    }

    /// Registers an in-flight task.
    ///
    /// Handles of tasks that have since finished are pruned on every call, so
    /// a producer that only ever reports (never calling `wait()` or
    /// `is_active()`) does not accumulate dead handles.
    pub fn track(&self, handle: JoinHandle<()>) {
        let mut tasks = self.tasks.lock().expect("task tracker poisoned");
        tasks.retain(|h| !h.is_finished());
        tasks.push(handle);
    }

    /// True iff at least one tracked task has not finished at the moment of
    /// the call (point-in-time, not transactional — producers may track new
    /// tasks concurrently).
    ///
    /// Finished handles are pruned as a side effect.
    pub fn is_active(&self) -> bool {
        let mut tasks = self.tasks.lock().expect("task tracker poisoned");
        tasks.retain(|h| !h.is_finished());
        !tasks.is_empty()
    }

    /// Waits until every task tracked **as of call entry** has finished.
    ///
    /// Returns immediately when nothing is tracked.
    pub async fn wait(&self) {
        let snapshot: Vec<JoinHandle<()>> = {
            let mut tasks = self.tasks.lock().expect("task tracker poisoned");
            tasks.drain(..).collect()
        };
        // Panicked or cancelled publishes count as finished.
        let _ = join_all(snapshot).await;
    }
}

impl Default for TaskTracker {
    fn default() -> Self {
        Self::new()
    }
}
