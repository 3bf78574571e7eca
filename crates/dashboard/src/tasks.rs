//! Registry of cancellable background tasks.
//!
//! Every timer the coordinator starts is registered here under its purpose,
//! so starting a task for a purpose replaces the previous one and shutdown
//! leaves nothing running.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::task::JoinHandle;
use tracing::debug;

/// What a background task is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskPurpose {
    /// Periodic refresh while the backend is rate limiting us.
    RateLimitPoll,
    /// Periodic cache warm-up started by a long-running front end.
    AutoReload,
}

impl std::fmt::Display for TaskPurpose {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::RateLimitPoll => write!(f, "rate_limit_poll"),
            Self::AutoReload => write!(f, "auto_reload"),
        }
    }
}

/// Background tasks keyed by purpose. Aborts everything it holds on drop.
#[derive(Debug, Default)]
pub struct TaskRegistry {
    tasks: Mutex<HashMap<TaskPurpose, JoinHandle<()>>>,
}

impl TaskRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn tasks(&self) -> MutexGuard<'_, HashMap<TaskPurpose, JoinHandle<()>>> {
        self.tasks.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Spawn `task` for `purpose`, aborting any task already registered for it.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn spawn<F>(&self, purpose: TaskPurpose, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let handle = tokio::spawn(task);
        if let Some(previous) = self.tasks().insert(purpose, handle) {
            previous.abort();
        }
        debug!(%purpose, "task started");
    }

    /// Whether a task for `purpose` is registered and still running.
    #[must_use]
    pub fn is_active(&self, purpose: TaskPurpose) -> bool {
        self.tasks()
            .get(&purpose)
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Abort the task for `purpose`. Returns whether one was running.
    pub fn cancel(&self, purpose: TaskPurpose) -> bool {
        let Some(handle) = self.tasks().remove(&purpose) else {
            return false;
        };
        let running = !handle.is_finished();
        handle.abort();
        if running {
            debug!(%purpose, "task cancelled");
        }
        running
    }

    /// Abort every registered task.
    pub fn cancel_all(&self) {
        for (purpose, handle) in self.tasks().drain() {
            if !handle.is_finished() {
                debug!(%purpose, "task cancelled");
            }
            handle.abort();
        }
    }

    /// Purposes with a running task.
    #[must_use]
    pub fn active(&self) -> Vec<TaskPurpose> {
        self.tasks()
            .iter()
            .filter(|(_, handle)| !handle.is_finished())
            .map(|(purpose, _)| *purpose)
            .collect()
    }
}

impl Drop for TaskRegistry {
    fn drop(&mut self) {
        self.cancel_all();
    }
}
