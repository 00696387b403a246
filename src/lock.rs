//! Distributed mutual exclusion for task firings.
//!
//! One lock per task, shared across the cluster. A firing of a task with
//! `noseize == 0` must win its lock before registering as executing; losing
//! the race means another agent runs this tick.

use async_trait::async_trait;

use crate::task::Task;

/// Produces lock handles scoped to a single task.
pub trait LockFactory: Send + Sync {
    /// Returns a handle for the task's cluster-wide lock. The handle holds
    /// nothing until [`TaskLock::try_lock`] succeeds.
    fn lock(&self, task: &Task) -> Box<dyn TaskLock>;
}

/// A handle to one task's distributed lock.
#[async_trait]
pub trait TaskLock: Send {
    /// Attempts to acquire without blocking on contention. Fails fast both
    /// when the lock is held elsewhere and on backend errors.
    async fn try_lock(&mut self) -> anyhow::Result<()>;

    /// Releases the lock. Idempotent, and always safe to call after a
    /// successful [`try_lock`](Self::try_lock).
    async fn unlock(&mut self);
}
