//! Durable task-status transitions.
//!
//! The core never persists anything itself; it flips a task's cluster-wide
//! "running" flag through this seam so peer agents and operators can see
//! what is executing where. Both transitions may fail transiently; the
//! worker retries them.

use async_trait::async_trait;

use crate::task::Task;

/// Durable store for task run status.
#[async_trait]
pub trait TaskStore: Send + Sync {
    /// Marks the task as running before its body starts.
    async fn set_task_running(&self, task: Task) -> anyhow::Result<()>;

    /// Clears the running mark after the body finishes or is cancelled.
    async fn set_task_not_running(&self, task: Task) -> anyhow::Result<()>;
}
