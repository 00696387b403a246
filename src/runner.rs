//! Task body execution.
//!
//! The core does not know how to run a task; it hands the in-flight handle
//! to this seam and waits for the terminal record. Implementations must
//! watch `info.cancel` and return promptly once it trips, because
//! cancellation is how `Kill` events reach the body.

use async_trait::async_trait;

use crate::plan::{TaskExecuteResult, TaskExecutingInfo};

/// Executes task bodies.
#[async_trait]
pub trait TaskRunner: Send + Sync {
    /// Runs the task to completion or cancellation and reports what
    /// happened. A body failure belongs in the result's `err`, not in a
    /// panic; the worker forwards the result either way.
    async fn execute(&self, info: TaskExecutingInfo) -> TaskExecuteResult;
}
