//! Result forwarding and alerting sinks.
//!
//! Every consumed result is forwarded through [`ResultReporter`]; results
//! carrying an error additionally raise a [`WarningData`] on the
//! [`AlertSink`] first. Reporter failures are logged and dropped; the loop
//! never stops over a sink.

use async_trait::async_trait;
use serde::Serialize;

use crate::plan::TaskExecuteResult;

/// Category of an alert, serialized as the payload's wire tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WarningKind {
    /// Raised because a task execution produced an error.
    Task,
}

/// Alert payload for a failed execution.
#[derive(Debug, Clone, Serialize)]
pub struct WarningData {
    /// The error text.
    pub data: String,
    pub kind: WarningKind,
    pub task_name: String,
    pub project_id: u64,
    /// Address of the agent that ran (or declined) the task.
    pub agent_ip: String,
}

/// Forwards completed results to the control plane.
#[async_trait]
pub trait ResultReporter: Send + Sync {
    async fn report(&self, result: &TaskExecuteResult) -> anyhow::Result<()>;
}

/// Receives alerts for failed executions.
#[async_trait]
pub trait AlertSink: Send + Sync {
    async fn warning(&self, data: WarningData);
}
