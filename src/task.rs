//! # Task model and inbound mutation events.
//!
//! A [`Task`] is the schedulable unit as the control plane ships it to the
//! agent: identity, cron expression, and the two integer flags the core
//! keys its decisions off (`status`, `noseize`). [`TaskEvent`] wraps a task
//! together with the mutation kind applied to the local schedule.
//!
//! Tasks are plain values; the scheduler copies them into plans and never
//! shares mutable task state across components.

use serde::{Deserialize, Serialize};

/// `status` value marking a task as active/schedulable.
pub const TASK_STATUS_ACTIVE: i32 = 1;

/// A schedulable unit, identified by `(project_id, task_id)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    /// Owning project.
    pub project_id: u64,
    /// Identifier within the project.
    pub task_id: String,
    /// Human-readable name, used in results and alerts.
    pub name: String,
    /// Body command line, consumed by the task runner.
    #[serde(default)]
    pub command: String,
    /// Cron expression (seconds-resolution, 6/7 fields).
    pub cron_expr: String,
    /// Advisory body timeout in seconds; the runner enforces it, not the core.
    #[serde(default)]
    pub timeout: i32,
    /// `1` means schedulable; anything else means do not schedule.
    pub status: i32,
    /// `0` means the distributed lock must be won before executing.
    #[serde(default)]
    pub noseize: i32,
    /// Address of the agent executing the task; stamped by the core.
    #[serde(default)]
    pub client_ip: String,
}

impl Task {
    /// Stable identity used as the key of the plan and executing tables.
    pub fn scheduler_key(&self) -> String {
        format!("{}/{}", self.project_id, self.task_id)
    }

    /// Whether a `Save` for this task installs a plan.
    pub fn is_schedulable(&self) -> bool {
        self.status == TASK_STATUS_ACTIVE
    }

    /// Whether a firing must win the distributed lock first.
    pub fn requires_lock(&self) -> bool {
        self.noseize == 0
    }
}

/// Kind of mutation carried by a [`TaskEvent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskEventKind {
    /// Run the task once, now, bypassing the plan table.
    Temporary,
    /// Install or refresh the task's plan (status permitting).
    Save,
    /// Drop the task's plan; in-flight execution keeps running.
    Delete,
    /// Cancel the task's in-flight execution, if any.
    Kill,
}

/// An inbound mutation applied to the agent's in-memory schedule.
#[derive(Debug, Clone)]
pub struct TaskEvent {
    pub kind: TaskEventKind,
    pub task: Task,
}

impl TaskEvent {
    pub fn new(kind: TaskEventKind, task: Task) -> Self {
        Self { kind, task }
    }

    /// One-shot "run now" event.
    pub fn temporary(task: Task) -> Self {
        Self::new(TaskEventKind::Temporary, task)
    }

    pub fn save(task: Task) -> Self {
        Self::new(TaskEventKind::Save, task)
    }

    pub fn delete(task: Task) -> Self {
        Self::new(TaskEventKind::Delete, task)
    }

    pub fn kill(task: Task) -> Self {
        Self::new(TaskEventKind::Kill, task)
    }
}
