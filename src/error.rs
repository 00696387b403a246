//! # Error types used by the scheduler core.
//!
//! A single [`SchedulerError`] enum covers the failures the core itself can
//! produce. Collaborator failures (store, lock backend, reporter) travel
//! through the trait seams as `anyhow::Error` and are never fatal to the
//! agent loop.
//!
//! `as_label` returns a short stable label for logs/metrics.

use thiserror::Error;

/// Errors produced by the scheduler core.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum SchedulerError {
    /// The task's cron expression could not be parsed.
    #[error("invalid cron expression {expr:?}: {message}")]
    InvalidCron {
        /// The offending expression.
        expr: String,
        /// Parser diagnostic.
        message: String,
    },

    /// The cron expression parses but has no upcoming fire time
    /// (e.g. a year-bound expression entirely in the past).
    #[error("cron expression {expr:?} has no upcoming fire time")]
    ScheduleExhausted {
        /// The exhausted expression.
        expr: String,
    },

    /// The agent loop was started while already running.
    #[error("agent loop is already running")]
    AlreadyRunning,

    /// Non-blocking push found the intake queue at capacity.
    #[error("intake queue is full")]
    QueueFull,

    /// The intake queue's consumer is gone.
    #[error("intake queue is closed")]
    QueueClosed,
}

impl SchedulerError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            SchedulerError::InvalidCron { .. } => "invalid_cron",
            SchedulerError::ScheduleExhausted { .. } => "schedule_exhausted",
            SchedulerError::AlreadyRunning => "already_running",
            SchedulerError::QueueFull => "queue_full",
            SchedulerError::QueueClosed => "queue_closed",
        }
    }
}
