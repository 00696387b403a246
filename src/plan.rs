//! # Schedule plans and execution records.
//!
//! A [`TaskSchedulePlan`] ties a [`Task`] to its parsed schedule and the
//! next absolute instant it is due. Plans live in the plan table and are
//! advanced only by the ticker, which runs on the loop task; no lock guards
//! `next_time` for that reason.
//!
//! [`TaskExecutingInfo`] is the in-flight handle for one firing: it owns
//! the cancellation token that a `Kill` event trips, and the task body is
//! expected to watch it. [`TaskExecuteResult`] is the terminal record of an
//! attempt, whether it ran, failed, or was declined because the previous
//! firing was still running.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use cron::Schedule;
use tokio_util::sync::CancellationToken;

use crate::error::SchedulerError;
use crate::task::Task;

/// In-memory record tying a task to its next firing instant.
#[derive(Clone)]
pub struct TaskSchedulePlan {
    /// Value copy of the task; plans own their data.
    pub task: Task,
    /// Parsed cron schedule.
    pub schedule: Schedule,
    /// Next absolute instant this plan is due. Mutated only by the ticker.
    pub next_time: DateTime<Utc>,
}

impl TaskSchedulePlan {
    /// Builds a plan from a task definition.
    ///
    /// Fails when the cron expression is malformed or has no upcoming fire
    /// time. The caller logs and drops the event; a bad expression is never
    /// fatal to the loop.
    pub fn from_task(task: Task) -> Result<Self, SchedulerError> {
        let schedule =
            Schedule::from_str(&task.cron_expr).map_err(|e| SchedulerError::InvalidCron {
                expr: task.cron_expr.clone(),
                message: e.to_string(),
            })?;
        let next_time =
            schedule
                .after(&Utc::now())
                .next()
                .ok_or_else(|| SchedulerError::ScheduleExhausted {
                    expr: task.cron_expr.clone(),
                })?;
        Ok(Self {
            task,
            schedule,
            next_time,
        })
    }

    /// Next fire instant strictly after `now`, or `None` when the schedule
    /// is exhausted.
    pub fn next_after(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.schedule.after(&now).next()
    }
}

impl fmt::Debug for TaskSchedulePlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskSchedulePlan")
            .field("task", &self.task.scheduler_key())
            .field("cron_expr", &self.task.cron_expr)
            .field("next_time", &self.next_time)
            .finish()
    }
}

/// In-flight handle for one execution.
#[derive(Debug, Clone)]
pub struct TaskExecutingInfo {
    /// The plan this firing came from (value copy).
    pub plan: TaskSchedulePlan,
    /// Cancellation hook. Safe to cancel at any time; double cancel is a
    /// no-op. Clones share the same underlying token.
    pub cancel: CancellationToken,
    /// When the firing was created.
    pub start_time: DateTime<Utc>,
}

impl TaskExecutingInfo {
    /// Creates the in-flight handle for a firing of `plan`.
    pub fn from_plan(plan: TaskSchedulePlan) -> Self {
        Self {
            plan,
            cancel: CancellationToken::new(),
            start_time: Utc::now(),
        }
    }

    /// The task being executed.
    pub fn task(&self) -> &Task {
        &self.plan.task
    }
}

/// Terminal record of one execution attempt.
#[derive(Debug, Clone)]
pub struct TaskExecuteResult {
    /// The firing this result belongs to.
    pub execute_info: TaskExecutingInfo,
    /// Whatever the body produced on stdout or equivalent.
    pub output: String,
    /// `None` iff the attempt succeeded.
    pub err: Option<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

impl TaskExecuteResult {
    /// Synthesizes the declined-firing result used when the previous
    /// execution of the same task has not completed yet.
    pub fn still_running(plan: TaskSchedulePlan) -> Self {
        let now = Utc::now();
        let err = format!(
            "task {} execute error: last task was not completed",
            plan.task.name
        );
        Self {
            execute_info: TaskExecutingInfo::from_plan(plan),
            output: "last task was not completed".to_string(),
            err: Some(err),
            start_time: now,
            end_time: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::TASK_STATUS_ACTIVE;

    fn task(expr: &str) -> Task {
        Task {
            project_id: 1,
            task_id: "t1".into(),
            name: "t1".into(),
            command: String::new(),
            cron_expr: expr.into(),
            timeout: 0,
            status: TASK_STATUS_ACTIVE,
            noseize: 1,
            client_ip: String::new(),
        }
    }

    #[test]
    fn from_task_rejects_malformed_expression() {
        let err = TaskSchedulePlan::from_task(task("not a cron")).unwrap_err();
        assert!(matches!(err, SchedulerError::InvalidCron { .. }));
    }

    #[test]
    fn from_task_rejects_exhausted_schedule() {
        // Year-bound expression entirely in the past.
        let err = TaskSchedulePlan::from_task(task("0 0 0 1 1 * 2015")).unwrap_err();
        assert!(matches!(err, SchedulerError::ScheduleExhausted { .. }));
    }

    #[test]
    fn from_task_sets_next_time_in_the_future() {
        let plan = TaskSchedulePlan::from_task(task("* * * * * *")).unwrap();
        assert!(plan.next_time > Utc::now() - chrono::Duration::seconds(1));
    }

    #[test]
    fn next_after_is_strictly_greater() {
        let plan = TaskSchedulePlan::from_task(task("* * * * * *")).unwrap();
        let now = Utc::now();
        let mut t = now;
        for _ in 0..5 {
            let next = plan.next_after(t).unwrap();
            assert!(next > t);
            t = next;
        }
    }

    #[test]
    fn still_running_result_carries_literal_error() {
        let plan = TaskSchedulePlan::from_task(task("* * * * * *")).unwrap();
        let res = TaskExecuteResult::still_running(plan);
        assert_eq!(res.output, "last task was not completed");
        assert_eq!(
            res.err.as_deref(),
            Some("task t1 execute error: last task was not completed")
        );
        assert_eq!(res.start_time, res.end_time);
    }

    #[test]
    fn kill_hook_is_idempotent() {
        let plan = TaskSchedulePlan::from_task(task("* * * * * *")).unwrap();
        let info = TaskExecutingInfo::from_plan(plan);
        info.cancel.cancel();
        info.cancel.cancel();
        assert!(info.cancel.is_cancelled());
    }
}
