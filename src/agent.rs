//! # The agent loop: event application, ticking, result handling.
//!
//! One spawned task owns all timing and all structural writes to the plan
//! table. It multiplexes three sources (inbound task events, execution
//! results, and a one-shot timer) and re-computes the sleep interval from
//! the plan table after every wakeup.
//!
//! ```text
//!  push_event ──► EventIntake ──┐
//!                               ├──► select! ──► apply_event / finish_result
//!  workers ────► ResultIntake ──┤        │
//!                               │        └──► try_schedule() ──► re-arm timer
//!  timer ───────────────────────┘                  │
//!                                                  └──► try_start_task(due plans)
//! ```
//!
//! Because event application and worker preludes all run here, two firings
//! of the same plan are totally ordered: the earlier one registers in the
//! executing table before the later one's conflict check runs, or the later
//! one synthesizes the declined-firing result. Workers deregister from
//! their own tasks; the executing table is concurrent-safe for that.

use std::sync::{Arc, Weak};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;
use tokio::time;
use tokio_util::sync::CancellationToken;
use tracing::{error, warn};

use crate::config::Config;
use crate::error::SchedulerError;
use crate::lock::LockFactory;
use crate::plan::{TaskExecuteResult, TaskSchedulePlan};
use crate::report::{AlertSink, ResultReporter, WarningData, WarningKind};
use crate::runner::TaskRunner;
use crate::scheduler::TaskScheduler;
use crate::store::TaskStore;
use crate::task::{TaskEvent, TaskEventKind};

/// External collaborators handed to the agent at construction.
pub struct Hooks {
    pub store: Arc<dyn TaskStore>,
    pub locks: Arc<dyn LockFactory>,
    pub runner: Arc<dyn TaskRunner>,
    pub reporter: Arc<dyn ResultReporter>,
    pub alerts: Arc<dyn AlertSink>,
}

/// A cron execution agent's scheduler core.
pub struct Agent {
    pub(crate) cfg: Config,
    pub(crate) scheduler: Arc<TaskScheduler>,
    pub(crate) store: Arc<dyn TaskStore>,
    pub(crate) locks: Arc<dyn LockFactory>,
    pub(crate) runner: Arc<dyn TaskRunner>,
    pub(crate) reporter: Arc<dyn ResultReporter>,
    pub(crate) alerts: Arc<dyn AlertSink>,
    /// Back-reference handed to spawned workers.
    pub(crate) me: Weak<Agent>,
}

impl Agent {
    pub fn new(cfg: Config, hooks: Hooks) -> Arc<Self> {
        Arc::new_cyclic(|me| Self {
            scheduler: Arc::new(TaskScheduler::new(&cfg)),
            store: hooks.store,
            locks: hooks.locks,
            runner: hooks.runner,
            reporter: hooks.reporter,
            alerts: hooks.alerts,
            me: me.clone(),
            cfg,
        })
    }

    /// Shared handle to the queues and tables, for event producers and
    /// external introspection.
    pub fn scheduler(&self) -> Arc<TaskScheduler> {
        Arc::clone(&self.scheduler)
    }

    /// Returns a copy of the plan stored under `key`.
    pub fn plan(&self, key: &str) -> Option<TaskSchedulePlan> {
        self.scheduler.plan(key)
    }

    /// Removes the plan stored under `key`; in-flight execution continues.
    pub fn remove_plan(&self, key: &str) {
        self.scheduler.remove_plan(key);
    }

    /// Visits each plan until `f` returns `false`.
    pub fn plan_range(&self, f: impl FnMut(&str, &TaskSchedulePlan) -> bool) {
        self.scheduler.plan_range(f);
    }

    /// Number of installed plans. O(n).
    pub fn plan_count(&self) -> usize {
        self.scheduler.plan_count()
    }

    /// Spawns the agent loop. It runs until `token` is cancelled; starting
    /// a second loop on the same agent fails with
    /// [`SchedulerError::AlreadyRunning`].
    pub fn start(self: Arc<Self>, token: CancellationToken) -> JoinHandle<Result<(), SchedulerError>> {
        tokio::spawn(async move { self.run_inner(token).await })
    }

    async fn run_inner(&self, token: CancellationToken) -> Result<(), SchedulerError> {
        let mut intakes = self
            .scheduler
            .take_intakes()
            .await
            .ok_or(SchedulerError::AlreadyRunning)?;

        let mut sleep_for = self.try_schedule().await;
        loop {
            let timer = time::sleep(sleep_for);
            tokio::pin!(timer);

            tokio::select! {
                _ = token.cancelled() => break,
                Some(event) = intakes.events.recv() => self.apply_event(event).await,
                Some(result) = intakes.results.recv() => self.finish_result(result).await,
                // Due plans fire inside the re-tick below.
                _ = &mut timer => {}
            }

            sleep_for = self.try_schedule().await;
        }
        Ok(())
    }

    /// Applies one inbound event to the tables. Never fatal.
    async fn apply_event(&self, event: TaskEvent) {
        match event.kind {
            TaskEventKind::Temporary => match TaskSchedulePlan::from_task(event.task) {
                Ok(plan) => self.try_start_task(plan).await,
                Err(e) => error!(error = %e, "build task schedule plan failed"),
            },
            TaskEventKind::Save => {
                let plan = match TaskSchedulePlan::from_task(event.task) {
                    Ok(plan) => plan,
                    Err(e) => {
                        error!(error = %e, "build task schedule plan failed");
                        return;
                    }
                };
                let key = plan.task.scheduler_key();
                if plan.task.is_schedulable() {
                    self.scheduler.set_plan(key, plan);
                } else {
                    // Saved in a non-schedulable state: same as a delete.
                    self.scheduler.remove_plan(&key);
                }
            }
            TaskEventKind::Delete => {
                self.scheduler.remove_plan(&event.task.scheduler_key());
            }
            TaskEventKind::Kill => {
                if let Some(info) = self.scheduler.executing_info(&event.task.scheduler_key()) {
                    info.cancel.cancel();
                }
            }
        }
    }

    /// Fires every due plan and returns how long the loop may sleep before
    /// the next plan is due. One second when the plan table is empty.
    async fn try_schedule(&self) -> Duration {
        if self.scheduler.plan_count() == 0 {
            return self.cfg.idle_wake;
        }

        let now = Utc::now();
        let mut nearest: Option<DateTime<Utc>> = None;
        let mut due: Vec<TaskSchedulePlan> = Vec::new();
        let mut exhausted: Vec<String> = Vec::new();

        self.scheduler.plans().for_each_mut(|key, plan| {
            if plan.next_time <= now {
                // The previous firing of this plan may still be running;
                // the worker prelude sorts that out.
                match plan.next_after(now) {
                    Some(next) => {
                        plan.next_time = next;
                        due.push(plan.clone());
                    }
                    None => {
                        // Last fire instant of a bounded schedule.
                        due.push(plan.clone());
                        exhausted.push(key.to_string());
                        return;
                    }
                }
            }
            nearest = Some(match nearest {
                Some(t) if t <= plan.next_time => t,
                _ => plan.next_time,
            });
        });

        for key in &exhausted {
            warn!(key = %key, "schedule exhausted, dropping plan");
            self.scheduler.remove_plan(key);
        }
        for plan in due {
            self.try_start_task(plan).await;
        }

        match nearest {
            Some(t) => (t - now).to_std().unwrap_or(Duration::ZERO),
            None => self.cfg.idle_wake,
        }
    }

    /// Raises an alert for failed results, then forwards to the reporter.
    async fn finish_result(&self, result: TaskExecuteResult) {
        if let Some(err) = &result.err {
            let task = result.execute_info.task();
            self.alerts
                .warning(WarningData {
                    data: err.clone(),
                    kind: WarningKind::Task,
                    task_name: task.name.clone(),
                    project_id: task.project_id,
                    agent_ip: self.cfg.local_ip.clone(),
                })
                .await;
        }
        if let Err(e) = self.reporter.report(&result).await {
            error!(error = %e, "task result report failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lock::TaskLock;
    use crate::plan::TaskExecutingInfo;
    use crate::task::{Task, TASK_STATUS_ACTIVE};
    use async_trait::async_trait;

    struct NoopStore;

    #[async_trait]
    impl TaskStore for NoopStore {
        async fn set_task_running(&self, _task: Task) -> anyhow::Result<()> {
            Ok(())
        }
        async fn set_task_not_running(&self, _task: Task) -> anyhow::Result<()> {
            Ok(())
        }
    }

    struct FreeLocks;
    struct FreeLock;

    impl LockFactory for FreeLocks {
        fn lock(&self, _task: &Task) -> Box<dyn TaskLock> {
            Box::new(FreeLock)
        }
    }

    #[async_trait]
    impl TaskLock for FreeLock {
        async fn try_lock(&mut self) -> anyhow::Result<()> {
            Ok(())
        }
        async fn unlock(&mut self) {}
    }

    struct InstantRunner;

    #[async_trait]
    impl TaskRunner for InstantRunner {
        async fn execute(&self, info: TaskExecutingInfo) -> TaskExecuteResult {
            let now = Utc::now();
            TaskExecuteResult {
                start_time: info.start_time,
                end_time: now,
                execute_info: info,
                output: String::new(),
                err: None,
            }
        }
    }

    struct NullReporter;

    #[async_trait]
    impl ResultReporter for NullReporter {
        async fn report(&self, _result: &TaskExecuteResult) -> anyhow::Result<()> {
            Ok(())
        }
    }

    struct NullAlerts;

    #[async_trait]
    impl AlertSink for NullAlerts {
        async fn warning(&self, _data: WarningData) {}
    }

    fn agent() -> Arc<Agent> {
        Agent::new(
            Config::default(),
            Hooks {
                store: Arc::new(NoopStore),
                locks: Arc::new(FreeLocks),
                runner: Arc::new(InstantRunner),
                reporter: Arc::new(NullReporter),
                alerts: Arc::new(NullAlerts),
            },
        )
    }

    fn task(id: &str, status: i32) -> Task {
        Task {
            project_id: 1,
            task_id: id.into(),
            name: id.into(),
            command: String::new(),
            cron_expr: "* * * * * *".into(),
            timeout: 0,
            status,
            noseize: 1,
            client_ip: String::new(),
        }
    }

    #[tokio::test]
    async fn empty_plan_table_idles_for_one_second() {
        let a = agent();
        assert_eq!(a.try_schedule().await, Duration::from_secs(1));
    }

    #[tokio::test]
    async fn save_installs_a_plan_under_the_scheduler_key() {
        let a = agent();
        a.apply_event(TaskEvent::save(task("t1", TASK_STATUS_ACTIVE)))
            .await;
        assert_eq!(a.plan_count(), 1);
        assert!(a.plan("1/t1").is_some());
    }

    #[tokio::test]
    async fn later_save_overwrites_the_earlier_plan() {
        let a = agent();
        a.apply_event(TaskEvent::save(task("t1", TASK_STATUS_ACTIVE)))
            .await;
        let mut renamed = task("t1", TASK_STATUS_ACTIVE);
        renamed.name = "renamed".into();
        a.apply_event(TaskEvent::save(renamed)).await;
        assert_eq!(a.plan_count(), 1);
        assert_eq!(a.plan("1/t1").unwrap().task.name, "renamed");
    }

    #[tokio::test]
    async fn save_with_inactive_status_behaves_as_delete() {
        let a = agent();
        a.apply_event(TaskEvent::save(task("t1", TASK_STATUS_ACTIVE)))
            .await;
        a.apply_event(TaskEvent::save(task("t1", 0))).await;
        assert!(a.plan("1/t1").is_none());
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let a = agent();
        a.apply_event(TaskEvent::save(task("t1", TASK_STATUS_ACTIVE)))
            .await;
        a.apply_event(TaskEvent::delete(task("t1", TASK_STATUS_ACTIVE)))
            .await;
        a.apply_event(TaskEvent::delete(task("t1", TASK_STATUS_ACTIVE)))
            .await;
        assert_eq!(a.plan_count(), 0);
    }

    #[tokio::test]
    async fn malformed_cron_is_logged_and_dropped() {
        let a = agent();
        let mut bad = task("t1", TASK_STATUS_ACTIVE);
        bad.cron_expr = "definitely not cron".into();
        a.apply_event(TaskEvent::save(bad)).await;
        assert_eq!(a.plan_count(), 0);
    }

    #[tokio::test]
    async fn kill_without_a_running_execution_is_a_noop() {
        let a = agent();
        a.apply_event(TaskEvent::save(task("t1", TASK_STATUS_ACTIVE)))
            .await;
        a.apply_event(TaskEvent::kill(task("t1", TASK_STATUS_ACTIVE)))
            .await;
        // Plan survives; nothing was executing.
        assert!(a.plan("1/t1").is_some());
    }

    #[tokio::test]
    async fn starting_the_loop_twice_fails() {
        let a = agent();
        let token = CancellationToken::new();
        let first = a.clone().start(token.clone());
        // Give the first loop a chance to claim the intakes.
        tokio::time::sleep(Duration::from_millis(50)).await;
        let second = a.clone().start(token.clone()).await.unwrap();
        assert!(matches!(second, Err(SchedulerError::AlreadyRunning)));
        token.cancel();
        assert!(first.await.unwrap().is_ok());
    }
}
