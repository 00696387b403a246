//! # Scheduler state: intake queues and the two tables.
//!
//! [`TaskScheduler`] owns the bounded intake queues and the plan/executing
//! tables. Producers anywhere in the process push [`TaskEvent`]s and
//! [`TaskExecuteResult`]s through it; the agent loop is the single consumer
//! of both queues and takes the receiving ends exactly once at start-up.
//!
//! Queue capacity is the system's backpressure signal: `push_event` and
//! `push_task_result` wait when the queue is full, `try_push_event` fails
//! fast instead.

use tokio::sync::{mpsc, RwLock};

use crate::config::Config;
use crate::error::SchedulerError;
use crate::plan::{TaskExecuteResult, TaskExecutingInfo, TaskSchedulePlan};
use crate::tables::{ExecutingTable, PlanTable};
use crate::task::TaskEvent;

pub(crate) struct Intakes {
    pub events: mpsc::Receiver<TaskEvent>,
    pub results: mpsc::Receiver<TaskExecuteResult>,
}

/// Shared scheduler state: queues plus plan/executing tables.
pub struct TaskScheduler {
    plans: PlanTable,
    executing: ExecutingTable,
    event_tx: mpsc::Sender<TaskEvent>,
    result_tx: mpsc::Sender<TaskExecuteResult>,
    intakes: RwLock<Option<Intakes>>,
}

impl TaskScheduler {
    pub fn new(cfg: &Config) -> Self {
        let (event_tx, event_rx) = mpsc::channel(cfg.event_queue_capacity);
        let (result_tx, result_rx) = mpsc::channel(cfg.result_queue_capacity);
        Self {
            plans: PlanTable::new(),
            executing: ExecutingTable::new(),
            event_tx,
            result_tx,
            intakes: RwLock::new(Some(Intakes {
                events: event_rx,
                results: result_rx,
            })),
        }
    }

    /// Hands the receiving ends to the loop. `None` after the first call.
    pub(crate) async fn take_intakes(&self) -> Option<Intakes> {
        self.intakes.write().await.take()
    }

    // ---- Event intake ----

    /// Enqueues an inbound event, waiting while the queue is full.
    pub async fn push_event(&self, event: TaskEvent) -> Result<(), SchedulerError> {
        self.event_tx
            .send(event)
            .await
            .map_err(|_| SchedulerError::QueueClosed)
    }

    /// Enqueues an inbound event without waiting.
    pub fn try_push_event(&self, event: TaskEvent) -> Result<(), SchedulerError> {
        self.event_tx.try_send(event).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => SchedulerError::QueueFull,
            mpsc::error::TrySendError::Closed(_) => SchedulerError::QueueClosed,
        })
    }

    // ---- Result intake ----

    /// Enqueues an execution result, waiting while the queue is full.
    /// Workers call this as their terminal step; the declined-firing path
    /// calls it from the loop task.
    pub async fn push_task_result(&self, result: TaskExecuteResult) -> Result<(), SchedulerError> {
        self.result_tx
            .send(result)
            .await
            .map_err(|_| SchedulerError::QueueClosed)
    }

    // ---- Plan table ----

    /// Returns a copy of the plan stored under `key`.
    pub fn plan(&self, key: &str) -> Option<TaskSchedulePlan> {
        self.plans.get(key)
    }

    pub(crate) fn set_plan(&self, key: String, plan: TaskSchedulePlan) {
        self.plans.insert(key, plan);
    }

    pub fn remove_plan(&self, key: &str) {
        self.plans.remove(key);
    }

    /// Visits each plan until `f` returns `false`. Safe for concurrent
    /// callers; see [`PlanTable::range`] for the snapshot caveats.
    pub fn plan_range(&self, f: impl FnMut(&str, &TaskSchedulePlan) -> bool) {
        self.plans.range(f);
    }

    /// Number of installed plans. O(n) over the table.
    pub fn plan_count(&self) -> usize {
        self.plans.count()
    }

    pub(crate) fn plans(&self) -> &PlanTable {
        &self.plans
    }

    // ---- Executing table ----

    /// Returns a copy of the in-flight handle for `key`, sharing its
    /// cancellation token. Cancelling the copy cancels the execution.
    pub fn executing_info(&self, key: &str) -> Option<TaskExecutingInfo> {
        self.executing.get(key)
    }

    /// Whether a firing of `key` is currently registered.
    pub fn is_executing(&self, key: &str) -> bool {
        self.executing.contains(key)
    }

    pub(crate) fn set_executing(&self, key: String, info: TaskExecutingInfo) {
        self.executing.insert(key, info);
    }

    pub(crate) fn remove_executing(&self, key: &str) {
        self.executing.remove(key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::{Task, TaskEvent, TASK_STATUS_ACTIVE};

    fn task(id: &str) -> Task {
        Task {
            project_id: 1,
            task_id: id.into(),
            name: id.into(),
            command: String::new(),
            cron_expr: "* * * * * *".into(),
            timeout: 0,
            status: TASK_STATUS_ACTIVE,
            noseize: 1,
            client_ip: String::new(),
        }
    }

    #[tokio::test]
    async fn intakes_are_taken_exactly_once() {
        let sched = TaskScheduler::new(&Config::default());
        assert!(sched.take_intakes().await.is_some());
        assert!(sched.take_intakes().await.is_none());
    }

    #[tokio::test]
    async fn try_push_event_reports_full_queue() {
        let cfg = Config {
            event_queue_capacity: 1,
            ..Config::default()
        };
        let sched = TaskScheduler::new(&cfg);
        sched.try_push_event(TaskEvent::save(task("a"))).unwrap();
        let err = sched
            .try_push_event(TaskEvent::save(task("b")))
            .unwrap_err();
        assert!(matches!(err, SchedulerError::QueueFull));
    }

    #[tokio::test]
    async fn pushed_events_arrive_in_order() {
        let sched = TaskScheduler::new(&Config::default());
        let mut intakes = sched.take_intakes().await.unwrap();

        sched.push_event(TaskEvent::save(task("a"))).await.unwrap();
        sched
            .push_event(TaskEvent::delete(task("b")))
            .await
            .unwrap();

        let first = intakes.events.recv().await.unwrap();
        let second = intakes.events.recv().await.unwrap();
        assert_eq!(first.task.task_id, "a");
        assert_eq!(second.task.task_id, "b");
    }
}
