//! # Per-firing worker.
//!
//! Each due plan spawns one worker. The prelude (the already-running
//! conflict check) runs synchronously on the loop task so that two firings
//! of the same plan can never race past each other. Everything else runs in
//! the spawned body:
//!
//! 1. build the in-flight handle;
//! 2. for seize tasks, sleep a uniform random jitter and try the
//!    distributed lock, declining the firing on contention;
//! 3. register in the executing table;
//! 4. durably mark the task running (retried; persistent failure re-emits
//!    the task as a temporary event and abandons the firing);
//! 5. run the body;
//! 6. durably clear the running mark (retried; failure logged only);
//! 7. deregister;
//! 8. push the result.
//!
//! The jitter in step 2 keeps a clock-leading agent from winning every lock
//! round across the cluster.

use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tokio::time;
use tracing::{error, warn};

use crate::agent::Agent;
use crate::plan::{TaskExecuteResult, TaskExecutingInfo, TaskSchedulePlan};
use crate::retry::retry;
use crate::task::{Task, TaskEvent};

/// Uniform random duration in `[0, limit)`. Zero limit disables the sleep.
fn jitter(limit: Duration) -> Duration {
    let ms = limit.as_millis().min(u128::from(u64::MAX)) as u64;
    if ms == 0 {
        return Duration::ZERO;
    }
    Duration::from_millis(rand::rng().random_range(0..ms))
}

impl Agent {
    /// Begins at most one execution of `plan`. Returns immediately; the
    /// real work happens in a spawned worker.
    ///
    /// Must be called from the loop task: the conflict check below is what
    /// serializes firings of the same plan.
    pub(crate) async fn try_start_task(&self, mut plan: TaskSchedulePlan) {
        let key = plan.task.scheduler_key();
        if self.scheduler.is_executing(&key) {
            let result = TaskExecuteResult::still_running(plan);
            if let Err(e) = self.scheduler.push_task_result(result).await {
                error!(error = e.as_label(), "result intake unavailable");
            }
            return;
        }

        plan.task.client_ip = self.cfg.local_ip.clone();

        // Upgrade only fails while the agent is being torn down, in which
        // case declining the firing is the right call.
        let Some(agent) = self.me.upgrade() else {
            return;
        };
        tokio::spawn(async move {
            agent.run_firing(plan).await;
        });
    }

    /// The asynchronous worker body: lock, execute, report.
    async fn run_firing(self: Arc<Self>, plan: TaskSchedulePlan) {
        let task = plan.task.clone();

        let mut lock = None;
        if task.requires_lock() {
            let mut handle = self.locks.lock(&task);
            // De-bias clock-skewed agents before contending for the lock.
            time::sleep(jitter(self.cfg.lock_jitter)).await;
            if let Err(e) = handle.try_lock().await {
                warn!(
                    task = %task.name,
                    id = %task.task_id,
                    error = %e,
                    "task lock not acquired, declining firing"
                );
                return;
            }
            lock = Some(handle);
        }

        self.execute_plan(plan).await;

        if let Some(mut handle) = lock {
            handle.unlock().await;
        }
    }

    /// Steps 3-8: runs with the lock held (when one is required).
    async fn execute_plan(&self, plan: TaskSchedulePlan) {
        let info = TaskExecutingInfo::from_plan(plan);
        let task = info.task().clone();
        let key = task.scheduler_key();

        // Registration precedes the durable transition: the conflict check
        // in the prelude keys off this entry.
        self.scheduler.set_executing(key.clone(), info.clone());

        if let Err(e) = self.store.set_task_running(task.clone()).await {
            warn!(
                task = %task.name,
                id = %task.task_id,
                error = %e,
                "change running status failed"
            );
            let rescheduled = retry(self.cfg.status_retries, self.cfg.retry_delay, || {
                self.temporary_schedule(task.clone())
            })
            .await;
            if let Err(e) = rescheduled {
                error!(
                    task = %task.name,
                    id = %task.task_id,
                    error = %e,
                    "save task running status failed and reschedule failed"
                );
            }
            // The executing-table entry stays behind on purpose: without a
            // durable running mark the firing is abandoned, and the entry
            // blocks refiring until an operator kill or agent restart.
            return;
        }

        let result = self.runner.execute(info).await;

        if let Err(e) = retry(self.cfg.status_retries, self.cfg.retry_delay, || {
            self.store.set_task_not_running(task.clone())
        })
        .await
        {
            error!(
                task = %task.name,
                id = %task.task_id,
                error = %e,
                "failed to clear running status, the task is finished"
            );
        }

        self.scheduler.remove_executing(&key);
        if let Err(e) = self.scheduler.push_task_result(result).await {
            error!(error = e.as_label(), "result intake unavailable");
        }
    }

    /// Recovery action for a failed durable transition: hand the task back
    /// to the loop as a one-shot temporary event.
    async fn temporary_schedule(&self, task: Task) -> anyhow::Result<()> {
        self.scheduler
            .push_event(TaskEvent::temporary(task))
            .await
            .map_err(anyhow::Error::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn jitter_stays_below_the_limit() {
        let limit = Duration::from_millis(100);
        for _ in 0..1000 {
            assert!(jitter(limit) < limit);
        }
    }

    #[test]
    fn zero_limit_disables_jitter() {
        assert_eq!(jitter(Duration::ZERO), Duration::ZERO);
    }
}
