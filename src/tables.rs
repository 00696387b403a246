//! # Concurrent plan and executing tables.
//!
//! Both tables are keyed by [`Task::scheduler_key`](crate::Task::scheduler_key).
//! Structural writes to the plan table happen on the loop task; the tables
//! stay concurrent-safe anyway so external callers can introspect them and
//! so workers can deregister themselves when a firing completes.
//!
//! `range` iterates a point-in-time-ish snapshot: it may miss inserts and
//! observe deletes that race with the iteration, but it never duplicates or
//! corrupts entries.

use std::sync::Arc;

use dashmap::DashMap;

use crate::plan::{TaskExecutingInfo, TaskSchedulePlan};

/// Mapping from scheduler key to schedule plan.
#[derive(Clone, Default)]
pub struct PlanTable {
    inner: Arc<DashMap<String, TaskSchedulePlan>>,
}

impl PlanTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of the plan stored under `key`.
    pub fn get(&self, key: &str) -> Option<TaskSchedulePlan> {
        self.inner.get(key).map(|e| e.value().clone())
    }

    /// Inserts or overwrites the plan stored under `key`.
    pub fn insert(&self, key: String, plan: TaskSchedulePlan) {
        self.inner.insert(key, plan);
    }

    pub fn remove(&self, key: &str) {
        self.inner.remove(key);
    }

    /// Visits each entry until `f` returns `false`.
    pub fn range(&self, mut f: impl FnMut(&str, &TaskSchedulePlan) -> bool) {
        for entry in self.inner.iter() {
            if !f(entry.key(), entry.value()) {
                break;
            }
        }
    }

    /// Visits each entry mutably. Only the ticker uses this; it must not
    /// insert or remove entries while iterating.
    pub(crate) fn for_each_mut(&self, mut f: impl FnMut(&str, &mut TaskSchedulePlan)) {
        for mut entry in self.inner.iter_mut() {
            let (key, plan) = entry.pair_mut();
            f(key, plan);
        }
    }

    /// Current number of plans. O(n); callers only distinguish 0 from >0.
    pub fn count(&self) -> usize {
        self.inner.len()
    }
}

/// Mapping from scheduler key to the in-flight execution handle.
#[derive(Clone, Default)]
pub struct ExecutingTable {
    inner: Arc<DashMap<String, TaskExecutingInfo>>,
}

impl ExecutingTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of the in-flight handle for `key`. The copy shares
    /// the original's cancellation token.
    pub fn get(&self, key: &str) -> Option<TaskExecutingInfo> {
        self.inner.get(key).map(|e| e.value().clone())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.inner.contains_key(key)
    }

    pub(crate) fn insert(&self, key: String, info: TaskExecutingInfo) {
        self.inner.insert(key, info);
    }

    pub(crate) fn remove(&self, key: &str) {
        self.inner.remove(key);
    }

    pub fn count(&self) -> usize {
        self.inner.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::{Task, TASK_STATUS_ACTIVE};

    fn plan(id: &str) -> TaskSchedulePlan {
        TaskSchedulePlan::from_task(Task {
            project_id: 1,
            task_id: id.into(),
            name: id.into(),
            command: String::new(),
            cron_expr: "* * * * * *".into(),
            timeout: 0,
            status: TASK_STATUS_ACTIVE,
            noseize: 1,
            client_ip: String::new(),
        })
        .unwrap()
    }

    #[test]
    fn insert_get_remove_roundtrip() {
        let table = PlanTable::new();
        let p = plan("a");
        let key = p.task.scheduler_key();
        table.insert(key.clone(), p);
        assert_eq!(table.count(), 1);
        assert!(table.get(&key).is_some());
        table.remove(&key);
        assert_eq!(table.count(), 0);
        assert!(table.get(&key).is_none());
    }

    #[test]
    fn insert_overwrites_existing_key() {
        let table = PlanTable::new();
        let key = plan("a").task.scheduler_key();
        let mut second = plan("a");
        second.task.name = "renamed".into();
        table.insert(key.clone(), plan("a"));
        table.insert(key.clone(), second);
        assert_eq!(table.count(), 1);
        assert_eq!(table.get(&key).unwrap().task.name, "renamed");
    }

    #[test]
    fn range_visits_every_entry_and_honors_early_exit() {
        let table = PlanTable::new();
        for id in ["a", "b", "c"] {
            let p = plan(id);
            table.insert(p.task.scheduler_key(), p);
        }
        let mut seen = 0;
        table.range(|_, _| {
            seen += 1;
            true
        });
        assert_eq!(seen, 3);

        let mut visited = 0;
        table.range(|_, _| {
            visited += 1;
            false
        });
        assert_eq!(visited, 1);
    }

    #[test]
    fn executing_copies_share_the_cancellation_token() {
        let table = ExecutingTable::new();
        let info = TaskExecutingInfo::from_plan(plan("a"));
        let key = info.task().scheduler_key();
        table.insert(key.clone(), info);

        let copy = table.get(&key).unwrap();
        copy.cancel.cancel();
        assert!(table.get(&key).unwrap().cancel.is_cancelled());
    }
}
