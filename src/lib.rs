//! # cronvisor
//!
//! **Cronvisor** is the scheduler core of a distributed cron execution
//! agent. Many agents run across a cluster; each one keeps its own
//! in-memory schedule and ticks it forward. When a task is due, the agent
//! either runs it locally after winning the task's distributed lock, or
//! declines the firing because a peer won or the previous run has not
//! finished.
//!
//! The crate deliberately owns only the hard middle: the single event loop,
//! the per-firing worker lifecycle, and the plan/executing tables whose
//! consistency makes the cluster run each task at most once per tick.
//! Everything with an opinion about infrastructure (the lock service, the
//! durable store, the task body, result delivery) enters through a narrow
//! trait.
//!
//! | Area            | Description                                              | Key types / traits                        |
//! |-----------------|----------------------------------------------------------|-------------------------------------------|
//! | **Agent loop**  | Multiplexes events, results, and the schedule timer.     | [`Agent`], [`Hooks`]                       |
//! | **Schedule**    | Plans, firings, and execution records.                   | [`TaskSchedulePlan`], [`TaskExecuteResult`] |
//! | **Events**      | Inbound mutations of the local schedule.                 | [`TaskEvent`], [`TaskEventKind`]           |
//! | **Seams**       | Store, lock, body, and reporting collaborators.          | [`TaskStore`], [`LockFactory`], [`TaskRunner`], [`ResultReporter`] |
//! | **Errors**      | Typed core errors with stable labels.                    | [`SchedulerError`]                         |
//! | **Configuration** | Queue sizing, jitter, retries, identity.               | [`Config`]                                 |
//!
//! ```no_run
//! use tokio_util::sync::CancellationToken;
//! use cronvisor::{Agent, Config, Hooks, Task, TaskEvent};
//! # fn hooks() -> Hooks { unimplemented!() }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut cfg = Config::default();
//!     cfg.local_ip = "10.0.0.7".into();
//!
//!     // Wire in your store, lock service, task runner, and sinks.
//!     let agent = Agent::new(cfg, hooks());
//!
//!     let token = CancellationToken::new();
//!     let loop_handle = agent.clone().start(token.clone());
//!
//!     // Feed it schedule mutations from your ingress of choice.
//!     let task = Task {
//!         project_id: 1,
//!         task_id: "heartbeat".into(),
//!         name: "heartbeat".into(),
//!         command: "/usr/bin/true".into(),
//!         cron_expr: "*/30 * * * * *".into(),
//!         timeout: 10,
//!         status: 1,
//!         noseize: 0,
//!         client_ip: String::new(),
//!     };
//!     agent.scheduler().push_event(TaskEvent::save(task)).await?;
//!
//!     token.cancel();
//!     loop_handle.await??;
//!     Ok(())
//! }
//! ```
//!
//! ---

mod agent;
mod config;
mod error;
mod lock;
mod plan;
mod report;
mod retry;
mod runner;
mod scheduler;
mod store;
mod tables;
mod task;
mod worker;

// ---- Public re-exports ----

pub use agent::{Agent, Hooks};
pub use config::Config;
pub use error::SchedulerError;
pub use lock::{LockFactory, TaskLock};
pub use plan::{TaskExecuteResult, TaskExecutingInfo, TaskSchedulePlan};
pub use report::{AlertSink, ResultReporter, WarningData, WarningKind};
pub use retry::{retry, RetryDelay};
pub use runner::TaskRunner;
pub use scheduler::TaskScheduler;
pub use store::TaskStore;
pub use tables::{ExecutingTable, PlanTable};
pub use task::{Task, TaskEvent, TaskEventKind, TASK_STATUS_ACTIVE};
