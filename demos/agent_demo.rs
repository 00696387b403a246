//! # Demo: agent_demo
//!
//! Runs one agent end-to-end with in-process collaborators.
//!
//! Demonstrates how to:
//! - Wire the trait seams (`TaskStore`, `LockFactory`, `TaskRunner`,
//!   `ResultReporter`, `AlertSink`) with in-memory implementations.
//! - Start the loop, feed it `Save`/`Kill`/`Delete` events, and watch
//!   results flow back out.
//!
//! ## Flow
//! ```text
//! main()
//!   ├─► Agent::start(token)
//!   ├─► push Save   (every-second task)   … results stream to the reporter
//!   ├─► push Save   (long-running task)
//!   ├─► push Kill   (cancel the long run)
//!   ├─► push Delete (drop the ticker)
//!   └─► token.cancel() → loop exits
//! ```
//!
//! ## Run
//! ```bash
//! cargo run --example agent_demo
//! ```

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio_util::sync::CancellationToken;

use cronvisor::{
    Agent, AlertSink, Config, Hooks, LockFactory, ResultReporter, Task, TaskEvent,
    TaskExecuteResult, TaskExecutingInfo, TaskLock, TaskRunner, TaskStore, WarningData,
};

struct MemoryStore;

#[async_trait]
impl TaskStore for MemoryStore {
    async fn set_task_running(&self, task: Task) -> anyhow::Result<()> {
        println!("[store] {} running", task.scheduler_key());
        Ok(())
    }
    async fn set_task_not_running(&self, task: Task) -> anyhow::Result<()> {
        println!("[store] {} not running", task.scheduler_key());
        Ok(())
    }
}

/// Single-process stand-in for the cluster lock service.
struct LocalLocks;
struct LocalLock;

impl LockFactory for LocalLocks {
    fn lock(&self, _task: &Task) -> Box<dyn TaskLock> {
        Box::new(LocalLock)
    }
}

#[async_trait]
impl TaskLock for LocalLock {
    async fn try_lock(&mut self) -> anyhow::Result<()> {
        Ok(())
    }
    async fn unlock(&mut self) {}
}

/// Pretends to run the task's command for a little while.
struct EchoRunner;

#[async_trait]
impl TaskRunner for EchoRunner {
    async fn execute(&self, info: TaskExecutingInfo) -> TaskExecuteResult {
        let start = Utc::now();
        let cancelled = tokio::select! {
            _ = info.cancel.cancelled() => true,
            _ = tokio::time::sleep(Duration::from_millis(300)) => false,
        };
        TaskExecuteResult {
            start_time: start,
            end_time: Utc::now(),
            output: format!("ran `{}`", info.task().command),
            err: cancelled.then(|| "task canceled".to_string()),
            execute_info: info,
        }
    }
}

struct StdoutReporter;

#[async_trait]
impl ResultReporter for StdoutReporter {
    async fn report(&self, result: &TaskExecuteResult) -> anyhow::Result<()> {
        match &result.err {
            None => println!(
                "[result] {} ok: {}",
                result.execute_info.task().name,
                result.output
            ),
            Some(err) => println!("[result] {} failed: {err}", result.execute_info.task().name),
        }
        Ok(())
    }
}

struct StdoutAlerts;

#[async_trait]
impl AlertSink for StdoutAlerts {
    async fn warning(&self, data: WarningData) {
        println!("[alert] project={} task={}: {}", data.project_id, data.task_name, data.data);
    }
}

fn task(id: &str, cron_expr: &str, command: &str) -> Task {
    Task {
        project_id: 1,
        task_id: id.into(),
        name: id.into(),
        command: command.into(),
        cron_expr: cron_expr.into(),
        timeout: 30,
        status: 1,
        noseize: 0,
        client_ip: String::new(),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let mut cfg = Config::default();
    cfg.local_ip = "127.0.0.1".into();
    // A single demo agent has no peers to be fair to.
    cfg.lock_jitter = Duration::from_millis(50);

    let agent = Agent::new(
        cfg,
        Hooks {
            store: Arc::new(MemoryStore),
            locks: Arc::new(LocalLocks),
            runner: Arc::new(EchoRunner),
            reporter: Arc::new(StdoutReporter),
            alerts: Arc::new(StdoutAlerts),
        },
    );

    let token = CancellationToken::new();
    let loop_handle = agent.clone().start(token.clone());
    let scheduler = agent.scheduler();

    // 1) A ticker firing every second.
    println!("[demo] save ticker");
    scheduler
        .push_event(TaskEvent::save(task("ticker", "* * * * * *", "echo tick")))
        .await?;
    tokio::time::sleep(Duration::from_secs(3)).await;

    // 2) A long run we cancel mid-flight.
    println!("[demo] save long-run, then kill it");
    scheduler
        .push_event(TaskEvent::save(task("long-run", "* * * * * *", "sleep 600")))
        .await?;
    tokio::time::sleep(Duration::from_millis(1500)).await;
    scheduler
        .push_event(TaskEvent::kill(task("long-run", "* * * * * *", "")))
        .await?;
    scheduler
        .push_event(TaskEvent::delete(task("long-run", "* * * * * *", "")))
        .await?;
    tokio::time::sleep(Duration::from_secs(1)).await;

    // 3) Drop the ticker and shut down.
    println!("[demo] delete ticker, shut down");
    scheduler
        .push_event(TaskEvent::delete(task("ticker", "* * * * * *", "")))
        .await?;
    token.cancel();
    loop_handle.await??;

    println!("[demo] finished: loop exited.");
    Ok(())
}
