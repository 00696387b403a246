//! # Agent runtime configuration.
//!
//! [`Config`] centralizes the tunables of the scheduler core: intake queue
//! capacities, the idle wake interval, the pre-lock jitter bound, durable
//! status retry behavior, and the agent's self-identifier.
//!
//! # Example
//! ```
//! use std::time::Duration;
//! use cronvisor::Config;
//!
//! let mut cfg = Config::default();
//! cfg.local_ip = "10.0.0.7".into();
//! cfg.lock_jitter = Duration::from_millis(500);
//!
//! assert_eq!(cfg.event_queue_capacity, 3000);
//! ```

use std::time::Duration;

use crate::retry::RetryDelay;

/// Global configuration for one agent.
///
/// Controls queue sizing, tick idling, lock fairness jitter, and the retry
/// policy for durable status transitions.
#[derive(Clone, Debug)]
pub struct Config {
    /// Capacity of the inbound task-event queue. Producers wait when full.
    pub event_queue_capacity: usize,
    /// Capacity of the execution-result queue. Workers wait when full.
    pub result_queue_capacity: usize,
    /// Sleep interval when the plan table is empty.
    pub idle_wake: Duration,
    /// Exclusive upper bound of the uniform random sleep taken before a
    /// distributed lock attempt. Zero disables the jitter.
    pub lock_jitter: Duration,
    /// Attempts for durable status transitions and the temporary-reschedule
    /// recovery path.
    pub status_retries: u32,
    /// Wait schedule between those attempts.
    pub retry_delay: RetryDelay,
    /// This agent's address, stamped into each task before execution.
    pub local_ip: String,
}

impl Default for Config {
    /// Provides a default configuration:
    /// - `event_queue_capacity = 3000`
    /// - `result_queue_capacity = 3000`
    /// - `idle_wake = 1s`
    /// - `lock_jitter = 1000ms`
    /// - `status_retries = 5`
    /// - `retry_delay = RetryDelay::default()`
    /// - `local_ip = ""` (callers fill in their address)
    fn default() -> Self {
        Self {
            event_queue_capacity: 3000,
            result_queue_capacity: 3000,
            idle_wake: Duration::from_secs(1),
            lock_jitter: Duration::from_millis(1000),
            status_retries: 5,
            retry_delay: RetryDelay::default(),
            local_ip: String::new(),
        }
    }
}
