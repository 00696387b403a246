//! Bounded retry for durable status transitions.
//!
//! [`retry`] drives a fallible async operation up to `attempts` times. The
//! wait between attempts is derived from the attempt number: the base delay
//! doubles after each failure and is capped, so a flaky store gets a few
//! quick retries and a down store does not stall the worker for long.

use std::future::Future;
use std::time::Duration;

/// Wait schedule between retry attempts.
#[derive(Clone, Copy, Debug)]
pub struct RetryDelay {
    /// Wait after the first failure. Doubles with each further failure.
    pub base: Duration,
    /// Upper bound on any single wait.
    pub cap: Duration,
}

impl Default for RetryDelay {
    fn default() -> Self {
        Self {
            base: Duration::from_millis(200),
            cap: Duration::from_secs(5),
        }
    }
}

impl RetryDelay {
    /// Wait applied after the `attempt`-th failure (1-based):
    /// `base * 2^(attempt-1)`, capped.
    pub fn after_attempt(&self, attempt: u32) -> Duration {
        let doublings = attempt.saturating_sub(1).min(16);
        self.base.saturating_mul(1 << doublings).min(self.cap)
    }
}

/// Invokes `f` up to `attempts` times until it succeeds.
///
/// Returns the last error when every attempt fails. Zero `attempts` is
/// treated as one.
pub async fn retry<F, Fut, E>(attempts: u32, delay: RetryDelay, mut f: F) -> Result<(), E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<(), E>>,
{
    let attempts = attempts.max(1);

    for attempt in 1..=attempts {
        match f().await {
            Ok(()) => return Ok(()),
            Err(e) => {
                if attempt == attempts {
                    return Err(e);
                }
                tokio::time::sleep(delay.after_attempt(attempt)).await;
            }
        }
    }
    unreachable!("retry loop returns on final attempt")
}
