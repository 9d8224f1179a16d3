use std::time::Duration;

use crate::error::{GhostlineError, Result};

/// Retry timing for proxied requests.
///
/// Backoff is linear: the wait after the n-th failed attempt is
/// `backoff_step * n`, kept within `[min_wait, max_wait]`. This is not an
/// exponential policy and must not be turned into one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first one (0 behaves like 1)
    pub max_attempts: u32,
    /// Lower bound for a single wait
    pub min_wait: Duration,
    /// Upper bound for a single wait
    pub max_wait: Duration,
    /// Linear growth per attempt
    pub backoff_step: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            min_wait: Duration::from_secs(1),
            max_wait: Duration::from_secs(30),
            backoff_step: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    /// Build a policy from whole-second values
    pub fn new(
        max_attempts: u32,
        min_wait_secs: u64,
        max_wait_secs: u64,
        backoff_step_secs: u64,
    ) -> Result<Self> {
        let policy = Self {
            max_attempts,
            min_wait: Duration::from_secs(min_wait_secs),
            max_wait: Duration::from_secs(max_wait_secs),
            backoff_step: Duration::from_secs(backoff_step_secs),
        };
        policy.validate()?;
        Ok(policy)
    }

    /// A policy that never waits between attempts
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            min_wait: Duration::ZERO,
            max_wait: Duration::ZERO,
            backoff_step: Duration::ZERO,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_wait < self.min_wait {
            return Err(GhostlineError::InvalidConfig(format!(
                "retry max wait ({}s) must not be lower than min wait ({}s)",
                self.max_wait.as_secs_f64(),
                self.min_wait.as_secs_f64()
            )));
        }
        Ok(())
    }

    /// Number of attempts the executor makes, never less than one
    pub fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }

    /// Wait before the next attempt, after `attempt` (1-based) has failed
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let linear = self.backoff_step.saturating_mul(attempt);
        // Not `clamp`: it panics when the bounds are inverted.
        linear.max(self.min_wait).min(self.max_wait.max(self.min_wait))
    }
}
