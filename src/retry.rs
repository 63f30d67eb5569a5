//! Bounded exponential backoff for transient failures.

use std::time::Duration;

use bon::Builder;

use crate::error::{Error as _, InvokeError};

/// The immutable retry configuration shared by every operation of a runtime.
///
/// Defaults: 100 ms initial interval, growth factor 1.5, 1 s interval cap,
/// at most 5 attempts per invocation.
#[derive(Debug, Clone, Copy, Builder)]
pub struct RetryPolicy {
    /// Backoff before the second attempt.
    #[builder(default = Duration::from_millis(100))]
    initial_interval: Duration,
    /// Multiplier applied to the interval after each attempt.
    #[builder(default = 1.5)]
    factor: f64,
    /// Upper bound on any single backoff, server-suggested delays included.
    #[builder(default = Duration::from_secs(1))]
    max_interval: Duration,
    /// Total transport attempts per top-level invocation.
    #[builder(default = 5)]
    max_attempts: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl RetryPolicy {
    /// A fresh [`Retryer`] for one top-level invocation. Retryers are never
    /// shared across invocations.
    #[must_use]
    pub fn retryer(&self) -> Retryer {
        Retryer {
            policy: *self,
            attempt: 0,
            interval: self.initial_interval,
        }
    }
}

/// Mutable per-invocation retry state.
#[derive(Debug)]
pub struct Retryer {
    policy: RetryPolicy,
    attempt: u32,
    interval: Duration,
}

impl Retryer {
    /// Absorbs a retryable failure by sleeping out the backoff, or re-raises.
    ///
    /// Sleeps the error's retry-after when it carries one, otherwise the next
    /// backoff interval; both are capped at the policy's maximum interval.
    ///
    /// # Errors
    ///
    /// The failure itself, when it is not retryable or attempts ran out.
    pub async fn continue_or_propagate(&mut self, error: InvokeError) -> Result<(), InvokeError> {
        if !error.is_retryable() {
            return Err(error);
        }
        self.attempt += 1;
        if self.attempt >= self.policy.max_attempts {
            return Err(error);
        }
        let wait = error
            .retry_after()
            .unwrap_or(self.interval)
            .min(self.policy.max_interval);
        tracing::debug!(
            attempt = self.attempt,
            wait_ms = u64::try_from(wait.as_millis()).unwrap_or(u64::MAX),
            "retrying after transient failure"
        );
        tokio::time::sleep(wait).await;
        self.interval = self
            .interval
            .mul_f64(self.policy.factor)
            .min(self.policy.max_interval);
        Ok(())
    }
}
