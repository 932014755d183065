//! Bounded exponential backoff around model calls.
//!
//! The delay before retry `n` (1-based) is `initial * multiplier^(n-1)`,
//! capped at `max_delay`. Policies are validated so the delays stay strictly
//! increasing for every retry the attempt cap allows.
use super::LmError;
use anyhow::{anyhow, Result};
use std::time::Duration;

/// Upper bound on `max_attempts`; keeps a misconfigured run from hammering the endpoint.
pub const MAX_ATTEMPTS_LIMIT: u32 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first call.
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub multiplier: u32,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            initial_delay: Duration::from_secs(1),
            multiplier: 2,
            max_delay: Duration::from_secs(10),
        }
    }
}

/// A successful value plus the number of attempts it took.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attempted<T> {
    pub value: T,
    pub attempts: u32,
}

/// Terminal failure: a fatal error, or the attempt cap reached.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("model call failed after {attempts} attempt(s): {last}")]
pub struct RetryFailure {
    pub attempts: u32,
    pub last: LmError,
}

impl RetryPolicy {
    /// Delay slept before retry number `retry` (1-based).
    pub fn delay_before_retry(&self, retry: u32) -> Duration {
        let factor = self.multiplier.saturating_pow(retry.saturating_sub(1));
        self.initial_delay
            .saturating_mul(factor)
            .min(self.max_delay)
    }

    /// Every delay the policy can sleep, in order.
    pub fn schedule(&self) -> Vec<Duration> {
        (1..self.max_attempts)
            .map(|retry| self.delay_before_retry(retry))
            .collect()
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_attempts == 0 || self.max_attempts > MAX_ATTEMPTS_LIMIT {
            return Err(anyhow!(
                "retry.max_attempts must be between 1 and {MAX_ATTEMPTS_LIMIT} (got {})",
                self.max_attempts
            ));
        }
        if self.multiplier < 2 {
            return Err(anyhow!(
                "retry.multiplier must be at least 2 (got {})",
                self.multiplier
            ));
        }
        if self.initial_delay.is_zero() {
            return Err(anyhow!("retry.initial_delay_ms must be positive"));
        }
        if self.max_delay < self.initial_delay {
            return Err(anyhow!(
                "retry.max_delay_ms ({}) must not be below retry.initial_delay_ms ({})",
                self.max_delay.as_millis(),
                self.initial_delay.as_millis()
            ));
        }
        let schedule = self.schedule();
        if let Some(pair) = schedule.windows(2).find(|pair| pair[0] >= pair[1]) {
            return Err(anyhow!(
                "retry delays plateau at {}ms before the attempt cap; lower retry.max_attempts or raise retry.max_delay_ms",
                pair[1].as_millis()
            ));
        }
        Ok(())
    }

    /// Run `op` until it succeeds, fails fatally, or the attempt cap is hit.
    ///
    /// `op` receives the 1-based attempt number; `sleep` is called with each
    /// backoff delay before the next attempt.
    pub fn run<T, F, S>(&self, mut op: F, mut sleep: S) -> Result<Attempted<T>, RetryFailure>
    where
        F: FnMut(u32) -> Result<T, LmError>,
        S: FnMut(Duration),
    {
        let mut attempt = 1;
        loop {
            match op(attempt) {
                Ok(value) => {
                    if attempt > 1 {
                        tracing::info!(attempt, "model call succeeded after retry");
                    }
                    return Ok(Attempted {
                        value,
                        attempts: attempt,
                    });
                }
                Err(err) if err.is_transient() && attempt < self.max_attempts => {
                    let delay = self.delay_before_retry(attempt);
                    tracing::warn!(
                        attempt,
                        max_attempts = self.max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "transient model failure; backing off"
                    );
                    sleep(delay);
                    attempt += 1;
                }
                Err(err) => {
                    return Err(RetryFailure {
                        attempts: attempt,
                        last: err,
                    });
                }
            }
        }
    }
}
