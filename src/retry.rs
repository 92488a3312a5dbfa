//! Retry policy
//!
//! Immediate, bounded retries: no backoff and no jitter. An operation is run
//! from scratch on every attempt.

use tracing::warn;

use crate::error::{Result, StratumError};

/// Bounded retry policy.
///
/// `max_attempts` counts the first try, so the default of 2 means
/// "retry exactly once".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::retry_once()
    }
}

impl RetryPolicy {
    /// Policy allowing `max_attempts` tries in total (at least one)
    pub const fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts: if max_attempts == 0 { 1 } else { max_attempts },
        }
    }

    /// One try plus one immediate retry
    pub const fn retry_once() -> Self {
        Self::new(2)
    }

    /// A single try
    pub const fn no_retry() -> Self {
        Self::new(1)
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Run `op` until it succeeds or the attempts are used up.
    ///
    /// `op` receives the 1-based attempt number. When every attempt fails the
    /// last error is wrapped in [`StratumError::RetriesExhausted`].
    pub fn run<T, F>(&self, mut op: F) -> Result<T>
    where
        F: FnMut(u32) -> Result<T>,
    {
        let mut attempt = 1;
        loop {
            match op(attempt) {
                Ok(value) => return Ok(value),
                Err(e) if attempt < self.max_attempts => {
                    warn!(attempt, max_attempts = self.max_attempts, error = %e, "attempt failed, retrying");
                    attempt += 1;
                }
                Err(e) => {
                    return Err(StratumError::RetriesExhausted {
                        attempts: attempt,
                        source: Box::new(e),
                    })
                }
            }
        }
    }
}
