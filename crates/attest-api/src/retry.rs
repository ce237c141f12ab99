//! Bounded retry with transient/permanent classification
//!
//! An operation reports each failure as [`RetryError::Transient`] or
//! [`RetryError::Permanent`]. Permanent failures end the loop at once;
//! transient ones are retried after a constant delay until the policy's
//! attempt budget is spent, at which point the last error is returned wrapped
//! in [`Error::RetriesExhausted`].

use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::{Error, Result};

/// Default attempts per request, first try included
pub const DEFAULT_MAX_ATTEMPTS: u32 = 4;

/// Default delay between attempts
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(200);

/// How often, and how far apart, a request is attempted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, first try included
    pub max_attempts: u32,
    /// Constant delay between attempts
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            delay: DEFAULT_RETRY_DELAY,
        }
    }
}

impl RetryPolicy {
    /// A policy that retries without waiting
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            delay: Duration::ZERO,
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

/// Outcome of one failed attempt
#[derive(Debug)]
pub enum RetryError<E> {
    /// May succeed if repeated
    Transient(E),
    /// Will never succeed
    Permanent(E),
}

impl RetryError<Error> {
    /// Classify an error by [`Error::is_transient`]
    pub fn classify(err: Error) -> Self {
        if err.is_transient() {
            RetryError::Transient(err)
        } else {
            RetryError::Permanent(err)
        }
    }
}

/// Run `op` under `policy`, stopping early when `cancel` fires
///
/// `op` receives the 1-based attempt number.
pub async fn retry<T, F, Fut>(
    policy: &RetryPolicy,
    cancel: &CancellationToken,
    mut op: F,
) -> Result<T>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = std::result::Result<T, RetryError<Error>>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        attempt += 1;

        let err = match op(attempt).await {
            Ok(value) => return Ok(value),
            Err(RetryError::Permanent(err)) => return Err(err),
            Err(RetryError::Transient(err)) => err,
        };

        if attempt >= max_attempts {
            debug!(attempts = attempt, error = %err, "giving up after transient failures");
            return Err(Error::RetriesExhausted {
                attempts: attempt,
                source: Box::new(err),
            });
        }

        debug!(attempt, error = %err, "transient failure, retrying");
        if !policy.delay.is_zero() {
            tokio::select! {
                _ = cancel.cancelled() => return Err(Error::Cancelled),
                _ = tokio::time::sleep(policy.delay) => {}
            }
        }
    }
}
