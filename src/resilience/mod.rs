//! Retry policies for Obelisk requests.
//!
//! A [`RetryPolicy`] is a pure decision: given how many attempts have failed
//! and the last error, should the request be re-issued and after how long.
//! [`RetryExecutor`] applies a policy to an async operation.
//!
//! Only transient faults ever reach a policy. Client rejections, protocol
//! violations and authentication failures fail the operation immediately,
//! and the 401 refresh-and-retry cycle lives below the executor so it never
//! consumes the retry budget.

use crate::errors::{ObeliskError, ObeliskResult};
use std::future::Future;
use std::time::Duration;
use tracing::debug;

/// Outcome of consulting a retry policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryDecision {
    /// Whether the failed request should be re-issued.
    pub should_retry: bool,
    /// How long to wait before re-issuing it.
    pub delay: Duration,
}

impl RetryDecision {
    /// Give up.
    pub const STOP: RetryDecision = RetryDecision {
        should_retry: false,
        delay: Duration::ZERO,
    };

    /// Retry after `delay`.
    pub fn after(delay: Duration) -> Self {
        Self {
            should_retry: true,
            delay,
        }
    }
}

/// How transient failures are retried.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum RetryPolicy {
    /// Never re-issue a failed request.
    #[default]
    NoRetry,

    /// Re-issue up to `max_retries` times without waiting.
    Immediate {
        /// Maximum number of retries after the first attempt.
        max_retries: u32,
    },

    /// Re-issue up to `max_retries` times, waiting `base * 2^(n-1)` before
    /// the n-th retry.
    ExponentialBackoff {
        /// Maximum number of retries after the first attempt.
        max_retries: u32,
        /// Delay before the first retry.
        base: Duration,
        /// Upper bound on any single delay.
        max_backoff: Option<Duration>,
    },
}

impl RetryPolicy {
    /// Immediate retry policy.
    pub fn immediate(max_retries: u32) -> Self {
        RetryPolicy::Immediate { max_retries }
    }

    /// Uncapped exponential backoff policy.
    pub fn exponential(max_retries: u32, base: Duration) -> Self {
        RetryPolicy::ExponentialBackoff {
            max_retries,
            base,
            max_backoff: None,
        }
    }

    /// Caps the delay of an exponential backoff policy. Other variants are
    /// returned unchanged.
    pub fn capped(self, cap: Duration) -> Self {
        match self {
            RetryPolicy::ExponentialBackoff {
                max_retries, base, ..
            } => RetryPolicy::ExponentialBackoff {
                max_retries,
                base,
                max_backoff: Some(cap),
            },
            other => other,
        }
    }

    /// Maximum number of retries this policy allows.
    pub fn max_retries(&self) -> u32 {
        match self {
            RetryPolicy::NoRetry => 0,
            RetryPolicy::Immediate { max_retries }
            | RetryPolicy::ExponentialBackoff { max_retries, .. } => *max_retries,
        }
    }

    /// Decides whether to retry after `attempt` attempts (1-based) have
    /// failed with `error`.
    pub fn decide(&self, attempt: u32, error: &ObeliskError) -> RetryDecision {
        if !error.is_retryable() || attempt > self.max_retries() {
            return RetryDecision::STOP;
        }

        match self {
            RetryPolicy::NoRetry => RetryDecision::STOP,
            RetryPolicy::Immediate { .. } => RetryDecision::after(Duration::ZERO),
            RetryPolicy::ExponentialBackoff {
                base, max_backoff, ..
            } => RetryDecision::after(backoff_delay(*base, attempt, *max_backoff)),
        }
    }
}

/// `base * 2^(attempt-1)`, saturating, optionally capped.
pub fn backoff_delay(base: Duration, attempt: u32, cap: Option<Duration>) -> Duration {
    let exp = attempt.saturating_sub(1).min(31);
    let delay = base.checked_mul(1u32 << exp).unwrap_or(Duration::MAX);
    match cap {
        Some(cap) => delay.min(cap),
        None => delay,
    }
}

/// Applies a [`RetryPolicy`] to an async operation.
#[derive(Debug, Clone, Default)]
pub struct RetryExecutor {
    policy: RetryPolicy,
}

impl RetryExecutor {
    /// Creates a new retry executor.
    pub fn new(policy: RetryPolicy) -> Self {
        Self { policy }
    }

    /// The policy in use.
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Executes an operation, re-issuing it on transient failure for as long
    /// as the policy allows.
    ///
    /// The error that finally surfaces carries the number of attempts made.
    /// Dropping the returned future abandons any pending sleep or call.
    pub async fn execute<F, Fut, T>(&self, mut operation: F) -> ObeliskResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = ObeliskResult<T>>,
    {
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;
            let error = match operation().await {
                Ok(result) => return Ok(result),
                Err(ObeliskError::Transient(err)) => {
                    ObeliskError::Transient(err.with_attempts(attempt))
                }
                Err(err) => return Err(err),
            };

            let decision = self.policy.decide(attempt, &error);
            if !decision.should_retry {
                return Err(error);
            }

            debug!(
                attempt,
                delay_ms = decision.delay.as_millis() as u64,
                error = %error,
                "Retrying transient failure"
            );

            if !decision.delay.is_zero() {
                tokio::time::sleep(decision.delay).await;
            }
        }
    }
}
