//! Bounded retry for async operations.
//!
//! A component states its policy as a [`RetryConfig`] and a predicate over its error type.
//! The operation is called with the 1-based attempt number, so per-attempt inputs (an escalated
//! gas ceiling, for example) are derived from it rather than from loop state.
//!
//! ```ignore
//! let hash = retry_with_classifier(
//!     RetryConfig::for_submission(),
//!     "send_transaction",
//!     |attempt| async move { send(plan.for_attempt(attempt, 120)).await },
//!     ClassifiedError::is_retryable,
//! )
//! .await?;
//! ```

use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::consts::{
    DEFAULT_SUBMIT_MAX_ATTEMPTS, DEFAULT_SUBMIT_RETRY_DELAY_SECS, DEFAULT_VERIFY_MAX_ATTEMPTS,
    DEFAULT_VERIFY_RETRY_DELAY_SECS,
};
use crate::config::{SubmitConfig, VerifyConfig};

/// Wait between two attempts.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Backoff {
    Fixed(Duration),
    /// `initial * multiplier^(n - 1)` after the n-th failure, capped at `max`.
    Exponential {
        initial: Duration,
        multiplier: f64,
        max: Duration,
    },
}

impl Backoff {
    /// Delay after the `failed_attempt`-th failure.
    pub fn delay_after(&self, failed_attempt: u32) -> Duration {
        match *self {
            Backoff::Fixed(delay) => delay,
            Backoff::Exponential {
                initial,
                multiplier,
                max,
            } => {
                let exponent = failed_attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
                let secs = initial.as_secs_f64() * multiplier.powi(exponent);
                if secs.is_finite() && secs < max.as_secs_f64() {
                    Duration::from_secs_f64(secs)
                } else {
                    max
                }
            }
        }
    }
}

/// Attempt budget plus backoff. `max_attempts` counts the first call and is at least 1.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub backoff: Backoff,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::for_submission()
    }
}

impl RetryConfig {
    pub fn fixed(delay: Duration, max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff: Backoff::Fixed(delay),
        }
    }

    pub fn exponential(
        initial: Duration,
        max_attempts: u32,
        multiplier: f64,
        max_delay: Duration,
    ) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff: Backoff::Exponential {
                initial,
                multiplier: multiplier.max(1.0),
                max: max_delay,
            },
        }
    }

    /// Two total attempts, two seconds apart.
    pub fn for_submission() -> Self {
        Self::fixed(
            Duration::from_secs(DEFAULT_SUBMIT_RETRY_DELAY_SECS),
            DEFAULT_SUBMIT_MAX_ATTEMPTS,
        )
    }

    /// Three reads, two seconds apart.
    pub fn for_verification() -> Self {
        Self::fixed(
            Duration::from_secs(DEFAULT_VERIFY_RETRY_DELAY_SECS),
            DEFAULT_VERIFY_MAX_ATTEMPTS,
        )
    }
}

impl From<SubmitConfig> for RetryConfig {
    fn from(cfg: SubmitConfig) -> Self {
        Self::fixed(Duration::from_secs(cfg.retry_delay_secs), cfg.max_attempts)
    }
}

impl From<VerifyConfig> for RetryConfig {
    fn from(cfg: VerifyConfig) -> Self {
        Self::fixed(Duration::from_secs(cfg.retry_delay_secs), cfg.max_attempts)
    }
}

/// [`retry_with_classifier`] that treats every error as retryable.
pub async fn retry<F, Fut, T, E>(
    config: RetryConfig,
    operation_name: &str,
    operation: F,
) -> Result<T, E>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    retry_with_classifier(config, operation_name, operation, |_| true).await
}

/// Call `operation` until it succeeds, fails with an error `is_retryable` rejects, or the
/// attempt budget runs out. The last error is returned unchanged.
pub async fn retry_with_classifier<F, Fut, T, E, C>(
    config: RetryConfig,
    operation_name: &str,
    mut operation: F,
    is_retryable: C,
) -> Result<T, E>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
    C: Fn(&E) -> bool,
{
    let max_attempts = config.max_attempts.max(1);
    let mut attempt = 1;

    loop {
        let error = match operation(attempt).await {
            Ok(value) => {
                if attempt > 1 {
                    debug!(operation = operation_name, attempt, "Succeeded on retry");
                }
                return Ok(value);
            }
            Err(error) => error,
        };

        if !is_retryable(&error) {
            debug!(operation = operation_name, attempt, error = %error, "Not retryable");
            return Err(error);
        }
        if attempt >= max_attempts {
            warn!(
                operation = operation_name,
                attempt,
                max_attempts,
                error = %error,
                "Giving up after last attempt"
            );
            return Err(error);
        }

        let delay = config.backoff.delay_after(attempt);
        warn!(
            operation = operation_name,
            attempt,
            max_attempts,
            delay_ms = delay.as_millis() as u64,
            error = %error,
            "Attempt failed, retrying"
        );
        tokio::time::sleep(delay).await;
        attempt += 1;
    }
}
