//! Bounded retry with exponential backoff
//!
//! Every storage phase of every check runs through [`retry`]. The executor
//! makes up to `max_retries + 1` attempts, sleeps an exponentially growing
//! delay between them and gives up early once the phase deadline is spent.
//! Cancellation of the [`CancellationToken`] interrupts both the attempt and the
//! sleep and is reported separately from the two give-up cases.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use tokio::time::{Instant, sleep};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::error::Phase;

pub const DEFAULT_MAX_GET_RETRIES: u32 = 3;
pub const DEFAULT_MAX_SAVE_RETRIES: u32 = 2;
pub const DEFAULT_MAX_DELETE_RETRIES: u32 = 2;
pub const DEFAULT_MAX_RETRY_TIME: Duration = Duration::from_secs(180);
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(1);
pub const DEFAULT_MAX_RETRY_DELAY: Duration = Duration::from_secs(30);
pub const DEFAULT_JITTER: f64 = 0.2;

/// Retry ceilings and timing for the phases of a check
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Additional attempts for reading an aggregate
    pub max_get_retries: u32,
    /// Additional attempts for persisting rows
    pub max_save_retries: u32,
    /// Additional attempts for purging a window
    pub max_delete_retries: u32,
    /// Wall-clock budget for all attempts of one phase
    pub max_retry_time: Duration,
    /// Base backoff delay
    pub delay: Duration,
    /// Upper bound of the exponential part of the backoff
    pub max_delay: Duration,
    /// Jitter factor (0.0-1.0), only ever added on top of the delay
    pub jitter: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_get_retries: DEFAULT_MAX_GET_RETRIES,
            max_save_retries: DEFAULT_MAX_SAVE_RETRIES,
            max_delete_retries: DEFAULT_MAX_DELETE_RETRIES,
            max_retry_time: DEFAULT_MAX_RETRY_TIME,
            delay: DEFAULT_RETRY_DELAY,
            max_delay: DEFAULT_MAX_RETRY_DELAY,
            jitter: DEFAULT_JITTER,
        }
    }
}

impl RetryPolicy {
    /// Retry ceiling of a storage phase
    pub fn ceiling(&self, phase: Phase) -> u32 {
        match phase {
            Phase::Get => self.max_get_retries,
            Phase::Save => self.max_save_retries,
            Phase::Delete => self.max_delete_retries,
            Phase::Collect | Phase::Deliver => 0,
        }
    }

    /// `delay * 2^attempt` capped at `max_delay`, without jitter
    ///
    /// `attempt` is 0 for the sleep after the first failure.
    pub fn base_backoff(&self, attempt: u32) -> Duration {
        let multiplier = 2_u32.saturating_pow(attempt) as f64;
        let secs = (self.delay.as_secs_f64() * multiplier).min(self.max_delay.as_secs_f64());
        Duration::from_secs_f64(secs.max(0.0))
    }

    /// Backoff including jitter; never shorter than [`Self::base_backoff`]
    pub fn backoff(&self, attempt: u32) -> Duration {
        let base = self.base_backoff(attempt);
        let jitter = self.jitter.clamp(0.0, 1.0);
        if jitter == 0.0 || base.is_zero() {
            return base;
        }

        base + base.mul_f64(jitter * rand::random::<f64>())
    }
}

/// Why [`retry`] gave up
#[derive(Debug)]
pub enum RetryError<E> {
    /// The token was cancelled during an attempt or a sleep
    Cancelled,

    /// Every attempt failed
    Exhausted { attempts: u32, last_error: E },

    /// The phase deadline was reached before attempts ran out
    DeadlineReached {
        attempts: u32,
        elapsed: Duration,
        last_error: E,
    },
}

impl<E> RetryError<E> {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, RetryError::Cancelled)
    }
}

impl<E: fmt::Display> fmt::Display for RetryError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RetryError::Cancelled => write!(f, "cancelled"),
            RetryError::Exhausted {
                attempts,
                last_error,
            } => write!(f, "gave up after {} attempts: {}", attempts, last_error),
            RetryError::DeadlineReached {
                attempts,
                elapsed,
                last_error,
            } => write!(
                f,
                "deadline reached after {} attempts in {:?}: {}",
                attempts, elapsed, last_error
            ),
        }
    }
}

impl<E: fmt::Debug + fmt::Display> std::error::Error for RetryError<E> {}

/// Run `op` until it succeeds, `max_retries` additional attempts failed,
/// the policy deadline is reached or `ctx` is cancelled
pub async fn retry<F, Fut, T, E>(
    ctx: &CancellationToken,
    policy: &RetryPolicy,
    max_retries: u32,
    label: &str,
    mut op: F,
) -> Result<T, RetryError<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: fmt::Display,
{
    let start = Instant::now();
    let mut attempts: u32 = 0;

    loop {
        if ctx.is_cancelled() {
            return Err(RetryError::Cancelled);
        }

        attempts += 1;
        let outcome = tokio::select! {
            biased;
            _ = ctx.cancelled() => return Err(RetryError::Cancelled),
            res = op() => res,
        };

        let err = match outcome {
            Ok(value) => {
                if attempts > 1 {
                    debug!(label, attempts, "operation succeeded after retry");
                }
                return Ok(value);
            }
            Err(err) => err,
        };

        let elapsed = start.elapsed();
        if elapsed >= policy.max_retry_time {
            warn!(label, attempts, ?elapsed, "retry deadline reached: {}", err);
            return Err(RetryError::DeadlineReached {
                attempts,
                elapsed,
                last_error: err,
            });
        }

        if attempts > max_retries {
            warn!(label, attempts, "retries exhausted: {}", err);
            return Err(RetryError::Exhausted {
                attempts,
                last_error: err,
            });
        }

        let delay = policy
            .backoff(attempts - 1)
            .min(policy.max_retry_time - elapsed);
        debug!(
            label,
            attempts,
            delay_ms = delay.as_millis() as u64,
            "attempt failed, retrying: {}",
            err
        );

        tokio::select! {
            biased;
            _ = ctx.cancelled() => return Err(RetryError::Cancelled),
            _ = sleep(delay) => {}
        }

        let elapsed = start.elapsed();
        if elapsed >= policy.max_retry_time {
            warn!(label, attempts, ?elapsed, "retry deadline reached: {}", err);
            return Err(RetryError::DeadlineReached {
                attempts,
                elapsed,
                last_error: err,
            });
        }
    }
}
