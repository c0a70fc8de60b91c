//! Reusable retry policy for remote calls.

use std::{future::Future, time::Duration};

use tokio::time::sleep;
use tracing::debug;

/// Delay schedule between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    /// `attempt * step` after the given failed attempt (1-based).
    Linear { step: Duration },
    /// Doubling delay starting at `initial`, capped at `max`.
    Exponential { initial: Duration, max: Duration },
}

impl Backoff {
    /// Delay to wait after `failed_attempt` (1-based) before trying again.
    pub fn delay_after(&self, failed_attempt: u32) -> Duration {
        match *self {
            Backoff::Linear { step } => step.saturating_mul(failed_attempt),
            Backoff::Exponential { initial, max } => {
                let factor = 2u32.saturating_pow(failed_attempt.saturating_sub(1));
                initial.saturating_mul(factor).min(max)
            }
        }
    }
}

/// Retry budget of a call site.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts in total, first try included. Zero behaves like one.
    pub max_attempts: u32,
    /// Delay inserted between attempts.
    pub backoff: Backoff,
}

/// Every attempt failed.
#[derive(Debug)]
pub struct RetryError<E> {
    /// Attempts made.
    pub attempts: u32,
    /// Error of the final attempt.
    pub last_error: E,
}

impl RetryPolicy {
    /// Policy waiting `step`, `2 * step`, ... between attempts.
    pub fn linear(max_attempts: u32, step: Duration) -> Self {
        Self {
            max_attempts,
            backoff: Backoff::Linear { step },
        }
    }

    /// Run `operation` until it succeeds or the budget is spent.
    ///
    /// The closure receives the 1-based attempt number. On success the number
    /// of attempts used is returned next to the value.
    pub async fn run<T, E, F, Fut>(&self, mut operation: F) -> Result<(T, u32), RetryError<E>>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::fmt::Display,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            match operation(attempt).await {
                Ok(value) => return Ok((value, attempt)),
                Err(err) if attempt >= max_attempts => {
                    return Err(RetryError {
                        attempts: attempt,
                        last_error: err,
                    });
                }
                Err(err) => {
                    let delay = self.backoff.delay_after(attempt);
                    debug!(attempt, error = %err, ?delay, "attempt failed; retrying");
                    sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;

    #[test]
    fn linear_and_exponential_schedules() {
        let linear = Backoff::Linear {
            step: Duration::from_millis(500),
        };
        assert_eq!(linear.delay_after(1), Duration::from_millis(500));
        assert_eq!(linear.delay_after(2), Duration::from_millis(1000));

        let exponential = Backoff::Exponential {
            initial: Duration::from_secs(1),
            max: Duration::from_secs(5),
        };
        assert_eq!(exponential.delay_after(1), Duration::from_secs(1));
        assert_eq!(exponential.delay_after(3), Duration::from_secs(4));
        assert_eq!(exponential.delay_after(10), Duration::from_secs(5));
    }

    #[tokio::test(start_paused = true)]
    async fn stops_after_budget_and_reports_last_error() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::linear(3, Duration::from_millis(500));

        let result: Result<((), u32), _> = policy
            .run(|attempt| {
                calls.fetch_add(1, Ordering::SeqCst);
                async move { Err::<(), _>(format!("boom {attempt}")) }
            })
            .await;

        let err = result.unwrap_err();
        assert_eq!(err.attempts, 3);
        assert_eq!(err.last_error, "boom 3");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn succeeds_on_second_attempt() {
        let policy = RetryPolicy::linear(3, Duration::from_millis(500));
        let (value, attempts) = policy
            .run(|attempt| async move {
                if attempt == 1 {
                    Err("first try fails")
                } else {
                    Ok(attempt * 10)
                }
            })
            .await
            .unwrap();

        assert_eq!(value, 20);
        assert_eq!(attempts, 2);
    }
}
