//! Bounded retry with linear backoff for outbound calls.
//!
//! `delay_after(n) = (n + 1) × base_delay`, with no jitter. Under correlated
//! backend failures every caller retries on the same schedule; adding jitter
//! would change observable timing and is left as a followup.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

/// Source of delays between attempts. Production code sleeps on the tokio
/// timer; tests substitute a recorder.
pub trait Sleeper: Send + Sync {
    fn sleep(&self, duration: Duration) -> Pin<Box<dyn Future<Output = ()> + Send>>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

impl Sleeper for TokioSleeper {
    fn sleep(&self, duration: Duration) -> Pin<Box<dyn Future<Output = ()> + Send>> {
        Box::pin(tokio::time::sleep(duration))
    }
}

/// Every attempt failed.
#[derive(Debug)]
pub struct RetryExhausted<E> {
    pub attempts: u32,
    pub last: E,
}

#[derive(Clone)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay: Duration,
    sleeper: Arc<dyn Sleeper>,
}

impl fmt::Debug for RetryPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("max_attempts", &self.max_attempts)
            .field("base_delay", &self.base_delay)
            .finish_non_exhaustive()
    }
}

impl Default for RetryPolicy {
    /// 3 attempts, 200ms/400ms between them.
    fn default() -> Self {
        Self::linear(3, Duration::from_millis(200))
    }
}

impl RetryPolicy {
    /// `max_attempts` below 1 is treated as 1.
    pub fn linear(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            sleeper: Arc::new(TokioSleeper),
        }
    }

    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    /// Delay after the failed attempt with zero-based index `attempt`.
    pub fn delay_after(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(attempt.saturating_add(1))
    }

    /// Longest time [`RetryPolicy::run`] can take when every attempt runs
    /// for `per_attempt`: all attempts plus every backoff between them.
    pub fn worst_case(&self, per_attempt: Duration) -> Duration {
        let backoff = (0..self.max_attempts - 1)
            .map(|attempt| self.delay_after(attempt))
            .fold(Duration::ZERO, Duration::saturating_add);
        per_attempt
            .saturating_mul(self.max_attempts)
            .saturating_add(backoff)
    }

    /// Run `op` until it succeeds or `max_attempts` attempts have failed.
    ///
    /// `op` receives the zero-based attempt index. There is no sleep after
    /// the final failure.
    pub async fn run<T, E, F, Fut>(
        &self,
        operation: &'static str,
        mut op: F,
    ) -> Result<T, RetryExhausted<E>>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: fmt::Display,
    {
        let mut attempt = 0;
        loop {
            match op(attempt).await {
                Ok(value) => return Ok(value),
                Err(err) => {
                    let attempts = attempt + 1;
                    if attempts >= self.max_attempts {
                        return Err(RetryExhausted {
                            attempts,
                            last: err,
                        });
                    }

                    let delay = self.delay_after(attempt);
                    tracing::warn!(
                        operation,
                        attempt = attempts,
                        max_attempts = self.max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "attempt failed, backing off"
                    );
                    self.sleeper.sleep(delay).await;
                    attempt = attempts;
                }
            }
        }
    }
}
