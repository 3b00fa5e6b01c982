//! Bounded retry with exponential backoff for remote lookups.

use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::warn;

/// Backoff schedule for retried operations.
///
/// Delays start at `initial_delay` and double on every retry, capped at
/// `max_delay`. `attempts` counts retries, not calls: a schedule with
/// `attempts = 2` runs the operation at most three times.
#[derive(Debug, Clone)]
pub struct Backoff {
    pub attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
}

impl Default for Backoff {
    fn default() -> Self {
        Self {
            attempts: 3,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
        }
    }
}

impl Backoff {
    pub fn new(attempts: u32, initial_delay: Duration, max_delay: Duration) -> Self {
        Self {
            attempts,
            initial_delay,
            max_delay,
        }
    }

    fn delays(&self) -> impl Iterator<Item = Duration> {
        let cap = self.max_delay;
        let mut next = self.initial_delay;
        (0..self.attempts).map(move |_| {
            let delay = next.min(cap);
            next = next.saturating_mul(2);
            delay
        })
    }
}

/// Run `operation` until it succeeds or the backoff schedule is exhausted,
/// sleeping between attempts. Errors rejected by `should_retry` and the
/// error of the final attempt are returned as-is.
pub async fn with_retry<T, E, F, Fut, P>(
    backoff: &Backoff,
    should_retry: P,
    operation: F,
) -> Result<T, E>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
    P: Fn(&E) -> bool,
{
    let mut delays = backoff.delays();
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) if should_retry(&err) => match delays.next() {
                Some(delay) => {
                    warn!(
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "Operation failed, retrying"
                    );
                    sleep(delay).await;
                }
                None => return Err(err),
            },
            Err(err) => return Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn delays_double_and_cap() {
        let backoff = Backoff::new(5, Duration::from_millis(100), Duration::from_millis(350));
        let delays: Vec<u64> = backoff.delays().map(|d| d.as_millis() as u64).collect();
        assert_eq!(delays, vec![100, 200, 350, 350, 350]);
    }

    #[tokio::test]
    async fn succeeds_after_transient_failures() {
        let backoff = Backoff::new(3, Duration::from_millis(1), Duration::from_millis(5));
        let calls = AtomicU32::new(0);

        let result = with_retry(&backoff, |_| true, || async {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            if n < 2 {
                anyhow::bail!("transient failure")
            }
            Ok(n)
        })
        .await;

        assert_eq!(result.unwrap(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn surfaces_last_error_when_exhausted() {
        let backoff = Backoff::new(2, Duration::from_millis(1), Duration::from_millis(5));
        let calls = AtomicU32::new(0);

        let result: Result<()> = with_retry(&backoff, |_| true, || async {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            anyhow::bail!("failure on call {n}")
        })
        .await;

        assert_eq!(result.unwrap_err().to_string(), "failure on call 2");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn rejected_errors_bail_without_retrying() {
        let backoff = Backoff::new(5, Duration::from_millis(1), Duration::from_millis(5));
        let calls = AtomicU32::new(0);

        let result: Result<()> = with_retry(
            &backoff,
            |e: &anyhow::Error| !e.to_string().contains("schema"),
            || async {
                calls.fetch_add(1, Ordering::SeqCst);
                anyhow::bail!("schema mismatch")
            },
        )
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
