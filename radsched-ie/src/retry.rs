use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::error::IeError;

/// Bounded exponential backoff for IE transport calls: up to 3 attempts by
/// default, with 2s/4s/8s delays between them. After exhaustion the
/// operation fails.
///
/// `op` is retried up to `attempts` times; each failed attempt other than
/// the last sleeps `base_delay * 2^attempt` before trying again. A
/// [`IeError::Terminal`] from `op` short-circuits immediately — retrying a
/// definitive rejection wastes a round trip and a retry slot for nothing.
pub async fn retry_with_backoff<T, F, Fut>(
    attempts: u32,
    base_delay: Duration,
    mut op: F,
) -> Result<T, IeError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, IeError>>,
{
    let mut last_err = IeError::Transient("no attempts made".to_string());
    for attempt in 0..attempts.max(1) {
        match op().await {
            Ok(value) => return Ok(value),
            Err(IeError::Terminal(msg)) => return Err(IeError::Terminal(msg)),
            Err(e @ IeError::Transient(_)) => {
                last_err = e;
                if attempt + 1 < attempts {
                    let delay = base_delay * 2u32.pow(attempt);
                    warn!(attempt, delay_ms = delay.as_millis() as u64, "IE call failed, retrying");
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
    Err(last_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn succeeds_on_first_try_without_sleeping() {
        let calls = AtomicU32::new(0);
        let result: Result<u32, IeError> = retry_with_backoff(3, Duration::from_millis(1), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Ok(42) }
        })
        .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn retries_transient_failures_up_to_the_limit() {
        let calls = AtomicU32::new(0);
        let result: Result<u32, IeError> = retry_with_backoff(3, Duration::from_millis(1), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(IeError::Transient("boom".into())) }
        })
        .await;
        assert!(matches!(result, Err(IeError::Transient(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn terminal_failure_short_circuits_without_retrying() {
        let calls = AtomicU32::new(0);
        let result: Result<u32, IeError> = retry_with_backoff(3, Duration::from_millis(1), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(IeError::Terminal("rejected".into())) }
        })
        .await;
        assert!(matches!(result, Err(IeError::Terminal(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn succeeds_after_transient_failures_within_budget() {
        let calls = AtomicU32::new(0);
        let result: Result<u32, IeError> = retry_with_backoff(3, Duration::from_millis(1), || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(IeError::Transient("not yet".into()))
                } else {
                    Ok(7)
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
