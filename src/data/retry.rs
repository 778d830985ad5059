use std::time::Duration;
use tokio_retry::strategy::{jitter, ExponentialBackoff};
use tokio_retry::RetryIf;

use super::{DataError, DataResult};

/// Retry a fallible async operation with exponential backoff and jitter.
/// Only errors classified retryable by [`DataError::is_retryable`] are
/// retried; everything else surfaces immediately.
pub async fn retry_with_backoff<F, Fut, T>(operation: F, max_attempts: usize) -> DataResult<T>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = DataResult<T>>,
{
    let retry_strategy = ExponentialBackoff::from_millis(100)
        .max_delay(Duration::from_secs(10))
        .map(jitter)
        .take(max_attempts);

    RetryIf::spawn(retry_strategy, operation, |e: &DataError| {
        let retryable = e.is_retryable();
        if retryable {
            tracing::warn!("Retryable error: {}", e);
        } else {
            tracing::error!("Non-retryable error: {}", e);
        }
        retryable
    })
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_gives_up_on_non_retryable() {
        let attempts = AtomicUsize::new(0);
        let result: DataResult<()> = retry_with_backoff(
            || async {
                attempts.fetch_add(1, Ordering::SeqCst);
                Err(DataError::InvalidSymbol("bad".into()))
            },
            3,
        )
        .await;

        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_retries_until_success() {
        let attempts = AtomicUsize::new(0);
        let result = retry_with_backoff(
            || async {
                let n = attempts.fetch_add(1, Ordering::SeqCst);
                if n < 2 {
                    Err(DataError::Timeout { timeout_seconds: 1 })
                } else {
                    Ok(n)
                }
            },
            5,
        )
        .await;

        assert_eq!(result.expect("should succeed on third attempt"), 2);
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }
}
