use std::future::Future;

use crate::config::RetryConfig;
use crate::error::EngineError;

/// Runs `f` until it succeeds, fails with a non-retryable error, or
/// `cfg.max_retries` retries have been spent.
pub async fn with_retry<T, F>(cfg: &RetryConfig, op: &str, mut f: F) -> Result<T, EngineError>
where
    F: FnMut() -> Result<T, EngineError>,
{
    with_retry_async(cfg, op, || std::future::ready(f())).await
}

/// [`with_retry`] for attempts that await.
pub async fn with_retry_async<T, F, Fut>(
    cfg: &RetryConfig,
    op: &str,
    mut f: F,
) -> Result<T, EngineError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, EngineError>>,
{
    let mut attempt = 0;
    loop {
        match f().await {
            Err(e) if e.is_retryable() && attempt < cfg.max_retries => {
                attempt += 1;
                let backoff = cfg.delay(attempt);
                tracing::warn!(op, attempt, ?backoff, error = %e, "engine: retrying");
                tokio::time::sleep(backoff).await;
            }
            result => return result,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fast(max_retries: u32) -> RetryConfig {
        RetryConfig {
            max_retries,
            base_delay_ms: 1,
        }
    }

    #[tokio::test]
    async fn recovers_from_transient_failure() {
        let mut calls = 0;
        let out = with_retry(&fast(3), "test", || {
            calls += 1;
            if calls < 3 {
                Err(EngineError::CollectionUnavailable("busy".into()))
            } else {
                Ok(calls)
            }
        })
        .await
        .unwrap();
        assert_eq!(out, 3);
    }

    #[tokio::test]
    async fn gives_up_after_budget() {
        let mut calls = 0;
        let err = with_retry(&fast(2), "test", || -> Result<(), _> {
            calls += 1;
            Err(EngineError::CollectionUnavailable("down".into()))
        })
        .await
        .unwrap_err();
        assert!(matches!(err, EngineError::CollectionUnavailable(_)));
        assert_eq!(calls, 3);
    }

    #[tokio::test]
    async fn permanent_errors_are_not_retried() {
        let mut calls = 0;
        let err = with_retry(&fast(5), "test", || -> Result<(), _> {
            calls += 1;
            Err(EngineError::DuplicateId(1))
        })
        .await
        .unwrap_err();
        assert!(matches!(err, EngineError::DuplicateId(1)));
        assert_eq!(calls, 1);
    }

    #[tokio::test]
    async fn awaiting_attempts_are_retried() {
        let calls = std::sync::atomic::AtomicU32::new(0);
        let out = with_retry_async(&fast(3), "test", || async {
            let n = calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst) + 1;
            tokio::task::yield_now().await;
            if n < 2 {
                Err(EngineError::CollectionUnavailable("busy".into()))
            } else {
                Ok(n)
            }
        })
        .await
        .unwrap();
        assert_eq!(out, 2);
    }
}
