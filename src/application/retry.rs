use crate::error::{BankError, Result};
use std::future::Future;
use std::time::Duration;

/// Runs one store call under `timeout`, turning expiry into `StoreUnavailable`.
pub(crate) async fn bounded<T, F>(timeout: Duration, call: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(timeout, call).await {
        Ok(result) => result,
        Err(_) => Err(BankError::StoreUnavailable(format!(
            "store call exceeded {}ms",
            timeout.as_millis()
        ))),
    }
}

/// Re-runs `attempt` while it fails with `StoreConflict`, at most `max_attempts` times.
///
/// Each attempt must reload the state it validates; the closure is called
/// afresh so nothing read by an earlier attempt survives into the next one.
pub(crate) async fn retry_on_conflict<T, F, Fut>(
    operation: &'static str,
    max_attempts: u32,
    mut attempt: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let max_attempts = max_attempts.max(1);
    let mut tries = 1;
    loop {
        match attempt().await {
            Err(e) if e.is_conflict() && tries < max_attempts => {
                tracing::warn!(operation, attempt = tries, "conflicting write, retrying");
                tries += 1;
            }
            Err(e) if e.is_conflict() => {
                tracing::warn!(operation, attempts = tries, "giving up after repeated conflicts");
                return Err(e);
            }
            other => return other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn test_conflicts_are_retried_then_surfaced() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result: Result<()> = retry_on_conflict("test", 3, move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(BankError::StoreConflict)
        })
        .await;

        assert!(matches!(result, Err(BankError::StoreConflict)));
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_other_errors_are_not_retried() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result: Result<()> = retry_on_conflict("test", 3, move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(BankError::InsufficientFunds)
        })
        .await;

        assert!(matches!(result, Err(BankError::InsufficientFunds)));
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_success_after_conflict() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result = retry_on_conflict("test", 3, move || async move {
            if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(BankError::StoreConflict)
            } else {
                Ok(7)
            }
        })
        .await;
        assert_eq!(result.unwrap(), 7);
    }

    #[tokio::test]
    async fn test_bounded_times_out() {
        let result: Result<()> = bounded(Duration::from_millis(10), async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        })
        .await;
        assert!(matches!(result, Err(BankError::StoreUnavailable(_))));
    }
}
