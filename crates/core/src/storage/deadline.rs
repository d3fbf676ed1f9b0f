//! Per-call deadlines for blob store operations.

use std::future::Future;
use std::time::Duration;

use super::error::{StorageError, StorageResult};

/// Run `call` and turn an elapsed deadline into [`StorageError::Timeout`].
pub(crate) async fn run_with_deadline<T, F>(
    operation: &'static str,
    after: Duration,
    call: F,
) -> StorageResult<T>
where
    F: Future<Output = StorageResult<T>>,
{
    tokio::time::timeout(after, call)
        .await
        .unwrap_or_else(|_| {
            tracing::warn!(operation, after_ms = after.as_millis(), "Storage call timed out");
            Err(StorageError::timeout(operation, after))
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_stalled_call_times_out() {
        let err = run_with_deadline("stat", Duration::from_secs(5), async {
            std::future::pending::<StorageResult<()>>().await
        })
        .await
        .unwrap_err();

        assert!(matches!(
            err,
            StorageError::Timeout { operation: "stat", after } if after == Duration::from_secs(5)
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_call_settling_in_time_keeps_its_result() {
        let ok = run_with_deadline("upload", Duration::from_secs(5), async {
            tokio::time::sleep(Duration::from_secs(4)).await;
            Ok(7)
        })
        .await;
        assert_eq!(ok.expect("settles before deadline"), 7);

        let err = run_with_deadline("remove", Duration::from_secs(5), async {
            Err::<(), _>(StorageError::not_found("documents/A1/x.pdf"))
        })
        .await
        .unwrap_err();
        assert!(matches!(err, StorageError::NotFound { .. }));
    }
}
