//! In-memory blob store for tests.
//!
//! Counts every call and can be scripted to fail or stall, which is what the
//! retry, cancellation and cache tests need to observe.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use tokio_util::sync::CancellationToken;

use super::deadline::run_with_deadline;
use super::error::{StorageError, StorageResult};
use super::store::BlobStore;
use crate::documents::StoragePath;

/// An object held by [`MemoryBlobStore`].
#[derive(Debug, Clone)]
pub struct MemoryObject {
    /// Object bytes.
    pub data: Bytes,
    /// Content type given at upload.
    pub content_type: String,
}

/// [`BlobStore`] that keeps objects in a map.
#[derive(Debug)]
pub struct MemoryBlobStore {
    bucket: String,
    objects: Mutex<HashMap<String, MemoryObject>>,
    upload_calls: AtomicUsize,
    remove_calls: AtomicUsize,
    sign_calls: AtomicUsize,
    failing_uploads: AtomicUsize,
    stalled_uploads: AtomicUsize,
    failure_message: Mutex<String>,
    fail_removes: AtomicBool,
    fail_signing: AtomicBool,
    upload_delay: Mutex<Option<Duration>>,
    sign_delay: Mutex<Option<Duration>>,
    operation_timeout: Option<Duration>,
}

impl MemoryBlobStore {
    /// Create an empty store for `bucket`.
    #[must_use]
    pub fn new(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            objects: Mutex::new(HashMap::new()),
            upload_calls: AtomicUsize::new(0),
            remove_calls: AtomicUsize::new(0),
            sign_calls: AtomicUsize::new(0),
            failing_uploads: AtomicUsize::new(0),
            stalled_uploads: AtomicUsize::new(0),
            failure_message: Mutex::new("simulated storage outage".to_string()),
            fail_removes: AtomicBool::new(false),
            fail_signing: AtomicBool::new(false),
            upload_delay: Mutex::new(None),
            sign_delay: Mutex::new(None),
            operation_timeout: None,
        }
    }

    /// Bound every call by `after`, as the remote store does.
    #[must_use]
    pub fn with_operation_timeout(mut self, after: Duration) -> Self {
        self.operation_timeout = Some(after);
        self
    }

    /// Make the next `n` uploads fail.
    pub fn fail_next_uploads(&self, n: usize) {
        self.failing_uploads.store(n, Ordering::SeqCst);
    }

    /// Make the next `n` uploads hang until cancelled or timed out.
    pub fn stall_next_uploads(&self, n: usize) {
        self.stalled_uploads.store(n, Ordering::SeqCst);
    }

    /// Make every upload fail.
    pub fn fail_all_uploads(&self) {
        self.failing_uploads.store(usize::MAX, Ordering::SeqCst);
    }

    /// Message carried by scripted upload failures. Empty means no detail.
    pub fn set_failure_message(&self, message: impl Into<String>) {
        *lock(&self.failure_message) = message.into();
    }

    /// Toggle failure of `remove`.
    pub fn fail_removes(&self, fail: bool) {
        self.fail_removes.store(fail, Ordering::SeqCst);
    }

    /// Toggle failure of `issue_signed_url`.
    pub fn fail_signing(&self, fail: bool) {
        self.fail_signing.store(fail, Ordering::SeqCst);
    }

    /// Hold each upload for `delay` before it settles.
    pub fn set_upload_delay(&self, delay: Duration) {
        *lock(&self.upload_delay) = Some(delay);
    }

    /// Hold each signing call for `delay`; `None` removes the hold.
    pub fn set_sign_delay(&self, delay: Option<Duration>) {
        *lock(&self.sign_delay) = delay;
    }

    /// Place an object directly, bypassing counters.
    pub fn insert(&self, path: &StoragePath, data: Bytes) {
        lock(&self.objects).insert(
            path.as_str().to_string(),
            MemoryObject {
                data,
                content_type: "application/pdf".to_string(),
            },
        );
    }

    /// Fetch a stored object.
    #[must_use]
    pub fn get(&self, path: &StoragePath) -> Option<MemoryObject> {
        lock(&self.objects).get(path.as_str()).cloned()
    }

    /// Whether an object exists at `path`.
    #[must_use]
    pub fn contains(&self, path: &StoragePath) -> bool {
        lock(&self.objects).contains_key(path.as_str())
    }

    /// Number of stored objects.
    #[must_use]
    pub fn object_count(&self) -> usize {
        lock(&self.objects).len()
    }

    /// Number of `upload` calls made, including failed ones.
    #[must_use]
    pub fn upload_calls(&self) -> usize {
        self.upload_calls.load(Ordering::SeqCst)
    }

    /// Number of `remove` calls made.
    #[must_use]
    pub fn remove_calls(&self) -> usize {
        self.remove_calls.load(Ordering::SeqCst)
    }

    /// Number of `issue_signed_url` calls made.
    #[must_use]
    pub fn sign_calls(&self) -> usize {
        self.sign_calls.load(Ordering::SeqCst)
    }

    fn take_scripted_failure(&self) -> bool {
        take_one(&self.failing_uploads)
    }

    async fn deadline<T, F>(&self, operation: &'static str, call: F) -> StorageResult<T>
    where
        F: Future<Output = StorageResult<T>>,
    {
        match self.operation_timeout {
            Some(after) => run_with_deadline(operation, after, call).await,
            None => call.await,
        }
    }

    async fn store_upload(
        &self,
        path: &StoragePath,
        data: Bytes,
        content_type: &str,
        cancel: &CancellationToken,
    ) -> StorageResult<()> {
        if take_one(&self.stalled_uploads) {
            cancel.cancelled().await;
            return Err(StorageError::Aborted);
        }

        let delay = *lock(&self.upload_delay);
        if let Some(delay) = delay {
            tokio::select! {
                biased;
                () = cancel.cancelled() => return Err(StorageError::Aborted),
                () = tokio::time::sleep(delay) => {}
            }
        }

        if self.take_scripted_failure() {
            let message = lock(&self.failure_message).clone();
            return Err(StorageError::Operation(message));
        }

        lock(&self.objects).insert(
            path.as_str().to_string(),
            MemoryObject {
                data,
                content_type: content_type.to_string(),
            },
        );
        Ok(())
    }
}

fn take_one(counter: &AtomicUsize) -> bool {
    counter
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| match left {
            0 => None,
            usize::MAX => Some(usize::MAX),
            n => Some(n - 1),
        })
        .is_ok()
}

impl Default for MemoryBlobStore {
    fn default() -> Self {
        Self::new("memory")
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn upload(
        &self,
        path: &StoragePath,
        data: Bytes,
        content_type: &str,
        cancel: &CancellationToken,
    ) -> StorageResult<()> {
        if cancel.is_cancelled() {
            return Err(StorageError::Aborted);
        }
        self.upload_calls.fetch_add(1, Ordering::SeqCst);

        self.deadline("upload", self.store_upload(path, data, content_type, cancel))
            .await
    }

    async fn remove(&self, path: &StoragePath) -> StorageResult<()> {
        self.remove_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_removes.load(Ordering::SeqCst) {
            return Err(StorageError::operation("simulated remove failure"));
        }
        lock(&self.objects).remove(path.as_str());
        Ok(())
    }

    async fn issue_signed_url(&self, path: &StoragePath, ttl: Duration) -> StorageResult<String> {
        let n = self.sign_calls.fetch_add(1, Ordering::SeqCst) + 1;
        self.deadline("presign", async {
            // Existence is checked before signing, like a stat then presign.
            if !self.contains(path) {
                return Err(StorageError::not_found(path.as_str()));
            }
            let delay = *lock(&self.sign_delay);
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            if self.fail_signing.load(Ordering::SeqCst) {
                return Err(StorageError::operation("signing credentials expired"));
            }
            Ok(format!(
                "memory://{}/{}?expires_in={}&sig={n}",
                self.bucket,
                path.as_str(),
                ttl.as_secs()
            ))
        })
        .await
    }

    fn bucket(&self) -> &str {
        &self.bucket
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::documents::{AssetId, DocumentFolder};

    fn path() -> StoragePath {
        StoragePath::generate(
            DocumentFolder::Insurance,
            &AssetId::parse("pump-7").expect("valid asset id"),
        )
    }

    #[tokio::test]
    async fn test_scripted_failures_run_out() {
        let store = MemoryBlobStore::default();
        store.fail_next_uploads(2);
        let cancel = CancellationToken::new();
        let p = path();

        assert!(store.upload(&p, Bytes::new(), "application/pdf", &cancel).await.is_err());
        assert!(store.upload(&p, Bytes::new(), "application/pdf", &cancel).await.is_err());
        assert!(store.upload(&p, Bytes::new(), "application/pdf", &cancel).await.is_ok());
        assert_eq!(store.upload_calls(), 3);
        assert!(store.contains(&p));
    }

    #[tokio::test]
    async fn test_upload_records_content_type() {
        let store = MemoryBlobStore::default();
        let p = path();
        store
            .upload(&p, Bytes::from_static(b"%PDF"), "application/pdf", &CancellationToken::new())
            .await
            .expect("upload succeeds");

        let object = store.get(&p).expect("object stored");
        assert_eq!(object.content_type, "application/pdf");
        assert_eq!(object.data, Bytes::from_static(b"%PDF"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stalled_upload_hits_deadline() {
        let store = MemoryBlobStore::default().with_operation_timeout(Duration::from_secs(5));
        store.stall_next_uploads(1);
        let p = path();

        let err = store
            .upload(&p, Bytes::new(), "application/pdf", &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, StorageError::Timeout { operation: "upload", .. }));
        assert!(!store.contains(&p));
    }

    #[tokio::test]
    async fn test_sign_requires_object() {
        let store = MemoryBlobStore::new("docs");
        let p = path();
        assert!(store.issue_signed_url(&p, Duration::from_secs(60)).await.is_err());

        store.insert(&p, Bytes::from_static(b"%PDF"));
        let url = store
            .issue_signed_url(&p, Duration::from_secs(60))
            .await
            .expect("object exists");
        assert!(url.starts_with("memory://docs/insurance/pump-7/"));
        assert_eq!(store.sign_calls(), 2);
    }
}
