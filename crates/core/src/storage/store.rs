//! The blob store abstraction the document layer talks to.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use tokio_util::sync::CancellationToken;

use super::error::StorageResult;
use crate::documents::StoragePath;

/// Remote object store holding the private document bucket.
///
/// Implementations never retry; retry policy belongs to the caller.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Write `data` at `path`.
    ///
    /// Paths are generated fresh per upload, so no overwrite check is made.
    /// If `cancel` fires before the call settles the result is
    /// [`StorageError::Aborted`](super::StorageError::Aborted).
    async fn upload(
        &self,
        path: &StoragePath,
        data: Bytes,
        content_type: &str,
        cancel: &CancellationToken,
    ) -> StorageResult<()>;

    /// Delete the object at `path`.
    async fn remove(&self, path: &StoragePath) -> StorageResult<()>;

    /// Issue a capability URL granting read access for `ttl`.
    async fn issue_signed_url(&self, path: &StoragePath, ttl: Duration) -> StorageResult<String>;

    /// Bucket or container the store writes to.
    fn bucket(&self) -> &str;
}
