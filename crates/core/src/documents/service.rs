//! Document service: the single entry point used by the HTTP layer.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use super::cache::{CachePolicy, SignedAccessEntry, SignedUrlCache};
use super::error::DocumentError;
use super::orchestrator::{StoredDocument, UploadPolicy, UploadSession, UploadTarget};
use super::path::StoragePath;
use super::preview::PreviewMediator;
use super::validator::CandidateFile;
use crate::storage::BlobStore;
use assetdoc_shared::DocumentSettings;

/// Document service for uploading, viewing and deleting asset documents.
///
/// Owns the store and the process-wide signed URL cache.
pub struct DocumentService {
    store: Arc<dyn BlobStore>,
    cache: Arc<SignedUrlCache>,
    policy: UploadPolicy,
}

impl DocumentService {
    /// Create a service with a fresh cache built from `settings`.
    #[must_use]
    pub fn new(store: Arc<dyn BlobStore>, settings: &DocumentSettings) -> Self {
        let cache = Arc::new(SignedUrlCache::new(
            store.clone(),
            CachePolicy::from_settings(settings),
        ));
        Self::with_cache(store, cache, UploadPolicy::from_settings(settings))
    }

    /// Create a service around an existing cache.
    #[must_use]
    pub fn with_cache(
        store: Arc<dyn BlobStore>,
        cache: Arc<SignedUrlCache>,
        policy: UploadPolicy,
    ) -> Self {
        Self {
            store,
            cache,
            policy,
        }
    }

    /// Open an upload session for `target`.
    #[must_use]
    pub fn open_session(&self, target: UploadTarget) -> UploadSession {
        UploadSession::open(self.store.clone(), self.policy, target)
    }

    /// Validate and upload `file` in one call.
    ///
    /// # Errors
    ///
    /// See [`UploadSession::start`].
    pub async fn upload(
        &self,
        target: UploadTarget,
        file: CandidateFile,
        cancel: &CancellationToken,
    ) -> Result<StoredDocument, DocumentError> {
        let session = self.open_session(target);
        session.select(file)?;
        session.start(cancel).await
    }

    /// Live signed URL for `path`, from cache when possible.
    ///
    /// # Errors
    ///
    /// Returns an error if the store refuses to issue a URL.
    pub async fn signed_url(&self, path: &StoragePath) -> Result<SignedAccessEntry, DocumentError> {
        Ok(self.cache.get(path).await?)
    }

    /// Remove the document and evict its cached URL.
    ///
    /// On failure the cache entry is left alone, since the object may still
    /// exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails to delete the object.
    pub async fn delete(&self, path: &StoragePath) -> Result<(), DocumentError> {
        self.store.remove(path).await?;
        self.cache.invalidate(path).await;
        tracing::info!(storage_path = %path, "Document deleted");
        Ok(())
    }

    /// A new preview mediator for one consumer.
    #[must_use]
    pub fn preview(&self) -> PreviewMediator {
        PreviewMediator::new(self.cache.clone())
    }

    /// The shared cache.
    #[must_use]
    pub fn cache(&self) -> &Arc<SignedUrlCache> {
        &self.cache
    }

    /// Active upload policy.
    #[must_use]
    pub fn policy(&self) -> &UploadPolicy {
        &self.policy
    }

    /// Bucket documents are written to.
    #[must_use]
    pub fn bucket(&self) -> &str {
        self.store.bucket()
    }
}
