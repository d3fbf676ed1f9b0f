//! Blob store backed by Apache OpenDAL.

use std::future::Future;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use bytes::Bytes;
use opendal::{Operator, services};
use tokio_util::sync::CancellationToken;

use super::config::StorageConfig;
use super::deadline::run_with_deadline;
use super::error::{StorageError, StorageResult};
use super::store::BlobStore;
use crate::documents::StoragePath;
use assetdoc_shared::config::StorageProvider;

/// [`BlobStore`] over an OpenDAL operator.
pub struct OpendalBlobStore {
    operator: Operator,
    config: StorageConfig,
}

impl OpendalBlobStore {
    /// Create a new blob store from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage provider cannot be initialized.
    pub fn from_config(config: StorageConfig) -> Result<Self, StorageError> {
        let operator = Self::create_operator(&config.provider)?;
        Ok(Self { operator, config })
    }

    /// Create OpenDAL operator from provider config.
    fn create_operator(provider: &StorageProvider) -> Result<Operator, StorageError> {
        let operator = match provider {
            StorageProvider::S3 {
                endpoint,
                bucket,
                access_key_id,
                secret_access_key,
                region,
            } => {
                let builder = services::S3::default()
                    .endpoint(endpoint)
                    .bucket(bucket)
                    .access_key_id(access_key_id)
                    .secret_access_key(secret_access_key)
                    .region(region);
                Operator::new(builder)
                    .map_err(|e| StorageError::configuration(e.to_string()))?
                    .finish()
            }
            StorageProvider::AzureBlob {
                account,
                access_key,
                container,
            } => {
                let builder = services::Azblob::default()
                    .account_name(account)
                    .account_key(access_key)
                    .container(container);
                Operator::new(builder)
                    .map_err(|e| StorageError::configuration(e.to_string()))?
                    .finish()
            }
            StorageProvider::LocalFs { root } => {
                let root = root
                    .to_str()
                    .ok_or_else(|| StorageError::configuration("invalid path"))?;
                Operator::new(services::Fs::default().root(root))
                    .map_err(|e| StorageError::configuration(e.to_string()))?
                    .finish()
            }
        };

        Ok(operator)
    }

    /// Get the storage provider name.
    #[must_use]
    pub fn provider_name(&self) -> &'static str {
        self.config.provider.name()
    }

    /// Get the configuration.
    #[must_use]
    pub fn config(&self) -> &StorageConfig {
        &self.config
    }

    /// Run one remote call under the configured deadline.
    async fn with_deadline<T, F>(
        &self,
        operation: &'static str,
        key: &str,
        call: F,
    ) -> StorageResult<T>
    where
        F: Future<Output = opendal::Result<T>>,
    {
        run_with_deadline(operation, self.config.operation_timeout, async {
            call.await.map_err(|e| StorageError::from_opendal(&e, key))
        })
        .await
    }

    /// Remove whatever an aborted write may have left at `key`.
    async fn discard_aborted_write(&self, key: &str) {
        match self.with_deadline("remove", key, self.operator.delete(key)).await {
            Ok(()) => tracing::debug!(storage_path = %key, "Aborted write discarded"),
            Err(e) => tracing::warn!(
                storage_path = %key,
                error = %e,
                "Failed to discard aborted write"
            ),
        }
    }
}

#[async_trait]
impl BlobStore for OpendalBlobStore {
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

        let key = path.as_str();
        let size = data.len();
        let start = Instant::now();
        let with_content_type = self
            .operator
            .info()
            .full_capability()
            .write_with_content_type;

        let write = async {
            if with_content_type {
                self.operator
                    .write_with(key, data)
                    .content_type(content_type)
                    .await
                    .map(|_| ())
            } else {
                self.operator.write(key, data).await.map(|_| ())
            }
        };

        let result = tokio::select! {
            biased;
            () = cancel.cancelled() => Err(StorageError::Aborted),
            result = self.with_deadline("upload", key, write) => result,
        };

        // The write may have landed in the same poll that saw the cancellation.
        if matches!(result, Err(StorageError::Aborted)) {
            self.discard_aborted_write(key).await;
        }

        match &result {
            Ok(()) => tracing::info!(
                storage_path = %key,
                size,
                provider = self.provider_name(),
                duration_ms = start.elapsed().as_millis(),
                "Document uploaded"
            ),
            Err(StorageError::Aborted) => {
                tracing::info!(storage_path = %key, "Document upload aborted");
            }
            Err(e) => tracing::warn!(
                storage_path = %key,
                error = %e,
                duration_ms = start.elapsed().as_millis(),
                "Document upload failed"
            ),
        }

        result
    }

    async fn remove(&self, path: &StoragePath) -> StorageResult<()> {
        let key = path.as_str();
        self.with_deadline("remove", key, self.operator.delete(key))
            .await
            .inspect(|_| tracing::info!(storage_path = %key, "Document removed"))
            .inspect_err(|e| tracing::warn!(storage_path = %key, error = %e, "Remove failed"))
    }

    async fn issue_signed_url(&self, path: &StoragePath, ttl: Duration) -> StorageResult<String> {
        let key = path.as_str();

        // Presigning is local for most backends; stat makes a missing object fail here.
        self.with_deadline("stat", key, self.operator.stat(key)).await?;
        let presigned = self
            .with_deadline("presign", key, self.operator.presign_read(key, ttl))
            .await?;

        tracing::debug!(storage_path = %key, ttl_secs = ttl.as_secs(), "Signed URL issued");
        Ok(presigned.uri().to_string())
    }

    fn bucket(&self) -> &str {
        self.config.provider.bucket()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::documents::{AssetId, DocumentFolder};

    fn temp_store() -> (OpendalBlobStore, std::path::PathBuf) {
        let root = std::env::temp_dir().join(format!("assetdoc-test-{}", uuid::Uuid::new_v4()));
        let config = StorageConfig::new(StorageProvider::local_fs(&root));
        let store = OpendalBlobStore::from_config(config).expect("should create store");
        (store, root)
    }

    fn sample_path() -> StoragePath {
        let asset = AssetId::parse("A1").expect("valid asset id");
        StoragePath::generate(DocumentFolder::Documents, &asset)
    }

    #[test]
    fn test_from_config_local() {
        let (store, _) = temp_store();
        assert_eq!(store.provider_name(), "local");
    }

    #[tokio::test]
    async fn test_upload_then_remove_local() {
        let (store, root) = temp_store();
        let path = sample_path();
        let cancel = CancellationToken::new();

        store
            .upload(&path, Bytes::from_static(b"%PDF-1.7"), "application/pdf", &cancel)
            .await
            .expect("upload should succeed");
        assert!(root.join(path.as_str()).exists());

        store.remove(&path).await.expect("remove should succeed");
        assert!(!root.join(path.as_str()).exists());

        let _ = std::fs::remove_dir_all(root);
    }

    #[tokio::test]
    async fn test_upload_cancelled_before_call() {
        let (store, root) = temp_store();
        let path = sample_path();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = store
            .upload(&path, Bytes::from_static(b"%PDF"), "application/pdf", &cancel)
            .await
            .unwrap_err();
        assert!(err.is_aborted());
        assert!(!root.join(path.as_str()).exists());
    }

    #[tokio::test]
    async fn test_aborted_upload_leaves_no_object() {
        let (store, root) = temp_store();

        for _ in 0..8 {
            let path = sample_path();
            let cancel = CancellationToken::new();
            let canceller = {
                let cancel = cancel.clone();
                tokio::spawn(async move { cancel.cancel() })
            };

            let result = store
                .upload(&path, Bytes::from_static(b"%PDF"), "application/pdf", &cancel)
                .await;
            canceller.await.expect("canceller joins");

            match result {
                Ok(()) => assert!(root.join(path.as_str()).exists()),
                Err(e) => {
                    assert!(e.is_aborted());
                    assert!(!root.join(path.as_str()).exists());
                }
            }
        }

        let _ = std::fs::remove_dir_all(root);
    }

    #[tokio::test]
    async fn test_issue_signed_url_missing_object() {
        let (store, _) = temp_store();
        let err = store
            .issue_signed_url(&sample_path(), Duration::from_secs(3600))
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_issue_signed_url_unsupported_on_fs() {
        let (store, root) = temp_store();
        let path = sample_path();
        store
            .upload(
                &path,
                Bytes::from_static(b"%PDF"),
                "application/pdf",
                &CancellationToken::new(),
            )
            .await
            .expect("upload should succeed");

        let err = store
            .issue_signed_url(&path, Duration::from_secs(3600))
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::PresignNotSupported));

        let _ = std::fs::remove_dir_all(root);
    }
}
