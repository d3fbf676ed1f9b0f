//! Document operation errors.

use thiserror::Error;

use super::validator::ValidationError;
use crate::storage::StorageError;
use assetdoc_shared::AppError;

/// Document operation errors.
#[derive(Debug, Error)]
pub enum DocumentError {
    /// Candidate file failed validation. Never reaches the network.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The caller cancelled before the remote call settled.
    #[error("upload aborted")]
    Aborted,

    /// Remote storage failure.
    #[error("storage error: {0}")]
    Storage(StorageError),

    /// Attempts exhausted. Carries the last error's message.
    #[error("{message}")]
    UploadFailed {
        /// User-facing message.
        message: String,
        /// Attempts made.
        attempts: u32,
    },

    /// An upload is already running for this session.
    #[error("an upload is already in progress")]
    UploadInProgress,

    /// `start` was called with no file selected.
    #[error("no file selected")]
    NoFileSelected,
}

impl From<StorageError> for DocumentError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::Aborted => Self::Aborted,
            other => Self::Storage(other),
        }
    }
}

impl From<DocumentError> for AppError {
    fn from(err: DocumentError) -> Self {
        match err {
            DocumentError::Validation(e) => Self::Validation(e.to_string()),
            DocumentError::NoFileSelected => Self::Validation(err.to_string()),
            DocumentError::Aborted => Self::Cancelled(err.to_string()),
            DocumentError::UploadInProgress => Self::Conflict(err.to_string()),
            DocumentError::UploadFailed { message, .. } => Self::ExternalService(message),
            DocumentError::Storage(e) => e.into(),
        }
    }
}

impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound { .. } => Self::NotFound(err.to_string()),
            StorageError::InvalidKey(_) => Self::Validation(err.to_string()),
            StorageError::Timeout { .. } => Self::Timeout(err.to_string()),
            StorageError::Aborted => Self::Cancelled(err.to_string()),
            StorageError::Configuration(_) | StorageError::PresignNotSupported => {
                Self::Internal(err.to_string())
            }
            StorageError::Operation(_) => Self::ExternalService(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_aborted_storage_error_maps_to_aborted() {
        assert!(matches!(
            DocumentError::from(StorageError::Aborted),
            DocumentError::Aborted
        ));
        assert!(matches!(
            DocumentError::from(StorageError::operation("boom")),
            DocumentError::Storage(_)
        ));
    }

    #[test]
    fn test_app_error_mapping() {
        let validation = DocumentError::Validation(ValidationError::InvalidContentType {
            content_type: "image/png".into(),
        });
        assert_eq!(AppError::from(validation).status_code(), 400);
        assert_eq!(AppError::from(DocumentError::Aborted).status_code(), 499);
        assert_eq!(
            AppError::from(DocumentError::UploadInProgress).status_code(),
            409
        );

        let missing = DocumentError::Storage(StorageError::not_found("documents/A1/x.pdf"));
        assert_eq!(AppError::from(missing).status_code(), 404);

        let slow = StorageError::timeout("presign", Duration::from_secs(30));
        assert_eq!(AppError::from(slow).status_code(), 504);
    }

    #[test]
    fn test_upload_failed_keeps_message() {
        let err = DocumentError::UploadFailed {
            message: "Upload failed after retries".into(),
            attempts: 3,
        };
        assert_eq!(err.to_string(), "Upload failed after retries");
        assert_eq!(AppError::from(err).message(), "Upload failed after retries");
    }
}
