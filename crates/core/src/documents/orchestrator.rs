//! Upload orchestration: validate, upload with bounded retry, report.
//!
//! A session moves through `Idle → Validating → Uploading → {Succeeded |
//! Failed}` and publishes every step on a watch channel. Attempts are strictly
//! sequential and retried immediately. Cancellation ends the run without
//! counting as a failure and without further attempts.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use super::error::DocumentError;
use super::path::{AssetId, DocumentFolder, StoragePath};
use super::validator::{CandidateFile, DocumentValidator};
use crate::storage::{BlobStore, StorageError};
use assetdoc_shared::DocumentSettings;

/// Message used when the last storage error carried no detail.
pub const UPLOAD_FAILED_FALLBACK: &str = "Upload failed after retries";

/// Progress reported once the file passes validation.
const VALIDATED_PERCENT: u8 = 10;
/// Progress added per started attempt.
const ATTEMPT_STEP_PERCENT: u32 = 25;
/// Progress ceiling before the upload actually succeeds.
const MAX_PENDING_PERCENT: u8 = 90;

/// Where an upload goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadTarget {
    /// Owning asset.
    pub asset_id: AssetId,
    /// Destination folder.
    pub folder: DocumentFolder,
}

impl UploadTarget {
    /// Create a target.
    #[must_use]
    pub fn new(asset_id: AssetId, folder: DocumentFolder) -> Self {
        Self { asset_id, folder }
    }
}

/// A document that was written to the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoredDocument {
    /// Where it lives.
    pub storage_path: StoragePath,
    /// Size in bytes.
    pub size: u64,
    /// Owning asset.
    #[serde(skip)]
    pub asset_id: AssetId,
    /// Folder it was filed under.
    #[serde(skip)]
    pub folder: DocumentFolder,
}

/// Observable state of a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadState {
    /// Nothing running.
    Idle,
    /// Checking the selected file.
    Validating,
    /// Attempt `attempt` is in flight.
    Uploading {
        /// 1-based attempt number.
        attempt: u32,
    },
    /// The document was stored.
    Succeeded {
        /// The stored document.
        document: StoredDocument,
    },
    /// Validation failed or attempts ran out.
    Failed {
        /// User-facing reason.
        message: String,
    },
}

impl UploadState {
    /// Validating or uploading.
    #[must_use]
    pub fn is_busy(&self) -> bool {
        matches!(self, Self::Validating | Self::Uploading { .. })
    }
}

/// Snapshot published on the session's watch channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadProgress {
    /// Current state.
    pub state: UploadState,
    /// Rough completion for UI feedback, 0 to 100.
    pub percent: u8,
    /// Attempts started in the current or last run.
    pub attempts: u32,
    /// Name of the selected file, if any.
    pub file_name: Option<String>,
}

impl UploadProgress {
    fn idle() -> Self {
        Self {
            state: UploadState::Idle,
            percent: 0,
            attempts: 0,
            file_name: None,
        }
    }
}

/// Upload policy applied by a session.
#[derive(Debug, Clone, Copy)]
pub struct UploadPolicy {
    /// Content-type and size checks.
    pub validator: DocumentValidator,
    /// Total attempts before giving up. At least 1.
    pub max_attempts: u32,
}

impl UploadPolicy {
    /// Build from the `documents` section of the application config.
    #[must_use]
    pub fn from_settings(settings: &DocumentSettings) -> Self {
        Self {
            validator: DocumentValidator::new(settings.max_file_size),
            max_attempts: settings.max_upload_attempts,
        }
    }
}

impl Default for UploadPolicy {
    fn default() -> Self {
        Self::from_settings(&DocumentSettings::default())
    }
}

/// Progress shown when attempt `attempt` starts.
fn attempt_percent(attempt: u32) -> u8 {
    let step = ATTEMPT_STEP_PERCENT.saturating_mul(attempt);
    let percent = u32::from(VALIDATED_PERCENT).saturating_add(step);
    u8::try_from(percent)
        .unwrap_or(MAX_PENDING_PERCENT)
        .min(MAX_PENDING_PERCENT)
}

/// One upload form bound to an asset and folder.
///
/// Methods take `&self` so the session can be shared between the task
/// running the upload and the ones observing or resetting it.
pub struct UploadSession {
    store: Arc<dyn BlobStore>,
    policy: UploadPolicy,
    target: UploadTarget,
    file: Mutex<Option<CandidateFile>>,
    progress: watch::Sender<UploadProgress>,
}

impl UploadSession {
    /// Open a session for `target`. The session starts `Idle` with no file.
    #[must_use]
    pub fn open(store: Arc<dyn BlobStore>, policy: UploadPolicy, target: UploadTarget) -> Self {
        let policy = UploadPolicy {
            max_attempts: policy.max_attempts.max(1),
            ..policy
        };
        let (progress, _) = watch::channel(UploadProgress::idle());

        Self {
            store,
            policy,
            target,
            file: Mutex::new(None),
            progress,
        }
    }

    /// Target this session uploads to.
    #[must_use]
    pub fn target(&self) -> &UploadTarget {
        &self.target
    }

    /// Receive every progress change.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<UploadProgress> {
        self.progress.subscribe()
    }

    /// Current progress.
    #[must_use]
    pub fn snapshot(&self) -> UploadProgress {
        self.progress.borrow().clone()
    }

    /// Select the file to upload, replacing any previous selection.
    ///
    /// A finished run is cleared back to `Idle`.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentError::UploadInProgress`] while a run is active.
    pub fn select(&self, file: CandidateFile) -> Result<(), DocumentError> {
        let mut busy = false;
        self.progress.send_if_modified(|p| {
            if p.state.is_busy() {
                busy = true;
                return false;
            }
            *p = UploadProgress {
                file_name: Some(file.file_name.clone()),
                ..UploadProgress::idle()
            };
            *lock(&self.file) = Some(file);
            true
        });

        if busy {
            return Err(DocumentError::UploadInProgress);
        }
        Ok(())
    }

    /// Return to `Idle`, clearing the selected file and the last outcome.
    ///
    /// Only allowed from `Failed` or when a file is selected; returns whether
    /// anything was reset.
    pub fn reset(&self) -> bool {
        self.progress.send_if_modified(|p| {
            let has_file = lock(&self.file).is_some();
            let resettable = matches!(p.state, UploadState::Failed { .. })
                || (has_file && !p.state.is_busy());
            if !resettable {
                return false;
            }
            *lock(&self.file) = None;
            *p = UploadProgress::idle();
            true
        })
    }

    /// Validate and upload the selected file.
    ///
    /// # Errors
    ///
    /// - [`DocumentError::NoFileSelected`] with nothing selected
    /// - [`DocumentError::UploadInProgress`] when a run is already active
    /// - [`DocumentError::Validation`] when the file fails policy
    /// - [`DocumentError::Aborted`] when `cancel` fires before an attempt settles
    /// - [`DocumentError::UploadFailed`] once attempts are exhausted
    pub async fn start(&self, cancel: &CancellationToken) -> Result<StoredDocument, DocumentError> {
        let file = self.begin()?;

        if let Err(e) = self.policy.validator.validate(&file) {
            tracing::info!(
                asset_id = %self.target.asset_id,
                folder = %self.target.folder,
                reason = %e,
                "Document rejected by validation"
            );
            self.progress.send_modify(|p| {
                p.state = UploadState::Failed {
                    message: e.to_string(),
                };
            });
            return Err(e.into());
        }

        self.progress.send_modify(|p| p.percent = VALIDATED_PERCENT);

        let path = StoragePath::generate(self.target.folder, &self.target.asset_id);
        let size = file.size();
        let mut last_error: Option<StorageError> = None;

        for attempt in 1..=self.policy.max_attempts {
            if cancel.is_cancelled() {
                return Err(self.abort(attempt - 1));
            }

            self.progress.send_modify(|p| {
                p.state = UploadState::Uploading { attempt };
                p.attempts = attempt;
                p.percent = p.percent.max(attempt_percent(attempt));
            });

            match self
                .store
                .upload(&path, file.data.clone(), &file.content_type, cancel)
                .await
            {
                Ok(()) => {
                    let document = StoredDocument {
                        storage_path: path,
                        size,
                        asset_id: self.target.asset_id.clone(),
                        folder: self.target.folder,
                    };
                    tracing::info!(
                        storage_path = %document.storage_path,
                        bucket = self.store.bucket(),
                        size,
                        attempts = attempt,
                        "Document upload succeeded"
                    );
                    self.progress.send_modify(|p| {
                        *lock(&self.file) = None;
                        p.state = UploadState::Succeeded {
                            document: document.clone(),
                        };
                        p.percent = 100;
                        p.file_name = None;
                    });
                    return Ok(document);
                }
                Err(StorageError::Aborted) => return Err(self.abort(attempt)),
                Err(e) => {
                    tracing::warn!(
                        storage_path = %path,
                        attempt,
                        max_attempts = self.policy.max_attempts,
                        error = %e,
                        "Upload attempt failed"
                    );
                    last_error = Some(e);
                }
            }
        }

        let message = match last_error {
            Some(e) if e.has_message() => e.to_string(),
            _ => UPLOAD_FAILED_FALLBACK.to_string(),
        };
        let attempts = self.policy.max_attempts;
        tracing::error!(
            storage_path = %path,
            attempts,
            error = %message,
            "Upload failed after retries"
        );
        self.progress.send_modify(|p| {
            p.state = UploadState::Failed {
                message: message.clone(),
            };
        });

        Err(DocumentError::UploadFailed { message, attempts })
    }

    /// Claim the session for a run and take a copy of the selected file.
    fn begin(&self) -> Result<CandidateFile, DocumentError> {
        let mut outcome = Err(DocumentError::NoFileSelected);
        self.progress.send_if_modified(|p| {
            if p.state.is_busy() {
                outcome = Err(DocumentError::UploadInProgress);
                return false;
            }
            let Some(file) = lock(&self.file).clone() else {
                return false;
            };
            p.state = UploadState::Validating;
            p.percent = 0;
            p.attempts = 0;
            outcome = Ok(file);
            true
        });
        outcome
    }

    /// Back to `Idle` with the file kept and the attempt counter frozen.
    fn abort(&self, attempts: u32) -> DocumentError {
        tracing::info!(
            asset_id = %self.target.asset_id,
            folder = %self.target.folder,
            attempts,
            "Upload aborted by caller"
        );
        self.progress.send_modify(|p| {
            p.state = UploadState::Idle;
            p.percent = 0;
            p.attempts = attempts;
        });
        DocumentError::Aborted
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}


#[cfg(test)]
mod property_tests {
    use super::*;
    use crate::documents::validator::PDF_CONTENT_TYPE;
    use crate::storage::MemoryBlobStore;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn prop_attempts_never_exceed_ceiling(failures in 0usize..8, max_attempts in 1u32..6) {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .expect("runtime");

            let store = Arc::new(MemoryBlobStore::default());
            store.fail_next_uploads(failures);
            let policy = UploadPolicy { max_attempts, ..UploadPolicy::default() };
            let target = UploadTarget::new(
                AssetId::parse("A1").expect("valid asset id"),
                DocumentFolder::Warranty,
            );
            let session = UploadSession::open(store.clone(), policy, target);
            session
                .select(CandidateFile::new("f.pdf", PDF_CONTENT_TYPE, vec![1u8; 64]))
                .expect("idle session");

            let result = runtime.block_on(session.start(&CancellationToken::new()));

            let ceiling = max_attempts as usize;
            prop_assert_eq!(store.upload_calls(), (failures + 1).min(ceiling));
            prop_assert_eq!(result.is_ok(), failures < ceiling);
        }
    }
}
