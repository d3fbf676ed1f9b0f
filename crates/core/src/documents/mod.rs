//! Asset documents: validation, upload, signed access and deletion.
//!
//! This module provides:
//! - Storage path generation and parsing (`{folder}/{asset_id}/{uuid}.pdf`)
//! - Content-type and size validation
//! - A process-wide signed URL cache
//! - Upload sessions with bounded retry and cancellation
//! - Preview resolution with stale-result discard

mod cache;
mod error;
mod orchestrator;
mod path;
mod preview;
mod service;
mod validator;

pub use cache::{CachePolicy, Clock, ManualClock, SignedAccessEntry, SignedUrlCache, SystemClock};
pub use error::DocumentError;
pub use orchestrator::{
    StoredDocument, UPLOAD_FAILED_FALLBACK, UploadPolicy, UploadProgress, UploadSession,
    UploadState, UploadTarget,
};
pub use path::{AssetId, DocumentFolder, MAX_ASSET_ID_LEN, StoragePath};
pub use preview::{PreviewMediator, PreviewOutcome, PreviewSnapshot, PreviewStatus};
pub use service::DocumentService;
pub use validator::{CandidateFile, DocumentValidator, PDF_CONTENT_TYPE, ValidationError};
