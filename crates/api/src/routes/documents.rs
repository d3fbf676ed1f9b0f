//! Asset document routes: upload, signed access and deletion.

use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, Multipart, Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get, post},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use super::error_response;
use crate::AppState;
use assetdoc_core::documents::{
    AssetId, CandidateFile, DocumentFolder, StoragePath, UploadTarget,
};
use assetdoc_shared::AppError;

/// Headroom for multipart framing on top of the file size limit.
const MULTIPART_OVERHEAD: usize = 1024 * 1024;

/// Multipart field carrying the file.
const FILE_FIELD: &str = "file";

/// Creates the document routes.
pub fn routes(state: &AppState) -> Router<AppState> {
    let max_size = state.documents.policy().validator.max_size();
    let body_limit = usize::try_from(max_size)
        .unwrap_or(usize::MAX)
        .saturating_add(MULTIPART_OVERHEAD);

    Router::new()
        .route(
            "/assets/{asset_id}/documents/{folder}",
            post(upload_document).layer(DefaultBodyLimit::max(body_limit)),
        )
        .route("/documents/signed-url", get(get_signed_url))
        .route("/documents", delete(delete_document))
}

// ============================================================================
// Request/Response Types
// ============================================================================

/// Response for a stored document.
#[derive(Debug, Serialize, Deserialize)]
pub struct UploadResponse {
    /// `{folder}/{asset_id}/{uuid}.pdf`.
    pub storage_path: String,
    /// Size in bytes.
    pub size: u64,
}

/// Query selecting a stored document.
#[derive(Debug, Deserialize)]
pub struct DocumentPathQuery {
    /// Storage path returned by the upload.
    pub path: String,
}

/// Response for a signed URL.
#[derive(Debug, Serialize, Deserialize)]
pub struct SignedUrlResponse {
    /// Time-limited read URL.
    pub url: String,
    /// When the URL stops being served from cache.
    pub expires_at: DateTime<Utc>,
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Pull the `file` field out of the multipart body.
async fn read_file_field(multipart: &mut Multipart) -> Result<CandidateFile, AppError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(e.body_text()))?
    {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }

        let file_name = field.file_name().unwrap_or_default().to_string();
        let content_type = field.content_type().unwrap_or_default().to_string();
        let data = field
            .bytes()
            .await
            .map_err(|e| AppError::Validation(e.body_text()))?;

        return Ok(CandidateFile::new(file_name, content_type, data));
    }

    Err(AppError::Validation(format!(
        "multipart field '{FILE_FIELD}' is required"
    )))
}

fn parse_target(asset_id: &str, folder: &str) -> Result<UploadTarget, AppError> {
    let asset_id = AssetId::parse(asset_id).map_err(|e| AppError::Validation(e.to_string()))?;
    let folder = DocumentFolder::parse(folder)
        .ok_or_else(|| AppError::Validation(format!("unknown document folder '{folder}'")))?;
    Ok(UploadTarget::new(asset_id, folder))
}

fn parse_path(path: &str) -> Result<StoragePath, AppError> {
    StoragePath::parse(path).map_err(|e| AppError::Validation(e.to_string()))
}

// ============================================================================
// Route Handlers
// ============================================================================

/// POST `/assets/{asset_id}/documents/{folder}`
/// Validate and upload a PDF sent as multipart field `file`.
async fn upload_document(
    State(state): State<AppState>,
    Path((asset_id, folder)): Path<(String, String)>,
    mut multipart: Multipart,
) -> impl IntoResponse {
    let target = match parse_target(&asset_id, &folder) {
        Ok(target) => target,
        Err(e) => return error_response(e),
    };
    let file = match read_file_field(&mut multipart).await {
        Ok(file) => file,
        Err(e) => return error_response(e),
    };

    // A client disconnect drops this future and the in-flight attempt with it.
    let cancel = CancellationToken::new();

    match state.documents.upload(target, file, &cancel).await {
        Ok(doc) => {
            info!(
                storage_path = %doc.storage_path,
                size = doc.size,
                "Document stored"
            );
            let response = UploadResponse {
                storage_path: doc.storage_path.to_string(),
                size: doc.size,
            };
            (StatusCode::CREATED, Json(response)).into_response()
        }
        Err(e) => {
            warn!(asset_id = %asset_id, folder = %folder, error = %e, "Document upload rejected");
            error_response(e)
        }
    }
}

/// GET `/documents/signed-url?path=...`
/// Return a time-limited URL for a stored document.
async fn get_signed_url(
    State(state): State<AppState>,
    Query(query): Query<DocumentPathQuery>,
) -> impl IntoResponse {
    let path = match parse_path(&query.path) {
        Ok(path) => path,
        Err(e) => return error_response(e),
    };

    match state.documents.signed_url(&path).await {
        Ok(entry) => Json(SignedUrlResponse {
            url: entry.url,
            expires_at: entry.expires_at,
        })
        .into_response(),
        Err(e) => {
            error!(storage_path = %path, error = %e, "Failed to issue signed URL");
            error_response(e)
        }
    }
}

/// DELETE `/documents?path=...`
/// Delete a stored document and evict its cached URL.
async fn delete_document(
    State(state): State<AppState>,
    Query(query): Query<DocumentPathQuery>,
) -> impl IntoResponse {
    let path = match parse_path(&query.path) {
        Ok(path) => path,
        Err(e) => return error_response(e),
    };

    match state.documents.delete(&path).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => {
            error!(storage_path = %path, error = %e, "Failed to delete document");
            error_response(e)
        }
    }
}
