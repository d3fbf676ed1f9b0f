//! API route definitions.

use axum::{
    Json, Router,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;

use crate::AppState;
use assetdoc_shared::AppError;

pub mod documents;
pub mod health;

/// Creates the API router. Route limits are derived from the state's policy.
pub fn api_routes_with_state(state: &AppState) -> Router<AppState> {
    Router::new()
        .merge(health::routes())
        .merge(documents::routes(state))
}

/// Render an error as `{"error": code, "message": msg}` with its status.
pub fn error_response(err: impl Into<AppError>) -> Response {
    let err = err.into();
    let status =
        StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

    (
        status,
        Json(json!({
            "error": err.error_code(),
            "message": err.message(),
        })),
    )
        .into_response()
}
