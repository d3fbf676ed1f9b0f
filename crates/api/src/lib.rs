//! HTTP API layer with Axum routes.
//!
//! This crate provides:
//! - REST API routes for uploading, viewing and deleting asset documents
//! - JSON error responses built from `AppError`
//! - Request tracing and request id propagation

pub mod routes;

use assetdoc_core::documents::DocumentService;
use axum::Router;
use axum::http::header::AUTHORIZATION;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::sensitive_headers::SetSensitiveRequestHeadersLayer;
use tower_http::trace::TraceLayer;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    /// Document service over the configured blob store.
    pub documents: Arc<DocumentService>,
}

impl AppState {
    /// Create state around a document service.
    #[must_use]
    pub fn new(documents: Arc<DocumentService>) -> Self {
        Self { documents }
    }
}

/// Creates the main application router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .nest("/api/v1", routes::api_routes_with_state(&state))
        .layer(TraceLayer::new_for_http())
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(SetSensitiveRequestHeadersLayer::new([AUTHORIZATION]))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}
