//! assetdoc API Server
//!
//! Main entry point for the asset document service.

use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use assetdoc_api::{AppState, create_router};
use assetdoc_core::documents::DocumentService;
use assetdoc_core::storage::{OpendalBlobStore, StorageConfig};
use assetdoc_shared::AppConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "assetdoc=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = AppConfig::load()?;

    // Connect object storage
    let storage_config = StorageConfig::from_settings(&config.storage);
    let store = OpendalBlobStore::from_config(storage_config)?;
    info!(
        provider = store.provider_name(),
        bucket = %config.storage.provider.bucket(),
        timeout_secs = config.storage.operation_timeout_secs,
        "Object storage configured"
    );

    // Create document service and application state
    let documents = DocumentService::new(Arc::new(store), &config.documents);
    info!(
        max_file_size = config.documents.max_file_size,
        signed_url_ttl_secs = config.documents.signed_url_ttl_secs,
        max_upload_attempts = config.documents.max_upload_attempts,
        "Document service ready"
    );
    let state = AppState::new(Arc::new(documents));

    // Create router
    let app = create_router(state);

    // Start server
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = TcpListener::bind(&addr).await?;
    info!("Server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

/// Resolves on Ctrl-C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl-C");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    info!("Shutdown signal received");
}
