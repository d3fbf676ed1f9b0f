//! Storage configuration types.

use std::time::Duration;

use assetdoc_shared::config::{StorageProvider, StorageSettings};

/// Blob store configuration.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Storage provider configuration.
    pub provider: StorageProvider,
    /// Deadline for each remote call.
    pub operation_timeout: Duration,
}

impl StorageConfig {
    /// Default per-call deadline: 30 seconds.
    pub const DEFAULT_OPERATION_TIMEOUT: Duration = Duration::from_secs(30);

    /// Create a new storage config with default settings.
    #[must_use]
    pub fn new(provider: StorageProvider) -> Self {
        Self {
            provider,
            operation_timeout: Self::DEFAULT_OPERATION_TIMEOUT,
        }
    }

    /// Build from the `storage` section of the application config.
    #[must_use]
    pub fn from_settings(settings: &StorageSettings) -> Self {
        Self::new(settings.provider.clone())
            .with_operation_timeout(Duration::from_secs(settings.operation_timeout_secs))
    }

    /// Set the per-call deadline.
    #[must_use]
    pub fn with_operation_timeout(mut self, timeout: Duration) -> Self {
        self.operation_timeout = timeout;
        self
    }
}
