//! Application configuration management.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Application configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Server configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// Object storage configuration.
    pub storage: StorageSettings,
    /// Document policy and signed URL configuration.
    #[serde(default)]
    pub documents: DocumentSettings,
}

/// Server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host to bind to.
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

/// Storage provider configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StorageProvider {
    /// S3-compatible storage: Cloudflare R2, Supabase, AWS S3, DigitalOcean Spaces
    S3 {
        /// S3 endpoint URL.
        endpoint: String,
        /// S3 bucket name.
        bucket: String,
        /// AWS access key ID.
        access_key_id: String,
        /// AWS secret access key.
        secret_access_key: String,
        /// AWS region.
        region: String,
    },
    /// Azure Blob Storage
    AzureBlob {
        /// Azure storage account name.
        account: String,
        /// Azure storage access key.
        access_key: String,
        /// Azure container name.
        container: String,
    },
    /// Local filesystem (development only, cannot issue signed URLs)
    LocalFs {
        /// Root directory path.
        root: PathBuf,
    },
}

impl StorageProvider {
    /// Create S3-compatible provider (Cloudflare R2, Supabase, AWS S3).
    #[must_use]
    pub fn s3(
        endpoint: impl Into<String>,
        bucket: impl Into<String>,
        access_key_id: impl Into<String>,
        secret_access_key: impl Into<String>,
        region: impl Into<String>,
    ) -> Self {
        Self::S3 {
            endpoint: endpoint.into(),
            bucket: bucket.into(),
            access_key_id: access_key_id.into(),
            secret_access_key: secret_access_key.into(),
            region: region.into(),
        }
    }

    /// Create Azure Blob Storage provider.
    #[must_use]
    pub fn azure_blob(
        account: impl Into<String>,
        access_key: impl Into<String>,
        container: impl Into<String>,
    ) -> Self {
        Self::AzureBlob {
            account: account.into(),
            access_key: access_key.into(),
            container: container.into(),
        }
    }

    /// Create local filesystem provider (development only).
    #[must_use]
    pub fn local_fs(root: impl Into<PathBuf>) -> Self {
        Self::LocalFs { root: root.into() }
    }

    /// Short provider name used in logs.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::S3 { .. } => "s3",
            Self::AzureBlob { .. } => "azure_blob",
            Self::LocalFs { .. } => "local",
        }
    }

    /// Get the bucket/container name.
    #[must_use]
    pub fn bucket(&self) -> &str {
        match self {
            Self::S3 { bucket, .. } => bucket,
            Self::AzureBlob { container, .. } => container,
            Self::LocalFs { root } => root.to_str().unwrap_or("local"),
        }
    }
}

/// Object storage settings.
#[derive(Debug, Clone, Deserialize)]
pub struct StorageSettings {
    /// Which backend holds the private document bucket.
    pub provider: StorageProvider,
    /// Deadline applied to every remote call, in seconds.
    #[serde(default = "default_operation_timeout")]
    pub operation_timeout_secs: u64,
}

fn default_operation_timeout() -> u64 {
    30
}

/// Document upload policy and signed URL cache settings.
#[derive(Debug, Clone, Deserialize)]
pub struct DocumentSettings {
    /// Maximum accepted file size in bytes.
    #[serde(default = "default_max_file_size")]
    pub max_file_size: u64,
    /// Lifetime requested for each signed URL.
    #[serde(default = "default_signed_url_ttl")]
    pub signed_url_ttl_secs: u64,
    /// How long before real expiry a cached URL stops being handed out.
    #[serde(default = "default_cache_margin")]
    pub cache_margin_secs: u64,
    /// Maximum number of cached signed URLs.
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: u64,
    /// Total upload attempts before giving up.
    #[serde(default = "default_max_upload_attempts")]
    pub max_upload_attempts: u32,
}

impl DocumentSettings {
    /// Default max file size: 10 MiB.
    pub const DEFAULT_MAX_FILE_SIZE: u64 = 10 * 1024 * 1024;
    /// Default signed URL lifetime: 1 hour.
    pub const DEFAULT_SIGNED_URL_TTL: u64 = 3600;
    /// Default pre-expiry margin: 1 minute.
    pub const DEFAULT_CACHE_MARGIN: u64 = 60;
    /// Default cache capacity.
    pub const DEFAULT_CACHE_CAPACITY: u64 = 10_000;
    /// Default attempt ceiling.
    pub const DEFAULT_MAX_UPLOAD_ATTEMPTS: u32 = 3;
}

impl Default for DocumentSettings {
    fn default() -> Self {
        Self {
            max_file_size: Self::DEFAULT_MAX_FILE_SIZE,
            signed_url_ttl_secs: Self::DEFAULT_SIGNED_URL_TTL,
            cache_margin_secs: Self::DEFAULT_CACHE_MARGIN,
            cache_capacity: Self::DEFAULT_CACHE_CAPACITY,
            max_upload_attempts: Self::DEFAULT_MAX_UPLOAD_ATTEMPTS,
        }
    }
}

fn default_max_file_size() -> u64 {
    DocumentSettings::DEFAULT_MAX_FILE_SIZE
}

fn default_signed_url_ttl() -> u64 {
    DocumentSettings::DEFAULT_SIGNED_URL_TTL
}

fn default_cache_margin() -> u64 {
    DocumentSettings::DEFAULT_CACHE_MARGIN
}

fn default_cache_capacity() -> u64 {
    DocumentSettings::DEFAULT_CACHE_CAPACITY
}

fn default_max_upload_attempts() -> u32 {
    DocumentSettings::DEFAULT_MAX_UPLOAD_ATTEMPTS
}

impl AppConfig {
    /// Loads configuration from environment and config files.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration cannot be loaded.
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".to_string());

        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{run_mode}")).required(false))
            .add_source(config::Environment::with_prefix("ASSETDOC").separator("__"))
            .build()?;

        config.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_provider_s3() {
        let provider = StorageProvider::s3(
            "https://account.r2.cloudflarestorage.com",
            "asset-documents",
            "access_key",
            "secret_key",
            "auto",
        );
        assert_eq!(provider.name(), "s3");
        assert_eq!(provider.bucket(), "asset-documents");
    }

    #[test]
    fn test_storage_provider_azure() {
        let provider = StorageProvider::azure_blob("assetdev", "access_key", "documents");
        assert_eq!(provider.name(), "azure_blob");
        assert_eq!(provider.bucket(), "documents");
    }

    #[test]
    fn test_storage_provider_local() {
        let provider = StorageProvider::local_fs("./storage");
        assert_eq!(provider.name(), "local");
        assert_eq!(provider.bucket(), "./storage");
    }

    #[test]
    fn test_document_settings_defaults() {
        let settings = DocumentSettings::default();
        assert_eq!(settings.max_file_size, 10 * 1024 * 1024);
        assert_eq!(settings.signed_url_ttl_secs, 3600);
        assert_eq!(settings.cache_margin_secs, 60);
        assert_eq!(settings.max_upload_attempts, 3);
    }

    #[test]
    fn test_provider_deserializes_from_tagged_json() {
        let json = r#"{"type":"local_fs","root":"/var/lib/assetdoc"}"#;
        let provider: StorageProvider = serde_json::from_str(json).expect("valid provider");
        assert_eq!(provider.name(), "local");
    }

    #[test]
    fn test_storage_settings_default_timeout() {
        let json = r#"{"provider":{"type":"local_fs","root":"./data"}}"#;
        let settings: StorageSettings = serde_json::from_str(json).expect("valid settings");
        assert_eq!(settings.operation_timeout_secs, 30);
    }
}
