//! Shared errors and configuration for assetdoc.
//!
//! This crate provides the pieces used across all other crates:
//! - Application-wide error types with HTTP status mapping
//! - Configuration management (server, storage provider, document policy)

pub mod config;
pub mod error;

pub use config::{AppConfig, DocumentSettings, StorageProvider, StorageSettings};
pub use error::{AppError, AppResult};
