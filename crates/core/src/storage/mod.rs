//! Blob store for asset documents using Apache OpenDAL.
//!
//! This module provides vendor-agnostic object storage with support for:
//! - S3-compatible: Cloudflare R2, Supabase Storage, AWS S3, DigitalOcean Spaces
//! - Azure Blob Storage
//! - Local filesystem (development only, no signed URLs)
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                     BlobStore (trait)                            │
//! ├─────────────────────────────────────────────────────────────────┤
//! │ upload(path, bytes, ct, cancel) │ issue_signed_url(path, ttl)   │
//! │ remove(path)                    │ bucket()                      │
//! ├─────────────────────────────────────────────────────────────────┤
//! │   OpendalBlobStore (remote)     │   MemoryBlobStore (tests)     │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every remote call runs under a deadline from [`StorageConfig`].

mod config;
mod deadline;
mod error;
#[cfg(any(test, feature = "test-util"))]
mod memory;
mod service;
mod store;

pub use config::StorageConfig;
pub use error::{StorageError, StorageResult};
#[cfg(any(test, feature = "test-util"))]
pub use memory::{MemoryBlobStore, MemoryObject};
pub use service::OpendalBlobStore;
pub use store::BlobStore;
