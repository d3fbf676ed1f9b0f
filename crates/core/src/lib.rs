//! Core document logic for assetdoc.
//!
//! This crate contains the document access layer with ZERO web dependencies.
//! The HTTP surface lives in `assetdoc-api`.
//!
//! # Modules
//!
//! - `storage` - Blob store trait and its OpenDAL backend
//! - `documents` - Validation, uploads, signed URL cache and previews

pub mod documents;
pub mod storage;
