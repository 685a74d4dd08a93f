//! Coffer Storage Library
//!
//! This crate provides the blob storage contract and its two backends: a
//! relational table (SQLite) and an S3-compatible object store.
//!
//! # Storage key format
//!
//! Physical keys are owner-scoped: `{owner}/{logical_path}` with leading and
//! trailing slashes trimmed from the logical path. Keys must not contain `..`
//! segments. Key derivation lives in the `keys` module so every caller builds
//! keys the same way.

pub mod factory;
pub mod keys;
pub mod multipart;
#[cfg(feature = "storage-s3")]
pub mod s3;
#[cfg(feature = "storage-sql")]
pub mod sql;
pub mod traits;

// Re-export commonly used types
pub use coffer_core::StorageBackend;
pub use factory::create_storage;
#[cfg(feature = "storage-s3")]
pub use s3::{S3Config, S3Storage};
#[cfg(feature = "storage-sql")]
pub use sql::{SqlStorage, SqlStorageConfig};
pub use traits::{collect_stream, BlobReader, BlobStream, Storage, StorageError, StorageResult};
