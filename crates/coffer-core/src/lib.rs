//! Coffer Core Library
//!
//! This crate provides the domain models, the canonical error taxonomy and the
//! environment configuration shared by every Coffer component.

pub mod config;
pub mod constants;
pub mod error;
pub mod models;
pub mod storage_types;

// Re-export commonly used types
pub use config::CofferConfig;
pub use error::{CofferError, CofferResult, ErrorKind, ErrorMetadata, LogLevel};
pub use models::{Blob, ByteRange, CatalogEntry, CatalogListing, Metadata, NewCatalogEntry};
pub use storage_types::StorageBackend;
