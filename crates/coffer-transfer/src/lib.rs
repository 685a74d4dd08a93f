//! Coffer transfer layer
//!
//! Coordinates the catalog and a storage backend: uploads reserve a catalog
//! row before writing the blob, downloads resolve a caller key to a catalog
//! row before streaming the blob.

pub mod identity;
pub mod key_resolution;
pub mod service;
pub mod telemetry;
pub mod types;

pub use key_resolution::{parse_key, KeyForm};
pub use service::TransferService;
pub use telemetry::init_tracing;
pub use types::{Download, RemoveOutcome, TransferConfig, UploadOutcome, UploadRequest};
