//! Storage abstraction trait
//!
//! This module defines the Storage trait that every blob backend implements,
//! and the error type all backends map their native failures onto.

use crate::StorageBackend;
use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use coffer_core::{Blob, ByteRange, CofferError, ErrorKind, ErrorMetadata, Metadata};
use futures::{Stream, StreamExt};
use std::pin::Pin;
use thiserror::Error;
use tokio::io::AsyncRead;

/// Storage operation errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Object not found: {0}")]
    NotFound(String),

    #[error("Object already exists: {0}")]
    Conflict(String),

    #[error("Invalid range: {0}")]
    InvalidRange(String),

    #[error("Invalid storage key: {0}")]
    InvalidKey(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Transient backend error: {0}")]
    Transient(String),

    #[error("Fatal backend error: {0}")]
    Fatal(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

impl StorageError {
    /// Build an error of the given canonical kind.
    pub fn from_kind(kind: ErrorKind, message: impl Into<String>) -> Self {
        let message = message.into();
        match kind {
            ErrorKind::NotFound => StorageError::NotFound(message),
            ErrorKind::Conflict => StorageError::Conflict(message),
            ErrorKind::InvalidInput => StorageError::InvalidKey(message),
            ErrorKind::Config => StorageError::ConfigError(message),
            ErrorKind::Transient => StorageError::Transient(message),
            ErrorKind::Unauthorized | ErrorKind::Fatal => StorageError::Fatal(message),
        }
    }
}

impl ErrorMetadata for StorageError {
    fn kind(&self) -> ErrorKind {
        match self {
            StorageError::NotFound(_) => ErrorKind::NotFound,
            StorageError::Conflict(_) => ErrorKind::Conflict,
            StorageError::InvalidRange(_) | StorageError::InvalidKey(_) => ErrorKind::InvalidInput,
            StorageError::ConfigError(_) => ErrorKind::Config,
            // Reading the caller's stream failed mid-transfer
            StorageError::Transient(_) | StorageError::IoError(_) => ErrorKind::Transient,
            StorageError::Fatal(_) => ErrorKind::Fatal,
        }
    }
}

impl From<StorageError> for CofferError {
    fn from(err: StorageError) -> Self {
        CofferError::new(err.kind(), err.to_string())
    }
}

/// Input body of a write. Consumed until EOF.
pub type BlobReader = Pin<Box<dyn AsyncRead + Send + Unpin>>;

/// Output body of a read. Dropping the stream releases the underlying resources.
pub type BlobStream = Pin<Box<dyn Stream<Item = Result<Bytes, StorageError>> + Send>>;

/// Storage abstraction trait
///
/// Every backend (relational table, S3-compatible object store) implements
/// this trait with equivalent observable semantics. Backends are constructed
/// already initialised, so no operation can run before init. Dropping any
/// returned future cancels the operation and releases its connection.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Store the full content of `reader` under `key`.
    ///
    /// `size_hint` is the expected length when known. Whether an existing
    /// key is replaced or rejected with [`StorageError::Conflict`] is backend
    /// policy.
    async fn put(
        &self,
        key: &str,
        reader: BlobReader,
        size_hint: Option<u64>,
        content_type: Option<&str>,
        metadata: Metadata,
    ) -> StorageResult<Blob>;

    /// Store a large payload in `part_size` chunks.
    ///
    /// Semantically equivalent to [`Storage::put`]; the caller never buffers
    /// the whole stream.
    async fn multipart_put(
        &self,
        key: &str,
        reader: BlobReader,
        part_size: u64,
        content_type: Option<&str>,
        metadata: Metadata,
    ) -> StorageResult<Blob>;

    /// Fetch metadata and a body stream, optionally restricted to an inclusive byte range.
    async fn get(&self, key: &str, range: Option<ByteRange>) -> StorageResult<(Blob, BlobStream)>;

    /// Metadata (no bodies) for every key starting with `prefix`, in ascending key order.
    async fn list(&self, prefix: &str) -> StorageResult<Vec<Blob>>;

    /// Metadata only, no body transfer.
    async fn stat(&self, key: &str) -> StorageResult<Blob>;

    /// Remove `key`; [`StorageError::NotFound`] if it does not exist.
    async fn delete(&self, key: &str) -> StorageResult<()>;

    /// Release backend resources. Operations after close fail with a fatal error.
    async fn close(&self) -> StorageResult<()>;

    /// Get the storage backend type
    fn backend_type(&self) -> StorageBackend;
}

/// Drain a body stream into memory.
pub async fn collect_stream(mut stream: BlobStream) -> StorageResult<Bytes> {
    let mut buffer = BytesMut::new();
    while let Some(chunk) = stream.next().await {
        buffer.extend_from_slice(&chunk?);
    }
    Ok(buffer.freeze())
}
