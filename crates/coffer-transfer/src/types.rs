use coffer_core::{Blob, CatalogEntry, CofferConfig};
use coffer_storage::BlobStream;
use std::fmt;

/// Tunables for [`crate::TransferService`].
#[derive(Debug, Clone)]
pub struct TransferConfig {
    /// Uploads with a known size at or below this go through a single put
    pub multipart_threshold_bytes: u64,
    pub multipart_part_size_bytes: u64,
    pub opaque_id_length: usize,
    /// Bound on catalog reservation attempts per upload
    pub reserve_max_attempts: u32,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self::from(&CofferConfig::default())
    }
}

impl From<&CofferConfig> for TransferConfig {
    fn from(config: &CofferConfig) -> Self {
        Self {
            multipart_threshold_bytes: config.multipart_threshold_bytes,
            multipart_part_size_bytes: config.multipart_part_size_bytes,
            opaque_id_length: config.opaque_id_length,
            reserve_max_attempts: config.reserve_max_attempts,
        }
    }
}

/// Desired identity and attributes of an upload. The body is passed separately.
#[derive(Debug, Clone, Default)]
pub struct UploadRequest {
    pub owner: String,
    /// Opaque id to use instead of a generated one
    pub id: Option<String>,
    pub logical_path: String,
    pub password: Option<String>,
    pub content_type: Option<String>,
    /// Payload length; `None` when unknown
    pub size_hint: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct UploadOutcome {
    pub id: String,
    /// May differ from the requested path when it was already taken
    pub logical_path: String,
    pub blob: Blob,
}

/// A resolved download. Dropping `body` releases the backend stream.
pub struct Download {
    pub entry: CatalogEntry,
    pub blob: Blob,
    pub body: BlobStream,
}

impl fmt::Debug for Download {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Download")
            .field("entry", &self.entry)
            .field("blob", &self.blob)
            .finish_non_exhaustive()
    }
}

/// Per-key result of a remove request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoveOutcome {
    Removed,
    Failed(String),
}

impl RemoveOutcome {
    pub fn is_removed(&self) -> bool {
        matches!(self, RemoveOutcome::Removed)
    }
}

impl fmt::Display for RemoveOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RemoveOutcome::Removed => f.write_str(coffer_core::constants::REMOVED),
            RemoveOutcome::Failed(reason) => f.write_str(reason),
        }
    }
}
