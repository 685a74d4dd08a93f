use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Small string-to-string metadata map attached to a blob.
pub type Metadata = BTreeMap<String, String>;

/// Metadata about a stored blob. Bodies travel separately as streams.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Blob {
    /// Physical key, unique within a backend
    pub key: String,
    /// Full size of the stored object in bytes, also for ranged reads
    pub size: u64,
    /// Content hash computed by the backend, without surrounding quotes
    pub etag: String,
    pub content_type: Option<String>,
    pub last_modified: DateTime<Utc>,
    #[serde(default)]
    pub metadata: Metadata,
}

/// Inclusive byte span `[start, end]`. `end = None` reads to the end of the object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ByteRange {
    pub start: u64,
    pub end: Option<u64>,
}

impl ByteRange {
    /// Inclusive range `[start, end]`.
    pub fn new(start: u64, end: u64) -> Self {
        Self {
            start,
            end: Some(end),
        }
    }

    /// Range from `start` to the end of the object.
    pub fn open(start: u64) -> Self {
        Self { start, end: None }
    }

    /// Resolve this range against an object of `size` bytes.
    ///
    /// Returns the inclusive `(start, end)` pair with `end` clamped to
    /// `size - 1`, or `None` when `start >= size` or the clamped end lies
    /// before `start`.
    pub fn resolve(&self, size: u64) -> Option<(u64, u64)> {
        if self.start >= size {
            return None;
        }
        let last = size - 1;
        let end = self.end.map_or(last, |end| end.min(last));
        if end < self.start {
            return None;
        }
        Some((self.start, end))
    }
}

impl fmt::Display for ByteRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.end {
            Some(end) => write!(f, "{}-{}", self.start, end),
            None => write!(f, "{}-", self.start),
        }
    }
}
