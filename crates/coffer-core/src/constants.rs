/// Uploads larger than this are routed to multipart put.
pub const MULTIPART_THRESHOLD_BYTES: u64 = 100 * 1024 * 1024;

/// Part size used by the remote backend when chunking a multipart upload.
pub const MULTIPART_PART_SIZE_BYTES: u64 = 8 * 1024 * 1024;

/// S3 rejects non-final parts smaller than this.
pub const S3_MIN_PART_SIZE_BYTES: u64 = 5 * 1024 * 1024;

/// Length of generated opaque ids.
pub const OPAQUE_ID_LENGTH: usize = 4;

/// Alphabet generated opaque ids are drawn from.
pub const OPAQUE_ID_ALPHABET: &[u8] =
    b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Upper bound on catalog reservation attempts for a single upload.
pub const RESERVE_MAX_ATTEMPTS: u32 = 16;

/// Blob metadata key recording the catalog id of the entry that owns the blob.
pub const META_CATALOG_ID: &str = "coffer-id";

/// Blob metadata key recording the owner of the blob.
pub const META_OWNER: &str = "coffer-owner";

/// Outcome string reported for a successfully removed key.
pub const REMOVED: &str = "removed";
