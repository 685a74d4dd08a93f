//! Physical key derivation shared by the catalog and every backend.
//!
//! Key format: `{owner}/{logical_path}` with surrounding `/` trimmed from the
//! logical path. Owners never contain `/`, so the first `/` of a physical key
//! always separates the owner from the logical path.

use crate::{StorageError, StorageResult};

/// Check an owner identity before it is used to build keys.
pub fn validate_owner(owner: &str) -> StorageResult<()> {
    if owner.is_empty() {
        return Err(StorageError::InvalidKey("owner must not be empty".to_string()));
    }
    if owner.contains('/') {
        return Err(StorageError::InvalidKey(format!(
            "owner must not contain '/': {}",
            owner
        )));
    }
    Ok(())
}

/// Trim surrounding `/` from a logical path and reject traversal sequences.
pub fn normalize_logical_path(path: &str) -> StorageResult<String> {
    let trimmed = path.trim_matches('/');
    if trimmed.is_empty() {
        return Err(StorageError::InvalidKey(
            "logical path must not be empty".to_string(),
        ));
    }
    if trimmed.split('/').any(|segment| segment == "..") {
        return Err(StorageError::InvalidKey(format!(
            "logical path must not contain '..': {}",
            path
        )));
    }
    Ok(trimmed.to_string())
}

/// Derive the physical backend key for an owner's logical path.
pub fn physical_key(owner: &str, logical_path: &str) -> String {
    format!("{}/{}", owner, logical_path.trim_matches('/'))
}

/// Prefix under which every blob of `owner` lives.
pub fn owner_prefix(owner: &str) -> String {
    format!("{}/", owner)
}
