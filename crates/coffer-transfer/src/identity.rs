//! Opaque id generation and the logical-path rename probe.

use coffer_core::constants::OPAQUE_ID_ALPHABET;
use coffer_core::{CofferError, CofferResult};
use rand::rngs::OsRng;
use rand::TryRngCore;
use std::collections::HashSet;

// Largest multiple of the alphabet length that fits in a byte
const ACCEPT_BELOW: u8 = (256 / OPAQUE_ID_ALPHABET.len() * OPAQUE_ID_ALPHABET.len()) as u8;

/// Generate a random alphanumeric id of `length` characters from the OS entropy source.
pub fn generate_id(length: usize) -> CofferResult<String> {
    let mut id = String::with_capacity(length);
    let mut buffer = [0u8; 32];

    while id.len() < length {
        OsRng
            .try_fill_bytes(&mut buffer)
            .map_err(|e| CofferError::Fatal(format!("entropy source failed: {}", e)))?;

        for &byte in buffer.iter().filter(|&&b| b < ACCEPT_BELOW) {
            if id.len() == length {
                break;
            }
            let index = byte as usize % OPAQUE_ID_ALPHABET.len();
            id.push(OPAQUE_ID_ALPHABET[index] as char);
        }
    }

    Ok(id)
}

/// First of `desired`, `desired_1`, `desired_2`, ... not present in `existing`.
pub fn next_free_path(desired: &str, existing: &HashSet<String>) -> String {
    if !existing.contains(desired) {
        return desired.to_string();
    }
    let mut suffix = 1usize;
    loop {
        let candidate = format!("{}_{}", desired, suffix);
        if !existing.contains(&candidate) {
            return candidate;
        }
        suffix += 1;
    }
}

/// Caller-supplied ids must be usable as the single segment of a download key.
pub fn validate_id(id: &str) -> CofferResult<()> {
    if id.is_empty() || id.contains('/') {
        return Err(CofferError::InvalidInput(format!(
            "opaque id must be non-empty and must not contain '/': {:?}",
            id
        )));
    }
    Ok(())
}
