//! Parsing of caller-presented download keys.
//!
//! - `K7x9`: an opaque id
//! - `alice/K7x9` or `alice/notes`: ambiguous, the segment is tried as an id
//!   owned by `alice` first, then as a logical path
//! - `alice/notes/todo`: owner plus logical path

use coffer_core::{CofferError, CofferResult};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyForm {
    Id(String),
    Ambiguous { owner: String, segment: String },
    Path { owner: String, path: String },
}

pub fn parse_key(key: &str) -> CofferResult<KeyForm> {
    let Some((owner, rest)) = key.split_once('/') else {
        if key.is_empty() {
            return Err(CofferError::InvalidInput("key must not be empty".to_string()));
        }
        return Ok(KeyForm::Id(key.to_string()));
    };

    if owner.is_empty() || rest.is_empty() {
        return Err(CofferError::InvalidInput(format!("malformed key: {:?}", key)));
    }

    if rest.contains('/') {
        Ok(KeyForm::Path {
            owner: owner.to_string(),
            path: rest.to_string(),
        })
    } else {
        Ok(KeyForm::Ambiguous {
            owner: owner.to_string(),
            segment: rest.to_string(),
        })
    }
}
