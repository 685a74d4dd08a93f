//! Data models shared across Coffer components
//!
//! `blob` holds the backend-owned blob metadata and byte ranges; `catalog`
//! holds the rows of the catalog index.

mod blob;
mod catalog;

pub use blob::{Blob, ByteRange, Metadata};
pub use catalog::{CatalogEntry, CatalogListing, NewCatalogEntry};
