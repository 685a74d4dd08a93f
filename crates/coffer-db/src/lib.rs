//! Coffer catalog database
//!
//! The catalog is a relational index mapping `(owner, logical_path)` to an
//! opaque id and a physical backend key. Its uniqueness constraints are the
//! sole arbiter of which physical keys are claimed.

pub mod db;
pub mod error;

pub use db::{connect_pool, CatalogRepository, MIGRATOR};
pub use error::{CatalogError, CatalogResult};
