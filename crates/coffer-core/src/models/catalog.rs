use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A catalog row mapping a caller-facing identity to a physical backend key.
///
/// Rows are never updated in place. A rename is a new row with a new logical path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct CatalogEntry {
    /// Opaque id, globally unique
    pub id: String,
    pub owner: String,
    /// Unique per owner
    pub logical_path: String,
    /// Access password; empty means no password
    #[serde(skip_serializing)]
    pub password: String,
    /// `owner/logical_path`, globally unique
    pub physical_key: String,
    pub created_at: DateTime<Utc>,
}

impl CatalogEntry {
    pub fn has_password(&self) -> bool {
        !self.password.is_empty()
    }

    /// Listing view of this entry, without the password itself.
    pub fn to_listing(&self) -> CatalogListing {
        CatalogListing {
            id: self.id.clone(),
            logical_path: self.logical_path.clone(),
            has_password: self.has_password(),
            created_at: self.created_at,
        }
    }
}

/// Fields needed to reserve a catalog row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewCatalogEntry {
    pub id: String,
    pub owner: String,
    pub logical_path: String,
    pub password: String,
    pub physical_key: String,
}

/// One entry of an owner's listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogListing {
    pub id: String,
    pub logical_path: String,
    pub has_password: bool,
    pub created_at: DateTime<Utc>,
}
