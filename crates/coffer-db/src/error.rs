use coffer_core::{CofferError, ErrorKind, ErrorMetadata};
use thiserror::Error;

/// Catalog operation errors
#[derive(Debug, Error)]
pub enum CatalogError {
    /// The opaque id is already taken
    #[error("Catalog id already exists: {0}")]
    DuplicateId(String),

    /// The owner already has an entry at this logical path
    #[error("Logical path already exists for {owner}: {path}")]
    DuplicatePath { owner: String, path: String },

    #[error("Catalog entry not found: {0}")]
    NotFound(String),

    #[error("Catalog migration failed: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Catalog database error: {0}")]
    Database(#[from] sqlx::Error),
}

pub type CatalogResult<T> = Result<T, CatalogError>;

fn database_kind(err: &sqlx::Error) -> ErrorKind {
    match err {
        sqlx::Error::RowNotFound => ErrorKind::NotFound,
        sqlx::Error::Configuration(_) => ErrorKind::Config,
        sqlx::Error::Io(_) | sqlx::Error::PoolTimedOut | sqlx::Error::WorkerCrashed => {
            ErrorKind::Transient
        }
        sqlx::Error::Database(db_err) => {
            let message = db_err.message().to_lowercase();
            if message.contains("locked") || message.contains("busy") {
                ErrorKind::Transient
            } else if db_err.is_unique_violation() {
                ErrorKind::Conflict
            } else {
                ErrorKind::Fatal
            }
        }
        _ => ErrorKind::Fatal,
    }
}

impl ErrorMetadata for CatalogError {
    fn kind(&self) -> ErrorKind {
        match self {
            CatalogError::DuplicateId(_) | CatalogError::DuplicatePath { .. } => {
                ErrorKind::Conflict
            }
            CatalogError::NotFound(_) => ErrorKind::NotFound,
            CatalogError::Migration(_) => ErrorKind::Config,
            CatalogError::Database(err) => database_kind(err),
        }
    }
}

impl From<CatalogError> for CofferError {
    fn from(err: CatalogError) -> Self {
        CofferError::new(err.kind(), err.to_string())
    }
}
