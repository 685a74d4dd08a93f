//! Catalog repository: CRUD for the catalog_entries table.

use crate::db::{connect_pool, MIGRATOR};
use crate::error::{CatalogError, CatalogResult};
use chrono::Utc;
use coffer_core::{CatalogEntry, CatalogListing, NewCatalogEntry};
use sqlx::SqlitePool;
use std::collections::HashSet;
use std::time::Duration;

const ENTRY_COLUMNS: &str = "id, owner, logical_path, password, physical_key, created_at";

/// Which uniqueness constraint an insert tripped over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UniqueTarget {
    Id,
    Path,
}

/// Work out the violated constraint from a SQLite message such as
/// `UNIQUE constraint failed: catalog_entries.id`.
pub fn unique_target(message: &str) -> Option<UniqueTarget> {
    let (_, columns) = message.split_once("UNIQUE constraint failed:")?;
    let columns: Vec<&str> = columns
        .split(',')
        .map(|c| c.trim().rsplit('.').next().unwrap_or_default())
        .collect();

    if columns == ["id"] {
        Some(UniqueTarget::Id)
    } else if columns.contains(&"logical_path") || columns.contains(&"physical_key") {
        // physical_key is derived from (owner, logical_path)
        Some(UniqueTarget::Path)
    } else {
        None
    }
}

/// Repository for catalog_entries table.
#[derive(Clone)]
pub struct CatalogRepository {
    pool: SqlitePool,
}

impl CatalogRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Open the catalog database and bring its schema up to date.
    pub async fn connect(
        url: &str,
        max_connections: u32,
        acquire_timeout: Duration,
    ) -> CatalogResult<Self> {
        let pool = connect_pool(url, max_connections, acquire_timeout).await?;
        let repo = Self::new(pool);
        repo.migrate().await?;
        tracing::info!("Catalog database initialized");
        Ok(repo)
    }

    pub async fn migrate(&self) -> CatalogResult<()> {
        MIGRATOR.run(&self.pool).await?;
        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }

    /// Insert a new entry and return it.
    ///
    /// Fails with [`CatalogError::DuplicateId`] or
    /// [`CatalogError::DuplicatePath`] when the matching uniqueness
    /// constraint rejects the row.
    #[tracing::instrument(
        skip(self, entry),
        fields(db.table = "catalog_entries", db.operation = "insert", owner = %entry.owner, id = %entry.id)
    )]
    pub async fn insert(&self, entry: NewCatalogEntry) -> CatalogResult<CatalogEntry> {
        let statement = format!(
            "INSERT INTO catalog_entries ({ENTRY_COLUMNS}) VALUES (?, ?, ?, ?, ?, ?) \
             RETURNING {ENTRY_COLUMNS}"
        );

        sqlx::query_as::<_, CatalogEntry>(&statement)
            .bind(&entry.id)
            .bind(&entry.owner)
            .bind(&entry.logical_path)
            .bind(&entry.password)
            .bind(&entry.physical_key)
            .bind(Utc::now())
            .fetch_one(&self.pool)
            .await
            .map_err(|err| {
                let target = match &err {
                    sqlx::Error::Database(db_err) => unique_target(db_err.message()),
                    _ => None,
                };
                match target {
                    Some(UniqueTarget::Id) => CatalogError::DuplicateId(entry.id.clone()),
                    Some(UniqueTarget::Path) => CatalogError::DuplicatePath {
                        owner: entry.owner.clone(),
                        path: entry.logical_path.clone(),
                    },
                    None => CatalogError::Database(err),
                }
            })
    }

    /// Fetch an entry by opaque id.
    #[tracing::instrument(skip(self), fields(db.table = "catalog_entries", db.operation = "select", db.record_id = %id))]
    pub async fn get_by_id(&self, id: &str) -> CatalogResult<Option<CatalogEntry>> {
        let statement = format!("SELECT {ENTRY_COLUMNS} FROM catalog_entries WHERE id = ?");
        let entry = sqlx::query_as::<_, CatalogEntry>(&statement)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(entry)
    }

    /// Fetch an entry by owner and logical path.
    #[tracing::instrument(skip(self), fields(db.table = "catalog_entries", db.operation = "select"))]
    pub async fn get_by_owner_path(
        &self,
        owner: &str,
        logical_path: &str,
    ) -> CatalogResult<Option<CatalogEntry>> {
        let statement = format!(
            "SELECT {ENTRY_COLUMNS} FROM catalog_entries WHERE owner = ? AND logical_path = ?"
        );
        let entry = sqlx::query_as::<_, CatalogEntry>(&statement)
            .bind(owner)
            .bind(logical_path)
            .fetch_optional(&self.pool)
            .await?;
        Ok(entry)
    }

    /// All entries of an owner, oldest first.
    #[tracing::instrument(skip(self), fields(db.table = "catalog_entries", db.operation = "select"))]
    pub async fn list_by_owner(&self, owner: &str) -> CatalogResult<Vec<CatalogListing>> {
        let statement = format!(
            "SELECT {ENTRY_COLUMNS} FROM catalog_entries WHERE owner = ? \
             ORDER BY created_at ASC, logical_path ASC"
        );
        let entries = sqlx::query_as::<_, CatalogEntry>(&statement)
            .bind(owner)
            .fetch_all(&self.pool)
            .await?;
        Ok(entries.iter().map(CatalogEntry::to_listing).collect())
    }

    /// Logical paths the owner already uses at `path` or `path_<n>`.
    #[tracing::instrument(skip(self), fields(db.table = "catalog_entries", db.operation = "select"))]
    pub async fn existing_paths(&self, owner: &str, path: &str) -> CatalogResult<HashSet<String>> {
        let paths: Vec<String> = sqlx::query_scalar(
            "SELECT logical_path FROM catalog_entries \
             WHERE owner = ? AND (logical_path = ? OR substr(logical_path, 1, ?) = ?)",
        )
        .bind(owner)
        .bind(path)
        .bind((path.chars().count() + 1) as i64)
        .bind(format!("{}_", path))
        .fetch_all(&self.pool)
        .await?;
        Ok(paths.into_iter().collect())
    }

    /// Delete an owner's entry by id and return the removed row.
    #[tracing::instrument(skip(self), fields(db.table = "catalog_entries", db.operation = "delete", db.record_id = %id))]
    pub async fn delete_by_id(&self, owner: &str, id: &str) -> CatalogResult<CatalogEntry> {
        let statement = format!(
            "DELETE FROM catalog_entries WHERE owner = ? AND id = ? RETURNING {ENTRY_COLUMNS}"
        );
        sqlx::query_as::<_, CatalogEntry>(&statement)
            .bind(owner)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| CatalogError::NotFound(id.to_string()))
    }
}
