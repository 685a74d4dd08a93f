//! Relational blob backend.
//!
//! Blobs are rows of a single SQLite table. Writes read the whole input into
//! memory before inserting the row, and ranged reads slice the loaded row in
//! memory, so usable object size is bounded by process memory. Multipart
//! framing exists only to satisfy the [`Storage`] contract here.

use crate::traits::{BlobReader, BlobStream, Storage, StorageError, StorageResult};
use crate::StorageBackend;
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use coffer_core::{Blob, ByteRange, Metadata};
use regex::Regex;
use sha2::{Digest, Sha256};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::FromRow;
use std::str::FromStr;
use std::time::Duration;
use tokio::io::AsyncReadExt;

/// Configuration for [`SqlStorage::connect`].
#[derive(Debug, Clone)]
pub struct SqlStorageConfig {
    /// SQLite connection string, e.g. `sqlite://objects.db`
    pub url: String,
    /// Table holding the blobs; must be a plain identifier
    pub table: String,
    /// Upsert on existing keys instead of failing with `Conflict`
    pub allow_overwrite: bool,
    pub max_connections: u32,
    pub acquire_timeout: Duration,
}

impl SqlStorageConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            table: "objects".to_string(),
            allow_overwrite: true,
            max_connections: 5,
            acquire_timeout: Duration::from_secs(30),
        }
    }
}

/// SQLite-backed storage implementation
#[derive(Clone)]
pub struct SqlStorage {
    pool: SqlitePool,
    table: String,
    allow_overwrite: bool,
    owns_pool: bool,
}

#[derive(Debug, FromRow)]
struct BlobRow {
    key: String,
    size: i64,
    etag: String,
    content_type: Option<String>,
    last_modified: DateTime<Utc>,
    metadata_json: Option<String>,
}

#[derive(Debug, FromRow)]
struct BlobDataRow {
    #[sqlx(flatten)]
    meta: BlobRow,
    data: Vec<u8>,
}

/// Reject table names that are not plain identifiers; the name is interpolated into SQL.
pub fn sanitize_table_name(name: &str) -> StorageResult<String> {
    let pattern = Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$")
        .map_err(|e| StorageError::Fatal(format!("Invalid table name pattern: {}", e)))?;
    if pattern.is_match(name) {
        Ok(name.to_string())
    } else {
        Err(StorageError::ConfigError(format!(
            "Invalid table name: {:?}",
            name
        )))
    }
}

/// Hex-encoded SHA-256 of the payload.
pub fn content_etag(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// GLOB pattern matching every key that starts with `prefix`.
///
/// GLOB is case-sensitive, unlike LIKE; metacharacters in the prefix are
/// bracket-escaped so they match literally.
pub fn glob_prefix_pattern(prefix: &str) -> String {
    let mut pattern = String::with_capacity(prefix.len() + 1);
    for c in prefix.chars() {
        match c {
            '*' | '?' | '[' => {
                pattern.push('[');
                pattern.push(c);
                pattern.push(']');
            }
            _ => pattern.push(c),
        }
    }
    pattern.push('*');
    pattern
}

/// Slice `data` to the inclusive range, clamping the end to the object bound.
pub fn apply_range(data: Bytes, range: Option<ByteRange>) -> StorageResult<Bytes> {
    let Some(range) = range else {
        return Ok(data);
    };
    let size = data.len() as u64;
    let (start, end) = range.resolve(size).ok_or_else(|| {
        StorageError::InvalidRange(format!("{} for object of {} bytes", range, size))
    })?;
    Ok(data.slice(start as usize..=end as usize))
}

fn encode_metadata(metadata: &Metadata) -> StorageResult<Option<String>> {
    if metadata.is_empty() {
        return Ok(None);
    }
    serde_json::to_string(metadata)
        .map(Some)
        .map_err(|e| StorageError::Fatal(format!("Failed to encode metadata: {}", e)))
}

fn decode_metadata(raw: Option<&str>) -> StorageResult<Metadata> {
    match raw.map(str::trim) {
        None | Some("") => Ok(Metadata::new()),
        Some(raw) => serde_json::from_str(raw)
            .map_err(|e| StorageError::Fatal(format!("Failed to decode metadata: {}", e))),
    }
}

impl BlobRow {
    fn into_blob(self) -> StorageResult<Blob> {
        let metadata = decode_metadata(self.metadata_json.as_deref())?;
        Ok(Blob {
            key: self.key,
            size: self.size.max(0) as u64,
            etag: self.etag,
            content_type: self.content_type,
            last_modified: self.last_modified,
            metadata,
        })
    }
}

/// Map a sqlx failure onto the canonical taxonomy.
pub fn map_sqlx_error(err: sqlx::Error, key: &str) -> StorageError {
    match err {
        sqlx::Error::RowNotFound => StorageError::NotFound(key.to_string()),
        sqlx::Error::Database(db_err)
            if db_err.is_unique_violation()
                || db_err.message().contains("UNIQUE constraint failed") =>
        {
            StorageError::Conflict(key.to_string())
        }
        sqlx::Error::Database(db_err) => {
            let message = db_err.message().to_lowercase();
            if message.contains("locked") || message.contains("busy") {
                StorageError::Transient(db_err.to_string())
            } else {
                StorageError::Fatal(db_err.to_string())
            }
        }
        sqlx::Error::Configuration(e) => StorageError::ConfigError(e.to_string()),
        sqlx::Error::PoolClosed => StorageError::Fatal("storage has been closed".to_string()),
        err @ (sqlx::Error::Io(_) | sqlx::Error::PoolTimedOut | sqlx::Error::WorkerCrashed) => {
            StorageError::Transient(err.to_string())
        }
        other => StorageError::Fatal(other.to_string()),
    }
}

impl SqlStorage {
    /// Open the database and ensure the blob table exists.
    pub async fn connect(config: SqlStorageConfig) -> StorageResult<Self> {
        if config.url.trim().is_empty() {
            return Err(StorageError::ConfigError(
                "relational storage URL is required".to_string(),
            ));
        }
        let table = sanitize_table_name(&config.table)?;

        let options = SqliteConnectOptions::from_str(&config.url)
            .map_err(|e| StorageError::ConfigError(format!("Invalid storage URL: {}", e)))?
            .create_if_missing(true)
            .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections.max(1))
            .acquire_timeout(config.acquire_timeout)
            .connect_with(options)
            .await
            .map_err(|e| StorageError::ConfigError(format!("Failed to open database: {}", e)))?;

        let storage = Self {
            pool,
            table,
            allow_overwrite: config.allow_overwrite,
            owns_pool: true,
        };
        storage.ensure_table().await?;

        tracing::info!(
            table = %storage.table,
            allow_overwrite = storage.allow_overwrite,
            "Relational storage initialized"
        );

        Ok(storage)
    }

    /// Use an existing pool. [`Storage::close`] leaves a borrowed pool open.
    pub async fn with_pool(
        pool: SqlitePool,
        table: &str,
        allow_overwrite: bool,
    ) -> StorageResult<Self> {
        let storage = Self {
            pool,
            table: sanitize_table_name(table)?,
            allow_overwrite,
            owns_pool: false,
        };
        storage.ensure_table().await?;
        Ok(storage)
    }

    async fn ensure_table(&self) -> StorageResult<()> {
        let statement = format!(
            r#"
            CREATE TABLE IF NOT EXISTS {} (
                key TEXT PRIMARY KEY,
                data BLOB NOT NULL,
                size INTEGER NOT NULL,
                etag TEXT NOT NULL,
                content_type TEXT,
                last_modified TEXT NOT NULL,
                metadata_json TEXT
            )
            "#,
            self.table
        );
        sqlx::query(&statement)
            .execute(&self.pool)
            .await
            .map_err(|e| StorageError::ConfigError(format!("Failed to create table: {}", e)))?;
        Ok(())
    }

    async fn save(
        &self,
        key: &str,
        mut reader: BlobReader,
        size_hint: Option<u64>,
        content_type: Option<&str>,
        metadata: Metadata,
    ) -> StorageResult<Blob> {
        let start = std::time::Instant::now();

        let mut data = Vec::with_capacity(size_hint.unwrap_or(0).min(64 * 1024 * 1024) as usize);
        reader.read_to_end(&mut data).await.map_err(|e| {
            StorageError::Transient(format!("Failed to read from stream: {}", e))
        })?;

        let metadata_json = encode_metadata(&metadata)?;
        let blob = Blob {
            key: key.to_string(),
            size: data.len() as u64,
            etag: content_etag(&data),
            content_type: content_type.filter(|c| !c.is_empty()).map(String::from),
            last_modified: Utc::now(),
            metadata,
        };

        let mut statement = format!(
            "INSERT INTO {} (key, data, size, etag, content_type, last_modified, metadata_json) \
             VALUES (?, ?, ?, ?, ?, ?, ?)",
            self.table
        );
        if self.allow_overwrite {
            statement.push_str(
                " ON CONFLICT(key) DO UPDATE SET data = excluded.data, size = excluded.size, \
                 etag = excluded.etag, content_type = excluded.content_type, \
                 last_modified = excluded.last_modified, metadata_json = excluded.metadata_json",
            );
        }

        sqlx::query(&statement)
            .bind(key)
            .bind(data)
            .bind(blob.size as i64)
            .bind(&blob.etag)
            .bind(&blob.content_type)
            .bind(blob.last_modified)
            .bind(metadata_json)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                let err = map_sqlx_error(e, key);
                if !matches!(err, StorageError::Conflict(_)) {
                    tracing::error!(
                        error = %err,
                        table = %self.table,
                        key = %key,
                        size_bytes = blob.size,
                        duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                        "Relational storage put failed"
                    );
                }
                err
            })?;

        tracing::info!(
            table = %self.table,
            key = %key,
            size_bytes = blob.size,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Relational storage put successful"
        );

        Ok(blob)
    }
}

#[async_trait]
impl Storage for SqlStorage {
    async fn put(
        &self,
        key: &str,
        reader: BlobReader,
        size_hint: Option<u64>,
        content_type: Option<&str>,
        metadata: Metadata,
    ) -> StorageResult<Blob> {
        self.save(key, reader, size_hint, content_type, metadata).await
    }

    async fn multipart_put(
        &self,
        key: &str,
        reader: BlobReader,
        _part_size: u64,
        content_type: Option<&str>,
        metadata: Metadata,
    ) -> StorageResult<Blob> {
        // A single row is the unit of atomicity; parts are not stored separately
        self.save(key, reader, None, content_type, metadata).await
    }

    async fn get(&self, key: &str, range: Option<ByteRange>) -> StorageResult<(Blob, BlobStream)> {
        let start = std::time::Instant::now();
        let statement = format!(
            "SELECT key, size, etag, content_type, last_modified, metadata_json, data \
             FROM {} WHERE key = ?",
            self.table
        );

        let row = sqlx::query_as::<_, BlobDataRow>(&statement)
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx_error(e, key))?
            .ok_or_else(|| StorageError::NotFound(key.to_string()))?;

        let blob = row.meta.into_blob()?;
        let body = apply_range(Bytes::from(row.data), range)?;

        tracing::info!(
            table = %self.table,
            key = %key,
            size_bytes = body.len(),
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Relational storage get successful"
        );

        let chunks: Vec<StorageResult<Bytes>> = if body.is_empty() {
            Vec::new()
        } else {
            vec![Ok(body)]
        };
        let stream: BlobStream = Box::pin(futures::stream::iter(chunks));
        Ok((blob, stream))
    }

    async fn list(&self, prefix: &str) -> StorageResult<Vec<Blob>> {
        let statement = format!(
            "SELECT key, size, etag, content_type, last_modified, metadata_json \
             FROM {} WHERE key GLOB ? ORDER BY key ASC",
            self.table
        );

        let rows = sqlx::query_as::<_, BlobRow>(&statement)
            .bind(glob_prefix_pattern(prefix))
            .fetch_all(&self.pool)
            .await
            .map_err(|e| map_sqlx_error(e, prefix))?;

        rows.into_iter().map(BlobRow::into_blob).collect()
    }

    async fn stat(&self, key: &str) -> StorageResult<Blob> {
        let statement = format!(
            "SELECT key, size, etag, content_type, last_modified, metadata_json \
             FROM {} WHERE key = ?",
            self.table
        );

        sqlx::query_as::<_, BlobRow>(&statement)
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx_error(e, key))?
            .ok_or_else(|| StorageError::NotFound(key.to_string()))?
            .into_blob()
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        let start = std::time::Instant::now();
        let statement = format!("DELETE FROM {} WHERE key = ?", self.table);

        let result = sqlx::query(&statement)
            .bind(key)
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx_error(e, key))?;

        if result.rows_affected() == 0 {
            return Err(StorageError::NotFound(key.to_string()));
        }

        tracing::info!(
            table = %self.table,
            key = %key,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Relational storage delete successful"
        );

        Ok(())
    }

    async fn close(&self) -> StorageResult<()> {
        if self.owns_pool {
            self.pool.close().await;
        }
        Ok(())
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::Sql
    }
}
