//! Configuration module
//!
//! Environment-driven configuration for the storage backends, the catalog
//! database and the transfer layer. The resulting [`CofferConfig`] is handed
//! to constructors explicitly; nothing here is process-global.

use std::env;
use std::str::FromStr;

use crate::constants::{
    MULTIPART_PART_SIZE_BYTES, MULTIPART_THRESHOLD_BYTES, OPAQUE_ID_LENGTH, RESERVE_MAX_ATTEMPTS,
    S3_MIN_PART_SIZE_BYTES,
};
use crate::storage_types::StorageBackend;

// Common constants
const MAX_CONNECTIONS: u32 = 5;
const CONNECTION_TIMEOUT_SECS: u64 = 30;
const DEFAULT_OBJECT_STORAGE_URL: &str = "sqlite://object_storage.db";
const DEFAULT_OBJECT_STORAGE_TABLE: &str = "objects";
const DEFAULT_CATALOG_DATABASE_URL: &str = "sqlite://index.db";
const DEFAULT_S3_REGION: &str = "auto";
const MIB: u64 = 1024 * 1024;

/// Application configuration
#[derive(Clone, Debug)]
pub struct CofferConfig {
    pub storage_backend: StorageBackend,
    // Relational backend
    pub object_storage_url: String,
    pub object_storage_table: String,
    pub object_storage_allow_overwrite: bool,
    // Catalog
    pub catalog_database_url: String,
    pub db_max_connections: u32,
    pub db_timeout_seconds: u64,
    // Remote backend
    pub s3_bucket: Option<String>,
    pub s3_region: String,
    pub s3_endpoint: Option<String>, // Custom endpoint for S3-compatible providers (MinIO, R2, etc.)
    pub s3_account_id: Option<String>,
    pub s3_access_key_id: Option<String>,
    pub s3_secret_access_key: Option<String>,
    // Transfer
    pub multipart_threshold_bytes: u64,
    pub multipart_part_size_bytes: u64,
    pub opaque_id_length: usize,
    pub reserve_max_attempts: u32,
}

impl Default for CofferConfig {
    fn default() -> Self {
        Self {
            storage_backend: StorageBackend::Sql,
            object_storage_url: DEFAULT_OBJECT_STORAGE_URL.to_string(),
            object_storage_table: DEFAULT_OBJECT_STORAGE_TABLE.to_string(),
            object_storage_allow_overwrite: true,
            catalog_database_url: DEFAULT_CATALOG_DATABASE_URL.to_string(),
            db_max_connections: MAX_CONNECTIONS,
            db_timeout_seconds: CONNECTION_TIMEOUT_SECS,
            s3_bucket: None,
            s3_region: DEFAULT_S3_REGION.to_string(),
            s3_endpoint: None,
            s3_account_id: None,
            s3_access_key_id: None,
            s3_secret_access_key: None,
            multipart_threshold_bytes: MULTIPART_THRESHOLD_BYTES,
            multipart_part_size_bytes: MULTIPART_PART_SIZE_BYTES,
            opaque_id_length: OPAQUE_ID_LENGTH,
            reserve_max_attempts: RESERVE_MAX_ATTEMPTS,
        }
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|s| !s.trim().is_empty())
}

fn parsed_var<T: FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(default)
}

fn parse_bool(name: &str, value: &str) -> anyhow::Result<bool> {
    match value.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        other => Err(anyhow::anyhow!("{} must be a boolean, got '{}'", name, other)),
    }
}

fn bool_var(name: &str, default: bool) -> anyhow::Result<bool> {
    match non_empty_var(name) {
        Some(value) => parse_bool(name, &value),
        None => Ok(default),
    }
}

fn mebibytes(name: &str, value: u64) -> anyhow::Result<u64> {
    value
        .checked_mul(MIB)
        .ok_or_else(|| anyhow::anyhow!("{} is too large: {} MiB", name, value))
}

fn mebibytes_var(name: &str, default_bytes: u64) -> anyhow::Result<u64> {
    mebibytes(name, parsed_var(name, default_bytes / MIB))
}

impl CofferConfig {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();

        let defaults = Self::default();

        let storage_backend = match non_empty_var("STORAGE_BACKEND") {
            Some(value) => value.parse()?,
            None => defaults.storage_backend,
        };

        let config = CofferConfig {
            storage_backend,
            object_storage_url: non_empty_var("OBJECT_STORAGE_URL")
                .unwrap_or(defaults.object_storage_url),
            object_storage_table: non_empty_var("OBJECT_STORAGE_TABLE")
                .unwrap_or(defaults.object_storage_table),
            object_storage_allow_overwrite: bool_var(
                "OBJECT_STORAGE_ALLOW_OVERWRITE",
                defaults.object_storage_allow_overwrite,
            )?,
            catalog_database_url: non_empty_var("CATALOG_DATABASE_URL")
                .unwrap_or(defaults.catalog_database_url),
            db_max_connections: parsed_var("DB_MAX_CONNECTIONS", MAX_CONNECTIONS),
            db_timeout_seconds: parsed_var("DB_TIMEOUT_SECONDS", CONNECTION_TIMEOUT_SECS),
            s3_bucket: non_empty_var("S3_BUCKET"),
            s3_region: non_empty_var("S3_REGION").unwrap_or(defaults.s3_region),
            s3_endpoint: non_empty_var("S3_ENDPOINT"),
            s3_account_id: non_empty_var("S3_ACCOUNT_ID"),
            s3_access_key_id: non_empty_var("S3_ACCESS_KEY_ID"),
            s3_secret_access_key: non_empty_var("S3_SECRET_ACCESS_KEY"),
            multipart_threshold_bytes: mebibytes_var(
                "MULTIPART_THRESHOLD_MB",
                MULTIPART_THRESHOLD_BYTES,
            )?,
            multipart_part_size_bytes: mebibytes_var(
                "MULTIPART_PART_SIZE_MB",
                MULTIPART_PART_SIZE_BYTES,
            )?,
            opaque_id_length: parsed_var("OPAQUE_ID_LENGTH", OPAQUE_ID_LENGTH),
            reserve_max_attempts: parsed_var("RESERVE_MAX_ATTEMPTS", RESERVE_MAX_ATTEMPTS),
        };

        config.validate()?;
        Ok(config)
    }

    /// Endpoint the remote backend should talk to.
    ///
    /// An explicit endpoint wins; otherwise an account id derives the
    /// Cloudflare R2 endpoint; otherwise the AWS default endpoint is used.
    pub fn s3_endpoint_url(&self) -> Option<String> {
        self.s3_endpoint.clone().or_else(|| {
            self.s3_account_id
                .as_ref()
                .map(|id| format!("https://{}.r2.cloudflarestorage.com", id))
        })
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.opaque_id_length == 0 {
            return Err(anyhow::anyhow!("OPAQUE_ID_LENGTH must be at least 1"));
        }

        if self.reserve_max_attempts == 0 {
            return Err(anyhow::anyhow!("RESERVE_MAX_ATTEMPTS must be at least 1"));
        }

        if self.multipart_part_size_bytes == 0 {
            return Err(anyhow::anyhow!("MULTIPART_PART_SIZE_MB must be at least 1"));
        }

        if self.multipart_threshold_bytes < self.multipart_part_size_bytes {
            return Err(anyhow::anyhow!(
                "MULTIPART_THRESHOLD_MB must not be smaller than MULTIPART_PART_SIZE_MB"
            ));
        }

        if self.catalog_database_url.trim().is_empty() {
            return Err(anyhow::anyhow!("CATALOG_DATABASE_URL must be set"));
        }

        match self.storage_backend {
            StorageBackend::Sql => {
                if self.object_storage_url.trim().is_empty() {
                    return Err(anyhow::anyhow!(
                        "OBJECT_STORAGE_URL must be set when using the sql storage backend"
                    ));
                }
            }
            StorageBackend::S3 => {
                if self.s3_bucket.is_none() {
                    return Err(anyhow::anyhow!(
                        "S3_BUCKET must be set when using the s3 storage backend"
                    ));
                }
                if self.s3_access_key_id.is_some() != self.s3_secret_access_key.is_some() {
                    return Err(anyhow::anyhow!(
                        "S3_ACCESS_KEY_ID and S3_SECRET_ACCESS_KEY must be set together"
                    ));
                }
                if self.multipart_part_size_bytes < S3_MIN_PART_SIZE_BYTES {
                    return Err(anyhow::anyhow!(
                        "MULTIPART_PART_SIZE_MB must be at least 5 for the s3 storage backend"
                    ));
                }
            }
        }

        Ok(())
    }
}
