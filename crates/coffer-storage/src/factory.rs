#[cfg(feature = "storage-s3")]
use crate::{S3Config, S3Storage};
#[cfg(feature = "storage-sql")]
use crate::{SqlStorage, SqlStorageConfig};
use crate::{Storage, StorageBackend, StorageError, StorageResult};
use coffer_core::CofferConfig;
use std::sync::Arc;

/// Create a storage backend based on configuration
pub async fn create_storage(config: &CofferConfig) -> StorageResult<Arc<dyn Storage>> {
    match config.storage_backend {
        #[cfg(feature = "storage-sql")]
        StorageBackend::Sql => {
            let storage = SqlStorage::connect(SqlStorageConfig {
                url: config.object_storage_url.clone(),
                table: config.object_storage_table.clone(),
                allow_overwrite: config.object_storage_allow_overwrite,
                max_connections: config.db_max_connections,
                acquire_timeout: std::time::Duration::from_secs(config.db_timeout_seconds),
            })
            .await?;
            Ok(Arc::new(storage))
        }

        #[cfg(not(feature = "storage-sql"))]
        StorageBackend::Sql => Err(StorageError::ConfigError(
            "SQL storage backend not available (storage-sql feature not enabled)".to_string(),
        )),

        #[cfg(feature = "storage-s3")]
        StorageBackend::S3 => {
            let bucket = config
                .s3_bucket
                .clone()
                .ok_or_else(|| StorageError::ConfigError("S3_BUCKET not configured".to_string()))?;

            let storage = S3Storage::new(S3Config {
                bucket,
                region: config.s3_region.clone(),
                endpoint_url: config.s3_endpoint_url(),
                access_key_id: config.s3_access_key_id.clone(),
                secret_access_key: config.s3_secret_access_key.clone(),
            })
            .await?;
            Ok(Arc::new(storage))
        }

        #[cfg(not(feature = "storage-s3"))]
        StorageBackend::S3 => Err(StorageError::ConfigError(
            "S3 storage backend not available (storage-s3 feature not enabled)".to_string(),
        )),
    }
}
