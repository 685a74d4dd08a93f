//! Upload and download orchestration.
//!
//! Uploads insert the catalog row first and write the blob second; removals
//! delete the catalog row first and the blob second. Neither pair is atomic.
//! A crash between the two steps of an upload leaves a catalog row without a
//! blob, and a failed blob delete after a removed row leaves an orphaned blob
//! that is reported back to the caller.

use crate::identity::{generate_id, next_free_path, validate_id};
use crate::key_resolution::{parse_key, KeyForm};
use crate::types::{Download, RemoveOutcome, TransferConfig, UploadOutcome, UploadRequest};
use coffer_core::constants::{META_CATALOG_ID, META_OWNER};
use coffer_core::{
    ByteRange, CatalogEntry, CatalogListing, CofferConfig, CofferError, CofferResult, Metadata,
    NewCatalogEntry,
};
use coffer_db::{CatalogError, CatalogRepository};
use coffer_storage::keys::{normalize_logical_path, physical_key, validate_owner};
use coffer_storage::{create_storage, BlobReader, Storage, StorageError};
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};
use subtle::ConstantTimeEq;

/// Orchestrates the catalog and one storage backend.
#[derive(Clone)]
pub struct TransferService {
    catalog: CatalogRepository,
    storage: Arc<dyn Storage>,
    config: TransferConfig,
}

impl TransferService {
    pub fn new(catalog: CatalogRepository, storage: Arc<dyn Storage>, config: TransferConfig) -> Self {
        Self {
            catalog,
            storage,
            config,
        }
    }

    /// Open the catalog and the configured backend.
    pub async fn from_config(config: &CofferConfig) -> CofferResult<Self> {
        let catalog = CatalogRepository::connect(
            &config.catalog_database_url,
            config.db_max_connections,
            Duration::from_secs(config.db_timeout_seconds),
        )
        .await?;
        let storage = create_storage(config).await?;

        tracing::info!(
            backend = %storage.backend_type(),
            multipart_threshold_bytes = config.multipart_threshold_bytes,
            "Transfer service initialized"
        );

        Ok(Self::new(catalog, storage, TransferConfig::from(config)))
    }

    pub fn catalog(&self) -> &CatalogRepository {
        &self.catalog
    }

    pub fn storage(&self) -> &Arc<dyn Storage> {
        &self.storage
    }

    /// Reserve an identity for the upload, then write the body to the backend.
    ///
    /// A taken logical path is replaced by the first free `path_<n>`. If the
    /// backend write fails the reservation is deleted again.
    #[tracing::instrument(skip(self, request, body), fields(owner = %request.owner))]
    pub async fn upload(&self, request: UploadRequest, body: BlobReader) -> CofferResult<UploadOutcome> {
        let start = Instant::now();

        validate_owner(&request.owner)?;
        let desired_path = normalize_logical_path(&request.logical_path)?;
        if let Some(id) = &request.id {
            validate_id(id)?;
        }
        let password = request.password.clone().unwrap_or_default();

        let entry = self
            .reserve(&request.owner, request.id.as_deref(), &desired_path, password)
            .await?;

        let mut metadata = Metadata::new();
        metadata.insert(META_CATALOG_ID.to_string(), entry.id.clone());
        metadata.insert(META_OWNER.to_string(), entry.owner.clone());

        let content_type = request.content_type.as_deref();
        let written = match request.size_hint {
            Some(size) if size <= self.config.multipart_threshold_bytes => {
                self.storage
                    .put(&entry.physical_key, body, Some(size), content_type, metadata)
                    .await
            }
            // Unknown sizes cannot be shown to fit under the threshold
            _ => {
                self.storage
                    .multipart_put(
                        &entry.physical_key,
                        body,
                        self.config.multipart_part_size_bytes,
                        content_type,
                        metadata,
                    )
                    .await
            }
        };

        let blob = match written {
            Ok(blob) => blob,
            Err(err) => {
                self.release_reservation(&entry).await;
                return Err(err.into());
            }
        };

        tracing::info!(
            owner = %entry.owner,
            id = %entry.id,
            logical_path = %entry.logical_path,
            key = %entry.physical_key,
            size_bytes = blob.size,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Upload successful"
        );

        Ok(UploadOutcome {
            id: entry.id,
            logical_path: entry.logical_path,
            blob,
        })
    }

    /// Insert the catalog row, probing for a free path and regenerating ids.
    ///
    /// Concurrent uploads of the same path may pick the same suffix; the
    /// losing insert fails the uniqueness check and the probe runs again.
    /// A path whose key already holds a blob without a catalog row is
    /// skipped as well.
    async fn reserve(
        &self,
        owner: &str,
        requested_id: Option<&str>,
        desired_path: &str,
        password: String,
    ) -> CofferResult<CatalogEntry> {
        let mut occupied = HashSet::new();

        for attempt in 1..=self.config.reserve_max_attempts {
            let id = match requested_id {
                Some(id) => id.to_string(),
                None => generate_id(self.config.opaque_id_length)?,
            };
            let mut existing = self.catalog.existing_paths(owner, desired_path).await?;
            existing.extend(occupied.iter().cloned());
            let logical_path = next_free_path(desired_path, &existing);

            let result = self
                .catalog
                .insert(NewCatalogEntry {
                    id,
                    owner: owner.to_string(),
                    physical_key: physical_key(owner, &logical_path),
                    logical_path,
                    password: password.clone(),
                })
                .await;

            match result {
                Ok(entry) => match self.storage.stat(&entry.physical_key).await {
                    Err(StorageError::NotFound(_)) => return Ok(entry),
                    Ok(_) => {
                        tracing::warn!(
                            owner = %owner,
                            key = %entry.physical_key,
                            attempt,
                            "Key holds a blob without a catalog entry, trying the next path"
                        );
                        self.release_reservation(&entry).await;
                        occupied.insert(entry.logical_path);
                    }
                    Err(err) => {
                        self.release_reservation(&entry).await;
                        return Err(err.into());
                    }
                },
                Err(CatalogError::DuplicatePath { path, .. }) => {
                    tracing::debug!(owner = %owner, path = %path, attempt, "Logical path taken, probing again");
                }
                Err(CatalogError::DuplicateId(id)) if requested_id.is_none() => {
                    tracing::debug!(owner = %owner, id = %id, attempt, "Generated id collided, regenerating");
                }
                Err(err) => return Err(err.into()),
            }
        }

        Err(CofferError::Conflict(format!(
            "could not reserve {}/{} after {} attempts",
            owner, desired_path, self.config.reserve_max_attempts
        )))
    }

    async fn release_reservation(&self, entry: &CatalogEntry) {
        if let Err(err) = self.catalog.delete_by_id(&entry.owner, &entry.id).await {
            tracing::warn!(
                error = %err,
                owner = %entry.owner,
                id = %entry.id,
                "Failed to release catalog reservation"
            );
        }
    }

    /// Resolve a caller key to its catalog entry.
    pub async fn resolve(&self, key: &str) -> CofferResult<CatalogEntry> {
        let found = match parse_key(key)? {
            KeyForm::Id(id) => self.catalog.get_by_id(&id).await?,
            KeyForm::Ambiguous { owner, segment } => {
                match self.catalog.get_by_id(&segment).await? {
                    Some(entry) if entry.owner == owner => Some(entry),
                    _ => self.catalog.get_by_owner_path(&owner, &segment).await?,
                }
            }
            KeyForm::Path { owner, path } => {
                let path = normalize_logical_path(&path)?;
                self.catalog.get_by_owner_path(&owner, &path).await?
            }
        };

        found.ok_or_else(|| CofferError::NotFound(key.to_string()))
    }

    /// Resolve `key`, check the password and open the blob body.
    ///
    /// A wrong password on an existing entry is `Unauthorized`, which reveals
    /// that the entry exists.
    #[tracing::instrument(skip(self, password))]
    pub async fn download(
        &self,
        key: &str,
        password: Option<&str>,
        range: Option<ByteRange>,
    ) -> CofferResult<Download> {
        let entry = self.resolve(key).await?;

        if entry.has_password() {
            let supplied = password.unwrap_or_default();
            let matches: bool = entry.password.as_bytes().ct_eq(supplied.as_bytes()).into();
            if !matches {
                tracing::warn!(id = %entry.id, owner = %entry.owner, "Download rejected: password mismatch");
                return Err(CofferError::Unauthorized(key.to_string()));
            }
        }

        let (blob, body) = self.storage.get(&entry.physical_key, range).await?;

        tracing::debug!(
            id = %entry.id,
            key = %entry.physical_key,
            size_bytes = blob.size,
            "Download started"
        );

        Ok(Download { entry, blob, body })
    }

    /// The owner's catalog entries, oldest first.
    pub async fn list(&self, owner: &str) -> CofferResult<Vec<CatalogListing>> {
        validate_owner(owner)?;
        Ok(self.catalog.list_by_owner(owner).await?)
    }

    /// Remove each id of `owner`, reporting one outcome per id.
    ///
    /// The catalog row goes first. A blob that is already gone counts as
    /// removed; any other blob delete failure leaves the blob orphaned and is
    /// reported as a failure for that id.
    #[tracing::instrument(skip(self, ids), fields(count = ids.len()))]
    pub async fn remove(&self, owner: &str, ids: &[String]) -> BTreeMap<String, RemoveOutcome> {
        let mut outcomes = BTreeMap::new();

        for id in ids {
            let outcome = match self.catalog.delete_by_id(owner, id).await {
                Err(err) => RemoveOutcome::Failed(CofferError::from(err).to_string()),
                Ok(entry) => match self.storage.delete(&entry.physical_key).await {
                    Ok(()) => RemoveOutcome::Removed,
                    Err(StorageError::NotFound(key)) => {
                        tracing::warn!(id = %id, key = %key, "Catalog entry removed; blob was already missing");
                        RemoveOutcome::Removed
                    }
                    Err(err) => {
                        tracing::error!(
                            error = %err,
                            id = %id,
                            key = %entry.physical_key,
                            "Catalog entry removed but blob delete failed; blob is orphaned"
                        );
                        RemoveOutcome::Failed(format!(
                            "catalog entry removed but blob delete failed: {}",
                            CofferError::from(err)
                        ))
                    }
                },
            };
            outcomes.insert(id.clone(), outcome);
        }

        outcomes
    }

    /// Close the backend and the catalog pool.
    pub async fn close(&self) -> CofferResult<()> {
        self.storage.close().await?;
        self.catalog.close().await;
        Ok(())
    }
}
