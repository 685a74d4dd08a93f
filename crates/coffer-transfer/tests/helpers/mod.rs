use async_trait::async_trait;
use coffer_core::{Blob, ByteRange, Metadata, StorageBackend};
use coffer_db::CatalogRepository;
use coffer_storage::{
    BlobReader, BlobStream, SqlStorage, SqlStorageConfig, Storage, StorageError, StorageResult,
};
use coffer_transfer::{TransferConfig, TransferService};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

/// Which write path a storage call took.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteCall {
    Put,
    Multipart { part_size: u64 },
}

/// Relational storage that records write calls and can be told to fail them.
pub struct InstrumentedStorage {
    inner: SqlStorage,
    pub writes: Mutex<Vec<WriteCall>>,
    pub fail_writes: bool,
    pub fail_deletes: bool,
}

#[async_trait]
impl Storage for InstrumentedStorage {
    async fn put(
        &self,
        key: &str,
        reader: BlobReader,
        size_hint: Option<u64>,
        content_type: Option<&str>,
        metadata: Metadata,
    ) -> StorageResult<Blob> {
        self.writes.lock().unwrap().push(WriteCall::Put);
        if self.fail_writes {
            return Err(StorageError::Transient("backend unavailable".to_string()));
        }
        self.inner
            .put(key, reader, size_hint, content_type, metadata)
            .await
    }

    async fn multipart_put(
        &self,
        key: &str,
        reader: BlobReader,
        part_size: u64,
        content_type: Option<&str>,
        metadata: Metadata,
    ) -> StorageResult<Blob> {
        self.writes
            .lock()
            .unwrap()
            .push(WriteCall::Multipart { part_size });
        if self.fail_writes {
            return Err(StorageError::Transient("backend unavailable".to_string()));
        }
        self.inner
            .multipart_put(key, reader, part_size, content_type, metadata)
            .await
    }

    async fn get(&self, key: &str, range: Option<ByteRange>) -> StorageResult<(Blob, BlobStream)> {
        self.inner.get(key, range).await
    }

    async fn list(&self, prefix: &str) -> StorageResult<Vec<Blob>> {
        self.inner.list(prefix).await
    }

    async fn stat(&self, key: &str) -> StorageResult<Blob> {
        self.inner.stat(key).await
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        if self.fail_deletes {
            return Err(StorageError::Transient("backend unavailable".to_string()));
        }
        self.inner.delete(key).await
    }

    async fn close(&self) -> StorageResult<()> {
        self.inner.close().await
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::Sql
    }
}

pub struct TestContext {
    pub service: TransferService,
    pub storage: Arc<InstrumentedStorage>,
    _dir: TempDir,
}

#[derive(Default)]
pub struct Options {
    pub fail_writes: bool,
    pub fail_deletes: bool,
    /// Backend overwrite policy; the relational default when unset.
    pub allow_overwrite: Option<bool>,
    pub config: Option<TransferConfig>,
}

pub async fn setup(options: Options) -> TestContext {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let catalog_url = format!("sqlite://{}", dir.path().join("index.db").display());
    let objects_url = format!("sqlite://{}", dir.path().join("objects.db").display());

    let catalog = CatalogRepository::connect(&catalog_url, 2, Duration::from_secs(5))
        .await
        .expect("Failed to open catalog");
    let mut storage_config = SqlStorageConfig::new(objects_url);
    if let Some(allow_overwrite) = options.allow_overwrite {
        storage_config.allow_overwrite = allow_overwrite;
    }
    let inner = SqlStorage::connect(storage_config)
        .await
        .expect("Failed to open storage");

    let storage = Arc::new(InstrumentedStorage {
        inner,
        writes: Mutex::new(Vec::new()),
        fail_writes: options.fail_writes,
        fail_deletes: options.fail_deletes,
    });
    let service = TransferService::new(
        catalog,
        storage.clone(),
        options.config.unwrap_or_default(),
    );

    TestContext {
        service,
        storage,
        _dir: dir,
    }
}

pub async fn default_setup() -> TestContext {
    setup(Options::default()).await
}

pub fn reader(data: &[u8]) -> BlobReader {
    Box::pin(std::io::Cursor::new(data.to_vec()))
}
