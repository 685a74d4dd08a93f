use coffer_core::Metadata;
use coffer_storage::{BlobReader, SqlStorage, SqlStorageConfig};
use tempfile::TempDir;

/// A relational backend on a throwaway database file.
pub struct TestStorage {
    pub storage: SqlStorage,
    // Held so the database file outlives the test
    _dir: TempDir,
}

pub async fn sql_storage(allow_overwrite: bool) -> TestStorage {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let url = format!("sqlite://{}", dir.path().join("objects.db").display());
    let storage = SqlStorage::connect(SqlStorageConfig {
        allow_overwrite,
        ..SqlStorageConfig::new(url)
    })
    .await
    .expect("Failed to open storage");

    TestStorage { storage, _dir: dir }
}

pub fn reader(data: &[u8]) -> BlobReader {
    Box::pin(std::io::Cursor::new(data.to_vec()))
}

pub fn metadata(pairs: &[(&str, &str)]) -> Metadata {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}
