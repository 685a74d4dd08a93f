use coffer_core::NewCatalogEntry;
use coffer_db::{CatalogError, CatalogRepository};
use std::time::Duration;
use tempfile::TempDir;

async fn setup_catalog() -> (CatalogRepository, TempDir) {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let url = format!("sqlite://{}", dir.path().join("index.db").display());
    let repo = CatalogRepository::connect(&url, 2, Duration::from_secs(5))
        .await
        .expect("Failed to open catalog");
    (repo, dir)
}

fn new_entry(id: &str, owner: &str, path: &str, password: &str) -> NewCatalogEntry {
    NewCatalogEntry {
        id: id.to_string(),
        owner: owner.to_string(),
        logical_path: path.to_string(),
        password: password.to_string(),
        physical_key: format!("{}/{}", owner, path),
    }
}

#[tokio::test]
async fn test_insert_and_lookup() {
    let (repo, _dir) = setup_catalog().await;

    let created = repo
        .insert(new_entry("K7x9", "alice", "notes/todo", "p1"))
        .await
        .unwrap();
    assert_eq!(created.physical_key, "alice/notes/todo");
    assert!(created.has_password());

    let by_id = repo.get_by_id("K7x9").await.unwrap().unwrap();
    assert_eq!(by_id, created);

    let by_path = repo
        .get_by_owner_path("alice", "notes/todo")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(by_path.id, "K7x9");

    assert!(repo.get_by_id("nope").await.unwrap().is_none());
    assert!(repo
        .get_by_owner_path("bob", "notes/todo")
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn test_duplicate_id_is_reported() {
    let (repo, _dir) = setup_catalog().await;
    repo.insert(new_entry("K7x9", "alice", "a", "")).await.unwrap();

    let err = repo
        .insert(new_entry("K7x9", "bob", "b", ""))
        .await
        .unwrap_err();
    assert!(matches!(err, CatalogError::DuplicateId(id) if id == "K7x9"));
}

#[tokio::test]
async fn test_duplicate_path_is_reported_per_owner() {
    let (repo, _dir) = setup_catalog().await;
    repo.insert(new_entry("id01", "alice", "report", "")).await.unwrap();

    let err = repo
        .insert(new_entry("id02", "alice", "report", ""))
        .await
        .unwrap_err();
    assert!(matches!(err, CatalogError::DuplicatePath { .. }));

    // Another owner may use the same logical path
    repo.insert(new_entry("id03", "bob", "report", "")).await.unwrap();
}

#[tokio::test]
async fn test_existing_paths_covers_suffixed_variants_only() {
    let (repo, _dir) = setup_catalog().await;
    for (id, path) in [
        ("id01", "report"),
        ("id02", "report_1"),
        ("id03", "report_x"),
        ("id04", "reports"),
        ("id05", "report/2024"),
    ] {
        repo.insert(new_entry(id, "alice", path, "")).await.unwrap();
    }
    repo.insert(new_entry("id06", "bob", "report_2", "")).await.unwrap();

    let paths = repo.existing_paths("alice", "report").await.unwrap();
    let mut paths: Vec<String> = paths.into_iter().collect();
    paths.sort();
    assert_eq!(paths, vec!["report", "report_1", "report_x"]);
}

#[tokio::test]
async fn test_list_by_owner_hides_passwords() {
    let (repo, _dir) = setup_catalog().await;
    repo.insert(new_entry("id01", "alice", "one", "secret")).await.unwrap();
    repo.insert(new_entry("id02", "alice", "two", "")).await.unwrap();
    repo.insert(new_entry("id03", "bob", "three", "")).await.unwrap();

    let listing = repo.list_by_owner("alice").await.unwrap();
    assert_eq!(listing.len(), 2);
    let one = listing.iter().find(|l| l.id == "id01").unwrap();
    assert!(one.has_password);
    let two = listing.iter().find(|l| l.id == "id02").unwrap();
    assert!(!two.has_password);
}

#[tokio::test]
async fn test_delete_is_owner_scoped() {
    let (repo, _dir) = setup_catalog().await;
    repo.insert(new_entry("K7x9", "alice", "notes", "")).await.unwrap();

    let err = repo.delete_by_id("bob", "K7x9").await.unwrap_err();
    assert!(matches!(err, CatalogError::NotFound(_)));

    let removed = repo.delete_by_id("alice", "K7x9").await.unwrap();
    assert_eq!(removed.physical_key, "alice/notes");
    assert!(repo.get_by_id("K7x9").await.unwrap().is_none());

    let err = repo.delete_by_id("alice", "K7x9").await.unwrap_err();
    assert!(matches!(err, CatalogError::NotFound(_)));
}

#[tokio::test]
async fn test_migrations_are_idempotent() {
    let (repo, _dir) = setup_catalog().await;
    repo.migrate().await.unwrap();
    repo.insert(new_entry("id01", "alice", "a", "")).await.unwrap();
    repo.migrate().await.unwrap();
    assert!(repo.get_by_id("id01").await.unwrap().is_some());
}
