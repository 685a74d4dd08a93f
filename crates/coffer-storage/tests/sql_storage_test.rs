#[path = "helpers/mod.rs"]
mod helpers;

use coffer_core::ByteRange;
use coffer_storage::{collect_stream, Storage, StorageError};
use helpers::{metadata, reader, sql_storage};

#[tokio::test]
async fn test_put_then_get_round_trips_body_and_metadata() {
    let t = sql_storage(true).await;
    let meta = metadata(&[("coffer-owner", "alice")]);

    let blob = t
        .storage
        .put("alice/notes", reader(b"hello world"), Some(11), Some("text/plain"), meta.clone())
        .await
        .unwrap();
    assert_eq!(blob.size, 11);
    assert!(!blob.etag.is_empty());

    let (fetched, body) = t.storage.get("alice/notes", None).await.unwrap();
    assert_eq!(&collect_stream(body).await.unwrap()[..], b"hello world");
    assert_eq!(fetched.size, 11);
    assert_eq!(fetched.etag, blob.etag);
    assert_eq!(fetched.content_type.as_deref(), Some("text/plain"));
    assert_eq!(fetched.metadata, meta);
}

#[tokio::test]
async fn test_ranged_get_returns_inclusive_slice_and_full_size() {
    let t = sql_storage(true).await;
    let data: Vec<u8> = (b'a'..=b'z').collect();
    t.storage
        .put("alice/alphabet", reader(&data), None, None, Default::default())
        .await
        .unwrap();

    let (blob, body) = t
        .storage
        .get("alice/alphabet", Some(ByteRange::new(5, 9)))
        .await
        .unwrap();
    assert_eq!(&collect_stream(body).await.unwrap()[..], b"fghij");
    assert_eq!(blob.size, 26);

    let (_, tail) = t
        .storage
        .get("alice/alphabet", Some(ByteRange::open(20)))
        .await
        .unwrap();
    assert_eq!(&collect_stream(tail).await.unwrap()[..], b"uvwxyz");

    let err = t
        .storage
        .get("alice/alphabet", Some(ByteRange::new(26, 30)))
        .await
        .err()
        .unwrap();
    assert!(matches!(err, StorageError::InvalidRange(_)));
}

#[tokio::test]
async fn test_etag_depends_only_on_content() {
    let t = sql_storage(true).await;
    let a = t
        .storage
        .put("alice/a", reader(b"same"), None, None, Default::default())
        .await
        .unwrap();
    let b = t
        .storage
        .put("alice/b", reader(b"same"), None, None, Default::default())
        .await
        .unwrap();
    let c = t
        .storage
        .put("alice/c", reader(b"different"), None, None, Default::default())
        .await
        .unwrap();

    assert_eq!(a.etag, b.etag);
    assert_ne!(a.etag, c.etag);
}

#[tokio::test]
async fn test_overwrite_replaces_when_allowed() {
    let t = sql_storage(true).await;
    t.storage
        .put("alice/k", reader(b"first"), None, None, Default::default())
        .await
        .unwrap();
    t.storage
        .put("alice/k", reader(b"second!"), None, None, Default::default())
        .await
        .unwrap();

    let (blob, body) = t.storage.get("alice/k", None).await.unwrap();
    assert_eq!(blob.size, 7);
    assert_eq!(&collect_stream(body).await.unwrap()[..], b"second!");
}

#[tokio::test]
async fn test_overwrite_conflicts_when_disallowed() {
    let t = sql_storage(false).await;
    t.storage
        .put("alice/k", reader(b"first"), None, None, Default::default())
        .await
        .unwrap();

    let err = t
        .storage
        .put("alice/k", reader(b"second"), None, None, Default::default())
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::Conflict(_)));

    let (_, body) = t.storage.get("alice/k", None).await.unwrap();
    assert_eq!(&collect_stream(body).await.unwrap()[..], b"first");
}

#[tokio::test]
async fn test_delete_then_stat_is_not_found() {
    let t = sql_storage(true).await;
    t.storage
        .put("alice/gone", reader(b"bye"), None, None, Default::default())
        .await
        .unwrap();

    t.storage.delete("alice/gone").await.unwrap();

    assert!(matches!(
        t.storage.stat("alice/gone").await.unwrap_err(),
        StorageError::NotFound(_)
    ));
    assert!(matches!(
        t.storage.get("alice/gone", None).await.err().unwrap(),
        StorageError::NotFound(_)
    ));
    assert!(matches!(
        t.storage.delete("alice/gone").await.unwrap_err(),
        StorageError::NotFound(_)
    ));
}

#[tokio::test]
async fn test_multipart_put_is_equivalent_to_put() {
    let t = sql_storage(true).await;
    let data = vec![42u8; 1000];

    let single = t
        .storage
        .put("alice/single", reader(&data), None, None, Default::default())
        .await
        .unwrap();
    let multi = t
        .storage
        .multipart_put("alice/multi", reader(&data), 64, None, Default::default())
        .await
        .unwrap();

    assert_eq!(multi.size, 1000);
    assert_eq!(multi.etag, single.etag);
    let (_, body) = t.storage.get("alice/multi", None).await.unwrap();
    assert_eq!(collect_stream(body).await.unwrap().to_vec(), data);
}

#[tokio::test]
async fn test_empty_blob_round_trips() {
    let t = sql_storage(true).await;
    t.storage
        .put("alice/empty", reader(b""), Some(0), None, Default::default())
        .await
        .unwrap();

    let (blob, body) = t.storage.get("alice/empty", None).await.unwrap();
    assert_eq!(blob.size, 0);
    assert!(collect_stream(body).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_list_filters_by_prefix_in_key_order() {
    let t = sql_storage(true).await;
    for key in ["bob/z", "alice/b", "alice/a", "alicia/x", "Alice/c"] {
        t.storage
            .put(key, reader(key.as_bytes()), None, None, Default::default())
            .await
            .unwrap();
    }

    let keys: Vec<String> = t
        .storage
        .list("alice/")
        .await
        .unwrap()
        .into_iter()
        .map(|b| b.key)
        .collect();
    assert_eq!(keys, vec!["alice/a", "alice/b"]);

    assert_eq!(t.storage.list("").await.unwrap().len(), 5);
    assert!(t.storage.list("carol/").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_list_treats_glob_characters_literally() {
    let t = sql_storage(true).await;
    t.storage
        .put("alice/[x]*", reader(b"1"), None, None, Default::default())
        .await
        .unwrap();
    t.storage
        .put("alice/xy", reader(b"2"), None, None, Default::default())
        .await
        .unwrap();

    let listed = t.storage.list("alice/[x]").await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].key, "alice/[x]*");
}

#[tokio::test]
async fn test_operations_fail_after_close() {
    let t = sql_storage(true).await;
    t.storage.close().await.unwrap();

    let err = t.storage.stat("alice/anything").await.unwrap_err();
    assert!(matches!(err, StorageError::Fatal(_)));
}

#[tokio::test]
async fn test_etag_is_stable_without_rewrite() {
    let t = sql_storage(true).await;
    let written = t
        .storage
        .put("alice/steady", reader(b"unchanged"), Some(9), None, Default::default())
        .await
        .unwrap();

    let first = t.storage.stat("alice/steady").await.unwrap();
    let second = t.storage.stat("alice/steady").await.unwrap();
    let (fetched, _) = t.storage.get("alice/steady", None).await.unwrap();

    assert_eq!(first.etag, written.etag);
    assert_eq!(second.etag, written.etag);
    assert_eq!(fetched.etag, written.etag);
    assert_eq!(first.last_modified, second.last_modified);
}
