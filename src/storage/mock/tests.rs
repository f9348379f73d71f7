use crate::storage::{CommandStore, CursorStore, Reply, StorageError};

use super::*;

#[tokio::test]
async fn test_mock_cursor_store_get_missing() {
    let store = MockCursorStore::new();
    let err = store.get("subjects", 0).await.unwrap_err();
    assert!(matches!(
        err,
        StorageError::CursorNotFound { partition: 0, .. }
    ));
}

#[tokio::test]
async fn test_mock_cursor_store_set_if_absent_only_once() {
    let store = MockCursorStore::new();

    assert!(store.set_if_absent("subjects", 1, 0).await.unwrap());
    store.set("subjects", 1, 12).await.unwrap();
    assert!(!store.set_if_absent("subjects", 1, 0).await.unwrap());

    assert_eq!(store.get("subjects", 1).await.unwrap(), 12);
    assert_eq!(store.commits("subjects", 1).await, vec![12]);
}

#[tokio::test]
async fn test_mock_cursor_store_fail_toggles() {
    let store = MockCursorStore::new();
    store.set_fail_on_set(true).await;
    assert!(store.set("subjects", 0, 1).await.is_err());
    assert!(store.set_if_absent("subjects", 0, 0).await.is_err());

    store.set_fail_on_set(false).await;
    store.set("subjects", 0, 1).await.unwrap();
    store.set_fail_on_get(true).await;
    assert!(store.get("subjects", 0).await.is_err());
    assert!(store.list().await.is_err());
}

#[tokio::test]
async fn test_mock_command_store_replies() {
    let store = MockCommandStore::new();

    assert_eq!(
        store.list_append("subject:news", b"a").await.unwrap(),
        Reply::Int(1)
    );
    assert_eq!(
        store.list_append("subject:news", b"b").await.unwrap(),
        Reply::Int(2)
    );
    assert_eq!(
        store.hash_set("subject:news", "Inverted:x", b"2").await.unwrap(),
        Reply::Bytes(b"2".to_vec())
    );
    assert_eq!(
        store.hash_set("subject:news", "Inverted:x", b"3").await.unwrap(),
        Reply::Bytes(b"2".to_vec())
    );
    assert_eq!(
        store.assign("latest", b"x").await.unwrap(),
        Reply::Status("OK".to_string())
    );
    assert_eq!(
        store.sorted_set_incr("rank", b"x", 1.0).await.unwrap(),
        Reply::Float(1.0)
    );
    assert_eq!(
        store.sorted_set_incr("rank", b"x", 1.0).await.unwrap(),
        Reply::Float(2.0)
    );

    assert_eq!(store.call_count().await, 7);
    assert_eq!(store.list("subject:news").await, vec![b"a".to_vec(), b"b".to_vec()]);
    assert_eq!(
        store.hash_field("subject:news", "Inverted:x").await,
        Some(b"3".to_vec())
    );
    assert_eq!(store.value("latest").await, Some(b"x".to_vec()));
    assert_eq!(store.score("rank", b"x").await, Some(2.0));
}

#[tokio::test]
async fn test_mock_command_store_fail_on_call() {
    let store = MockCommandStore::new();
    store.set_fail_on_call(Some(1)).await;

    store.list_append("k", b"a").await.unwrap();
    let err = store.list_append("k", b"b").await.unwrap_err();
    assert!(matches!(err, StorageError::Backend(_)));

    // The failed call is recorded but has no effect.
    assert_eq!(store.call_count().await, 2);
    assert_eq!(store.list("k").await.len(), 1);
}
