//! CursorStore interface tests.
//!
//! These tests verify the contract of the CursorStore trait.
//! Each storage implementation should run these tests. Stream names are
//! prefixed so runs against a shared server do not collide.

use logfold::storage::{CursorStore, StorageError};

// =============================================================================
// CursorStore::get tests
// =============================================================================

pub async fn test_get_missing<S: CursorStore>(store: &S, prefix: &str) {
    let stream = format!("{prefix}.missing");

    let result = store.get(&stream, 0).await;

    assert!(
        matches!(result, Err(StorageError::CursorNotFound { .. })),
        "missing cursor should be CursorNotFound, got {:?}",
        result
    );
}

// =============================================================================
// CursorStore::set_if_absent tests
// =============================================================================

pub async fn test_set_if_absent_creates<S: CursorStore>(store: &S, prefix: &str) {
    let stream = format!("{prefix}.create");

    let created = store
        .set_if_absent(&stream, 0, 0)
        .await
        .expect("set_if_absent should succeed");

    assert!(created, "first set_if_absent should create the record");
    assert_eq!(store.get(&stream, 0).await.unwrap(), 0);
}

pub async fn test_set_if_absent_never_overwrites<S: CursorStore>(store: &S, prefix: &str) {
    let stream = format!("{prefix}.keep");

    store.set_if_absent(&stream, 1, 0).await.unwrap();
    store.set(&stream, 1, 17).await.unwrap();

    let created = store.set_if_absent(&stream, 1, 0).await.unwrap();

    assert!(!created, "existing record must not be recreated");
    assert_eq!(
        store.get(&stream, 1).await.unwrap(),
        17,
        "existing offset must survive a repeated initialization"
    );
}

// =============================================================================
// CursorStore::set tests
// =============================================================================

pub async fn test_set_and_get<S: CursorStore>(store: &S, prefix: &str) {
    let stream = format!("{prefix}.set");

    store.set(&stream, 0, 42).await.expect("set should succeed");
    assert_eq!(store.get(&stream, 0).await.unwrap(), 42);

    store.set(&stream, 0, 43).await.unwrap();
    assert_eq!(store.get(&stream, 0).await.unwrap(), 43);
}

pub async fn test_partition_isolation<S: CursorStore>(store: &S, prefix: &str) {
    let stream = format!("{prefix}.iso");

    store.set(&stream, 0, 5).await.unwrap();
    store.set(&stream, 1, 9).await.unwrap();

    assert_eq!(store.get(&stream, 0).await.unwrap(), 5);
    assert_eq!(store.get(&stream, 1).await.unwrap(), 9);
    assert!(store.get(&stream, 2).await.is_err());
}

// =============================================================================
// CursorStore::list tests
// =============================================================================

pub async fn test_list_includes_every_record<S: CursorStore>(store: &S, prefix: &str) {
    let stream = format!("{prefix}:with:colons");

    store.set(&stream, 0, 3).await.unwrap();
    store.set(&stream, 11, 8).await.unwrap();

    let mut mine: Vec<(i32, i64)> = store
        .list()
        .await
        .expect("list should succeed")
        .into_iter()
        .filter(|c| c.stream == stream)
        .map(|c| (c.partition, c.offset))
        .collect();
    mine.sort();

    assert_eq!(mine, vec![(0, 3), (11, 8)]);
}

/// Run all CursorStore tests against an implementation.
#[macro_export]
macro_rules! run_cursor_store_tests {
    ($store:expr, $prefix:expr) => {
        use $crate::storage::cursor_store_tests::*;

        test_get_missing($store, $prefix).await;
        println!("  test_get_missing: PASSED");

        test_set_if_absent_creates($store, $prefix).await;
        println!("  test_set_if_absent_creates: PASSED");

        test_set_if_absent_never_overwrites($store, $prefix).await;
        println!("  test_set_if_absent_never_overwrites: PASSED");

        test_set_and_get($store, $prefix).await;
        println!("  test_set_and_get: PASSED");

        test_partition_isolation($store, $prefix).await;
        println!("  test_partition_isolation: PASSED");

        test_list_includes_every_record($store, $prefix).await;
        println!("  test_list_includes_every_record: PASSED");
    };
}
