//! CommandStore interface tests.
//!
//! Replies are checked by their byte rendering, which is what later commands
//! in a chain observe. The hash reply differs between backends and is not
//! part of the contract.

use logfold::storage::CommandStore;

pub async fn test_list_append_reports_length<S: CommandStore>(store: &S, prefix: &str) {
    let key = format!("{prefix}:list");

    let first = store.list_append(&key, b"a").await.expect("append should succeed");
    let second = store.list_append(&key, b"b").await.unwrap();

    assert_eq!(first.to_bytes(), b"1");
    assert_eq!(second.to_bytes(), b"2");
}

pub async fn test_assign_reports_ok<S: CommandStore>(store: &S, prefix: &str) {
    let key = format!("{prefix}:value");

    let reply = store.assign(&key, b"v").await.expect("assign should succeed");

    assert_eq!(reply.to_bytes(), b"OK");
}

pub async fn test_hash_set_succeeds<S: CommandStore>(store: &S, prefix: &str) {
    let key = format!("{prefix}:hash");

    let reply = store
        .hash_set(&key, "field", b"v")
        .await
        .expect("hash_set should succeed");

    assert!(!reply.is_nil());
}

pub async fn test_sorted_set_incr_accumulates<S: CommandStore>(store: &S, prefix: &str) {
    let key = format!("{prefix}:zset");

    store.sorted_set_incr(&key, b"m", 1.0).await.unwrap();
    let reply = store.sorted_set_incr(&key, b"m", 1.0).await.unwrap();

    assert_eq!(reply.to_bytes(), b"2");
}

/// Run all CommandStore tests against an implementation.
#[macro_export]
macro_rules! run_command_store_tests {
    ($store:expr, $prefix:expr) => {
        use $crate::storage::command_store_tests::*;

        test_list_append_reports_length($store, $prefix).await;
        println!("  test_list_append_reports_length: PASSED");

        test_assign_reports_ok($store, $prefix).await;
        println!("  test_assign_reports_ok: PASSED");

        test_hash_set_succeeds($store, $prefix).await;
        println!("  test_hash_set_succeeds: PASSED");

        test_sorted_set_incr_accumulates($store, $prefix).await;
        println!("  test_sorted_set_incr_accumulates: PASSED");
    };
}
