use super::*;
use crate::storage::{MockCommandStore, StoreCall};

const RAW: &[u8] = br#"{"id":"s-1","category":"news"}"#;

#[tokio::test]
async fn test_calls_store_once_per_command_in_order() {
    let store = MockCommandStore::new();
    let commands = vec![
        Command::list("subjects", Source::SelfValue),
        Command::hash("subjects:idx", "s-1", Source::PreviousResult),
        Command::set("latest", Source::Literal).with_literal("s-1"),
        Command::sorted_set("categories", Source::Literal).with_literal("news"),
    ];

    let summary = execute(&commands, RAW, &store).await.unwrap();

    assert_eq!(
        summary,
        ExecutionSummary {
            executed: 4,
            skipped: 0
        }
    );
    assert_eq!(
        store.calls().await,
        vec![
            StoreCall::ListAppend {
                key: "subjects".to_string(),
                value: RAW.to_vec(),
            },
            StoreCall::HashSet {
                key: "subjects:idx".to_string(),
                field: "s-1".to_string(),
                value: b"1".to_vec(),
            },
            StoreCall::Assign {
                key: "latest".to_string(),
                value: b"s-1".to_vec(),
            },
            StoreCall::SortedSetIncr {
                key: "categories".to_string(),
                member: b"news".to_vec(),
                delta: SCORE_INCREMENT,
            },
        ]
    );
}

#[tokio::test]
async fn test_previous_result_on_first_command_is_empty() {
    let store = MockCommandStore::new();
    let commands = vec![Command::set("k", Source::PreviousResult)];

    execute(&commands, RAW, &store).await.unwrap();

    assert_eq!(store.value("k").await, Some(Vec::new()));
}

#[tokio::test]
async fn test_previous_result_chains_list_length() {
    let store = MockCommandStore::new();
    let commands = vec![
        Command::list("log", Source::SelfValue),
        Command::list("log", Source::SelfValue),
        Command::hash("index", "s-1", Source::PreviousResult),
    ];

    execute(&commands, RAW, &store).await.unwrap();

    assert_eq!(store.list("log").await.len(), 2);
    assert_eq!(store.hash_field("index", "s-1").await, Some(b"2".to_vec()));
}

#[tokio::test]
async fn test_hash_reply_is_prior_value() {
    let store = MockCommandStore::new();
    let commands = vec![
        Command::hash("h", "f", Source::Literal).with_literal("first"),
        Command::hash("h", "f", Source::Literal).with_literal("second"),
        Command::set("seen", Source::PreviousResult),
    ];

    execute(&commands, RAW, &store).await.unwrap();

    assert_eq!(store.value("seen").await, Some(b"first".to_vec()));
}

#[tokio::test]
async fn test_sorted_set_increments_by_one() {
    let store = MockCommandStore::new();
    let command = Command::sorted_set("rank", Source::Literal).with_literal("news");

    execute(&[command.clone()], RAW, &store).await.unwrap();
    execute(&[command, Command::set("score", Source::PreviousResult)], RAW, &store)
        .await
        .unwrap();

    assert_eq!(store.score("rank", b"news").await, Some(2.0));
    assert_eq!(store.value("score").await, Some(b"2".to_vec()));
}

#[tokio::test]
async fn test_unrecognized_group_skipped_and_previous_kept() {
    let store = MockCommandStore::new();
    let commands = vec![
        Command::list("log", Source::SelfValue),
        Command::new(Group::Unrecognized("STREAM".to_string()), "x", Source::SelfValue),
        Command::set("len", Source::PreviousResult),
    ];

    let summary = execute(&commands, RAW, &store).await.unwrap();

    assert_eq!(summary.executed, 2);
    assert_eq!(summary.skipped, 1);
    assert_eq!(store.call_count().await, 2);
    assert_eq!(store.value("len").await, Some(b"1".to_vec()));
}

#[tokio::test]
async fn test_storage_error_aborts_remaining_commands() {
    let store = MockCommandStore::new();
    store.set_fail_on_call(Some(1)).await;
    let commands = vec![
        Command::list("a", Source::SelfValue),
        Command::set("b", Source::SelfValue),
        Command::set("c", Source::SelfValue),
    ];

    let err = execute(&commands, RAW, &store).await.unwrap_err();

    assert_eq!(err.index, 1);
    assert_eq!(err.group, Group::Set);
    assert_eq!(err.key, "b");
    assert_eq!(store.call_count().await, 2);
    assert_eq!(store.value("b").await, None);
    assert_eq!(store.value("c").await, None);
}

#[tokio::test]
async fn test_empty_command_list() {
    let store = MockCommandStore::new();
    let summary = execute(&[], RAW, &store).await.unwrap();
    assert_eq!(summary, ExecutionSummary::default());
    assert_eq!(store.call_count().await, 0);
}
