//! Historical search through the public API.
//!
//! Run with: cargo test --test search_integration

use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;

use logfold::broker::MockMessageLog;
use logfold::config::{Config, StreamConfig};
use logfold::ingest::{Backends, Ingestor};
use logfold::search::{decode_matches, seeds_from_cursors, RuleSpec, SearchEngine, Seed};
use logfold::storage::{CursorStore, MockCommandStore, MockCursorStore};

const SUBJECTS: &str = "subjects";
const COMMENTS: &str = "comments";

fn config() -> Config {
    let mut config = Config::for_test();
    config.streams.push(StreamConfig::new(SUBJECTS, 3));
    config.streams.push(StreamConfig::new(COMMENTS, 1));
    config
}

fn bytes(value: Value) -> Vec<u8> {
    serde_json::to_vec(&value).unwrap()
}

#[tokio::test]
async fn test_subject_search_across_partitions() {
    let config = config();
    let log = MockMessageLog::new();
    for partition in 0..3 {
        log.set_start_offset(SUBJECTS, partition, 100).await;
        for value in [
            json!({"id": "other", "category": "news"}),
            json!({"id": "target", "category": "sport"}),
            json!({"id": "n1", "category": "news"}),
            json!({"id": "s1", "category": "sport"}),
            json!({"id": "n2", "category": "news"}),
        ] {
            log.append(SUBJECTS, partition, bytes(value)).await;
        }
    }

    let engine = SearchEngine::from_config(&config, Arc::new(log));
    let seeds: Vec<Seed> = (0..3).map(|p| Seed::new(SUBJECTS, p, 100)).collect();
    let matches = engine
        .search(&seeds, &RuleSpec::subject("target", "news"), Duration::from_secs(2))
        .await;

    assert_eq!(matches.len(), 6);
    assert!(matches.iter().all(|m| m.offset == 102 || m.offset == 104));

    let mut ids: Vec<String> = decode_matches(&config.codecs(), &matches)
        .into_iter()
        .map(|v| v["id"].as_str().unwrap().to_string())
        .collect();
    ids.sort();
    assert_eq!(ids, vec!["n1", "n1", "n1", "n2", "n2", "n2"]);
}

#[tokio::test]
async fn test_search_seeded_from_ingest_cursors() {
    let config = config();
    let log = MockMessageLog::new();
    log.create_stream(COMMENTS, 1).await;
    log.create_stream(SUBJECTS, 3).await;
    for id in ["c-0", "c-1", "c-2"] {
        log.append(COMMENTS, 0, bytes(json!({"id": id, "commands": []})))
            .await;
    }

    let cursors = Arc::new(MockCursorStore::new());
    let ingestor = Ingestor::from_config(
        &config,
        Backends {
            log: Arc::new(log.clone()),
            cursors: cursors.clone(),
            commands: Arc::new(MockCommandStore::new()),
        },
    );
    let cancel = CancellationToken::new();
    let running = tokio::spawn({
        let cancel = cancel.clone();
        async move { ingestor.run(cancel).await }
    });
    tokio::time::timeout(Duration::from_secs(5), async {
        while cursors.peek(COMMENTS, 0).await != Some(3) {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("ingestion should catch up");
    cancel.cancel();
    running.await.unwrap();

    // Traffic after the last ingest run.
    log.append(COMMENTS, 0, bytes(json!({"id": "c-3"}))).await;

    let seeds = seeds_from_cursors(&cursors.list().await.unwrap(), Some(COMMENTS));
    assert_eq!(seeds, vec![Seed::new(COMMENTS, 0, 2)]);

    let engine = SearchEngine::from_config(&config, Arc::new(log));
    let matches = engine
        .search_default(&seeds, &RuleSpec::comment("c-2"))
        .await;

    let offsets: Vec<i64> = matches.iter().map(|m| m.offset).collect();
    assert_eq!(offsets, vec![2, 3]);
}
