use super::*;
use crate::codec::JsonCodec;

const STREAM: &str = "subjects";

#[tokio::test]
async fn test_scan_reader_reads_from_offset_then_ends() {
    let log = MockMessageLog::new();
    for value in ["a", "b", "c"] {
        log.append(STREAM, 0, value).await;
    }

    let mut reader = log
        .open(STREAM, 0, 1, FetchWindow::default(), ReadMode::Scan)
        .await
        .unwrap();

    let first = reader.fetch().await.unwrap().unwrap();
    assert_eq!(first.offset, 1);
    assert_eq!(first.value, b"b");
    let second = reader.fetch().await.unwrap().unwrap();
    assert_eq!(second.offset, 2);
    assert!(reader.fetch().await.unwrap().is_none());
}

#[tokio::test]
async fn test_start_offset_numbers_messages() {
    let log = MockMessageLog::new();
    log.set_start_offset(STREAM, 2, 100).await;
    assert_eq!(log.append(STREAM, 2, "x").await, 100);
    assert_eq!(log.append(STREAM, 2, "y").await, 101);

    let mut reader = log
        .open(STREAM, 2, 101, FetchWindow::default(), ReadMode::Scan)
        .await
        .unwrap();
    let message = reader.fetch().await.unwrap().unwrap();
    assert_eq!(message.offset, 101);
    assert_eq!(message.partition, 2);
}

#[tokio::test]
async fn test_follow_reader_wakes_on_append() {
    let log = MockMessageLog::new();
    let mut reader = log
        .open(STREAM, 0, 0, FetchWindow::default(), ReadMode::Follow)
        .await
        .unwrap();

    let writer = log.clone();
    let handle = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        writer.append(STREAM, 0, "late").await;
    });

    let message = tokio::time::timeout(Duration::from_secs(2), reader.fetch())
        .await
        .expect("follow reader should wake")
        .unwrap()
        .unwrap();
    assert_eq!(message.value, b"late");
    handle.await.unwrap();
}

#[tokio::test]
async fn test_seek_repositions_reader() {
    let log = MockMessageLog::new();
    for value in ["a", "b", "c"] {
        log.append(STREAM, 0, value).await;
    }
    let mut reader = log
        .open(STREAM, 0, 0, FetchWindow::default(), ReadMode::Scan)
        .await
        .unwrap();

    reader.seek(2).await.unwrap();
    assert_eq!(reader.fetch().await.unwrap().unwrap().value, b"c");
    assert!(matches!(reader.seek(-1).await, Err(BrokerError::Seek(_))));
}

#[tokio::test]
async fn test_injected_fetch_failures_do_not_advance() {
    let log = MockMessageLog::new();
    log.append(STREAM, 0, "a").await;
    log.fail_next_fetches(STREAM, 0, 2).await;

    let mut reader = log
        .open(STREAM, 0, 0, FetchWindow::default(), ReadMode::Scan)
        .await
        .unwrap();

    assert!(matches!(reader.fetch().await, Err(BrokerError::Fetch(_))));
    assert!(matches!(reader.fetch().await, Err(BrokerError::Fetch(_))));
    assert_eq!(reader.fetch().await.unwrap().unwrap().offset, 0);
}

#[tokio::test]
async fn test_open_is_recorded() {
    let log = MockMessageLog::new();
    let window = FetchWindow::new(1, 1024);
    let _reader = log.open(STREAM, 3, 7, window, ReadMode::Follow).await.unwrap();

    let opened = log.opened().await;
    assert_eq!(
        opened,
        vec![OpenedReader {
            stream: STREAM.to_string(),
            partition: 3,
            offset: 7,
            window,
            mode: ReadMode::Follow,
        }]
    );
}

#[tokio::test]
async fn test_open_failure() {
    let log = MockMessageLog::new();
    log.set_fail_on_open(true).await;
    let result = log
        .open(STREAM, 0, 0, FetchWindow::default(), ReadMode::Scan)
        .await;
    assert!(matches!(result, Err(BrokerError::Connection(_))));
}

#[tokio::test]
async fn test_write_routes_same_key_to_same_partition() {
    let log = MockMessageLog::new();
    log.create_stream(STREAM, 4).await;

    let first = log
        .write(
            STREAM,
            OutboundMessage::new("subject-1", "v1"),
            RequiredAcks::All,
            Duration::from_secs(1),
        )
        .await
        .unwrap();
    let second = log
        .write(
            STREAM,
            OutboundMessage::new("subject-1", "v2"),
            RequiredAcks::Leader,
            Duration::from_secs(1),
        )
        .await
        .unwrap();

    assert_eq!(first.partition, second.partition);
    assert_eq!(second.offset, first.offset + 1);

    let stored = log.messages(STREAM, first.partition).await;
    assert_eq!(stored[1].key.as_deref(), Some(&b"subject-1"[..]));
    assert_eq!(stored[1].value, b"v2");
}

#[tokio::test]
async fn test_write_failure() {
    let log = MockMessageLog::new();
    log.set_fail_on_write(true).await;
    let result = log
        .write(
            STREAM,
            OutboundMessage::new("k", "v"),
            RequiredAcks::All,
            Duration::from_secs(1),
        )
        .await;
    assert!(matches!(result, Err(BrokerError::Publish(_))));
}

#[tokio::test]
async fn test_publish_record_encodes_with_codec() {
    let log = MockMessageLog::new();
    let codec = JsonCodec::new("subject").with_required(["id"]);
    let record = Record::new().with("id", "s-1").with("category", "news");

    let delivery = publish_record(
        &log,
        &codec,
        STREAM,
        b"s-1",
        &record,
        RequiredAcks::All,
        Duration::from_secs(1),
    )
    .await
    .unwrap();

    let stored = log.messages(STREAM, delivery.partition).await;
    let decoded = codec.decode(&stored[0].value).unwrap();
    assert_eq!(decoded, record);
}

#[tokio::test]
async fn test_publish_record_rejects_incomplete_record() {
    let log = MockMessageLog::new();
    let codec = JsonCodec::new("subject").with_required(["id"]);

    let result = publish_record(
        &log,
        &codec,
        STREAM,
        b"k",
        &Record::new().with("category", "news"),
        RequiredAcks::All,
        Duration::from_secs(1),
    )
    .await;

    assert!(matches!(result, Err(BrokerError::Encode(_))));
    assert!(log.messages(STREAM, 0).await.is_empty());
}

#[tokio::test]
async fn test_init_broker_memory() {
    let config = BrokerConfig {
        broker_type: BrokerType::Memory,
        ..BrokerConfig::default()
    };
    let log = init_broker(&config).await.unwrap();
    let delivery = log
        .write(
            STREAM,
            OutboundMessage::new("k", "v"),
            RequiredAcks::None,
            Duration::from_secs(1),
        )
        .await
        .unwrap();
    assert_eq!(delivery, Delivery { partition: 0, offset: 0 });
}
