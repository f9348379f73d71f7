//! In-memory message log for testing.

use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{Notify, RwLock};

use super::{
    BrokerError, Delivery, FetchWindow, LogMessage, MessageLog, OutboundMessage,
    PartitionReader, ReadMode, RequiredAcks, Result,
};

type PartitionKey = (String, i32);

#[derive(Default)]
struct Partition {
    /// Offset of the first retained message.
    start: i64,
    messages: Vec<LogMessage>,
}

impl Partition {
    fn next_offset(&self) -> i64 {
        self.start + self.messages.len() as i64
    }

    fn at(&self, offset: i64) -> Option<&LogMessage> {
        let index = offset.max(self.start) - self.start;
        self.messages.get(usize::try_from(index).ok()?)
    }
}

/// A reader opened through `MessageLog::open`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenedReader {
    pub stream: String,
    pub partition: i32,
    pub offset: i64,
    pub window: FetchWindow,
    pub mode: ReadMode,
}

#[derive(Default)]
struct Inner {
    partitions: RwLock<HashMap<PartitionKey, Partition>>,
    stream_widths: RwLock<HashMap<String, i32>>,
    opened: RwLock<Vec<OpenedReader>>,
    fetch_failures: RwLock<HashMap<PartitionKey, usize>>,
    fail_on_open: RwLock<bool>,
    fail_on_write: RwLock<bool>,
    appended: Notify,
}

impl Inner {
    async fn take_fetch_failure(&self, key: &PartitionKey) -> bool {
        let mut failures = self.fetch_failures.write().await;
        match failures.get_mut(key) {
            Some(remaining) if *remaining > 0 => {
                *remaining -= 1;
                true
            }
            _ => false,
        }
    }

    async fn append(&self, stream: &str, partition: i32, key: Option<Vec<u8>>, value: Vec<u8>) -> i64 {
        let mut partitions = self.partitions.write().await;
        let log = partitions
            .entry((stream.to_string(), partition))
            .or_default();
        let offset = log.next_offset();
        log.messages.push(LogMessage {
            stream: stream.to_string(),
            partition,
            offset,
            key,
            value,
        });
        drop(partitions);
        self.appended.notify_waiters();
        offset
    }
}

/// Mock message log keeping every partition in memory.
///
/// Follow-mode readers wake on every append. Fetch failures can be injected
/// per partition.
#[derive(Clone, Default)]
pub struct MockMessageLog {
    inner: Arc<Inner>,
}

impl MockMessageLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a stream's partition count. Writes hash keys across them.
    pub async fn create_stream(&self, stream: &str, partitions: i32) {
        self.inner
            .stream_widths
            .write()
            .await
            .insert(stream.to_string(), partitions.max(1));
    }

    /// Make an empty partition start numbering at `offset`.
    pub async fn set_start_offset(&self, stream: &str, partition: i32, offset: i64) {
        let mut partitions = self.inner.partitions.write().await;
        let log = partitions
            .entry((stream.to_string(), partition))
            .or_default();
        if log.messages.is_empty() {
            log.start = offset;
        }
    }

    /// Append a raw value to a specific partition and return its offset.
    pub async fn append(&self, stream: &str, partition: i32, value: impl Into<Vec<u8>>) -> i64 {
        self.inner
            .append(stream, partition, None, value.into())
            .await
    }

    /// Fail the next `count` fetches on one partition.
    pub async fn fail_next_fetches(&self, stream: &str, partition: i32, count: usize) {
        self.inner
            .fetch_failures
            .write()
            .await
            .insert((stream.to_string(), partition), count);
    }

    pub async fn set_fail_on_open(&self, fail: bool) {
        *self.inner.fail_on_open.write().await = fail;
    }

    pub async fn set_fail_on_write(&self, fail: bool) {
        *self.inner.fail_on_write.write().await = fail;
    }

    pub async fn messages(&self, stream: &str, partition: i32) -> Vec<LogMessage> {
        self.inner
            .partitions
            .read()
            .await
            .get(&(stream.to_string(), partition))
            .map(|p| p.messages.clone())
            .unwrap_or_default()
    }

    /// Every reader opened so far, in open order.
    pub async fn opened(&self) -> Vec<OpenedReader> {
        self.inner.opened.read().await.clone()
    }

    async fn partition_for(&self, stream: &str, key: &[u8]) -> i32 {
        let width = self
            .inner
            .stream_widths
            .read()
            .await
            .get(stream)
            .copied()
            .unwrap_or(1);
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        (hasher.finish() % width as u64) as i32
    }
}

#[async_trait]
impl MessageLog for MockMessageLog {
    async fn open(
        &self,
        stream: &str,
        partition: i32,
        offset: i64,
        window: FetchWindow,
        mode: ReadMode,
    ) -> Result<Box<dyn PartitionReader>> {
        if *self.inner.fail_on_open.read().await {
            return Err(BrokerError::Connection("Mock open failure".to_string()));
        }
        self.inner.opened.write().await.push(OpenedReader {
            stream: stream.to_string(),
            partition,
            offset,
            window,
            mode,
        });
        Ok(Box::new(MockPartitionReader {
            inner: Arc::clone(&self.inner),
            key: (stream.to_string(), partition),
            next: offset.max(0),
            mode,
        }))
    }

    async fn write(
        &self,
        stream: &str,
        message: OutboundMessage,
        _acks: RequiredAcks,
        _timeout: Duration,
    ) -> Result<Delivery> {
        if *self.inner.fail_on_write.read().await {
            return Err(BrokerError::Publish("Mock write failure".to_string()));
        }
        let partition = self.partition_for(stream, &message.key).await;
        let offset = self
            .inner
            .append(stream, partition, Some(message.key), message.value)
            .await;
        Ok(Delivery { partition, offset })
    }
}

struct MockPartitionReader {
    inner: Arc<Inner>,
    key: PartitionKey,
    next: i64,
    mode: ReadMode,
}

#[async_trait]
impl PartitionReader for MockPartitionReader {
    async fn fetch(&mut self) -> Result<Option<LogMessage>> {
        loop {
            // Register for wakeups before looking so an append in between is not lost.
            let notified = self.inner.appended.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if self.inner.take_fetch_failure(&self.key).await {
                return Err(BrokerError::Fetch(format!(
                    "Mock fetch failure on {}:{} at {}",
                    self.key.0, self.key.1, self.next
                )));
            }

            let found = self
                .inner
                .partitions
                .read()
                .await
                .get(&self.key)
                .and_then(|p| p.at(self.next).cloned());

            match (found, self.mode) {
                (Some(message), _) => {
                    self.next = message.offset + 1;
                    return Ok(Some(message));
                }
                (None, ReadMode::Scan) => return Ok(None),
                (None, ReadMode::Follow) => notified.await,
            }
        }
    }

    async fn seek(&mut self, offset: i64) -> Result<()> {
        if offset < 0 {
            return Err(BrokerError::Seek(format!("Negative offset {}", offset)));
        }
        self.next = offset;
        Ok(())
    }
}
