//! Partitioned message log.
//!
//! This module contains:
//! - `MessageLog` trait: opens partition readers and writes keyed messages
//! - `PartitionReader` trait: sequential fetch from one partition
//! - Message and fetch-setting types
//! - Implementations: Kafka (feature `kafka`), Mock (in-memory)

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info};

use crate::codec::{Codec, EncodeError, Record};
use crate::config::{BrokerConfig, BrokerType};

#[cfg(feature = "kafka")]
pub mod kafka;
pub mod mock;

#[cfg(feature = "kafka")]
pub use kafka::KafkaMessageLog;
pub use mock::{MockMessageLog, OpenedReader};

/// Result type for broker operations.
pub type Result<T> = std::result::Result<T, BrokerError>;

/// Errors that can occur talking to the broker.
#[derive(Debug, thiserror::Error)]
pub enum BrokerError {
    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Fetch failed: {0}")]
    Fetch(String),

    #[error("Seek failed: {0}")]
    Seek(String),

    #[error("Publish failed: {0}")]
    Publish(String),

    #[error("Encode failed: {0}")]
    Encode(#[from] EncodeError),
}

/// A message read from one partition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogMessage {
    pub stream: String,
    pub partition: i32,
    pub offset: i64,
    pub key: Option<Vec<u8>>,
    /// Raw encoded value, exactly as stored in the log.
    pub value: Vec<u8>,
}

/// A message to write. The key selects the partition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    pub key: Vec<u8>,
    pub value: Vec<u8>,
}

impl OutboundMessage {
    pub fn new(key: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Where a written message landed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Delivery {
    pub partition: i32,
    pub offset: i64,
}

/// Per-fetch byte bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchWindow {
    pub min_bytes: usize,
    pub max_bytes: usize,
}

impl FetchWindow {
    pub fn new(min_bytes: usize, max_bytes: usize) -> Self {
        Self {
            min_bytes,
            max_bytes,
        }
    }
}

impl Default for FetchWindow {
    fn default() -> Self {
        Self::new(10_000, 10_000_000)
    }
}

/// How a reader behaves at the end of the partition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadMode {
    /// Block until new messages are appended.
    Follow,
    /// Report "no more data" once the end is reached.
    Scan,
}

/// Acknowledgement level required before a write completes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum RequiredAcks {
    None,
    Leader,
    #[default]
    All,
}

/// Sequential reader over one partition.
#[async_trait]
pub trait PartitionReader: Send {
    /// Next message in offset order.
    ///
    /// In `ReadMode::Follow` this waits for data and never returns `None`.
    /// In `ReadMode::Scan` `None` means the end of the partition was reached.
    async fn fetch(&mut self) -> Result<Option<LogMessage>>;

    /// Reposition so the next fetch returns the message at `offset`.
    async fn seek(&mut self, offset: i64) -> Result<()>;
}

/// Interface to the partitioned log.
///
/// Implementations:
/// - `KafkaMessageLog`: Kafka via rdkafka
/// - `MockMessageLog`: In-memory log for testing
#[async_trait]
pub trait MessageLog: Send + Sync {
    /// Open a reader whose first fetch returns the message at `offset`.
    async fn open(
        &self,
        stream: &str,
        partition: i32,
        offset: i64,
        window: FetchWindow,
        mode: ReadMode,
    ) -> Result<Box<dyn PartitionReader>>;

    /// Append a keyed message to a stream.
    async fn write(
        &self,
        stream: &str,
        message: OutboundMessage,
        acks: RequiredAcks,
        timeout: Duration,
    ) -> Result<Delivery>;
}

/// Encode a record with the stream's codec and write it.
pub async fn publish_record(
    log: &dyn MessageLog,
    codec: &dyn Codec,
    stream: &str,
    key: &[u8],
    record: &Record,
    acks: RequiredAcks,
    timeout: Duration,
) -> Result<Delivery> {
    let value = codec.encode(record)?;
    let delivery = log
        .write(stream, OutboundMessage::new(key, value), acks, timeout)
        .await?;
    debug!(
        stream = %stream,
        partition = delivery.partition,
        offset = delivery.offset,
        "Published record"
    );
    Ok(delivery)
}

/// Initialize the message log based on configuration.
pub async fn init_broker(
    config: &BrokerConfig,
) -> std::result::Result<Arc<dyn MessageLog>, Box<dyn std::error::Error>> {
    match config.broker_type {
        BrokerType::Memory => {
            info!("Broker: in-memory");
            Ok(Arc::new(MockMessageLog::new()))
        }
        #[cfg(feature = "kafka")]
        BrokerType::Kafka => {
            info!(
                bootstrap_servers = %config.kafka.bootstrap_servers,
                "Broker: kafka"
            );
            Ok(Arc::new(KafkaMessageLog::new(config.kafka.clone()).await?))
        }
        #[cfg(not(feature = "kafka"))]
        BrokerType::Kafka => {
            tracing::error!("Kafka broker requested but 'kafka' feature is not enabled");
            Err("Kafka feature not enabled".into())
        }
    }
}

#[cfg(test)]
mod tests;
