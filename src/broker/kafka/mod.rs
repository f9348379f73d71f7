//! Kafka message log implementation.
//!
//! Readers are manually assigned consumers: no group rebalancing and no
//! broker-side offset commits, since cursors live in the cursor store.
//! Message key: caller supplied (routes to a partition).

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use rdkafka::consumer::{Consumer, StreamConsumer};
use rdkafka::error::KafkaError;
use rdkafka::message::Message as KafkaMessage;
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::{ClientConfig, Offset, TopicPartitionList};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use super::{
    BrokerError, Delivery, FetchWindow, LogMessage, MessageLog, OutboundMessage,
    PartitionReader, ReadMode, RequiredAcks, Result,
};
use crate::config::KafkaConfig;

/// Kafka-backed message log.
///
/// One producer is created lazily per acknowledgement level and reused.
/// Each `open` creates its own consumer assigned to a single partition.
pub struct KafkaMessageLog {
    config: KafkaConfig,
    producers: RwLock<HashMap<RequiredAcks, FutureProducer>>,
}

impl KafkaMessageLog {
    /// Create a message log and check that a producer can be built.
    pub async fn new(config: KafkaConfig) -> Result<Self> {
        let producer = create_producer(&config, RequiredAcks::default())?;

        info!(
            bootstrap_servers = %config.bootstrap_servers,
            client_id = %config.client_id,
            "Connected to Kafka"
        );

        let mut producers = HashMap::new();
        producers.insert(RequiredAcks::default(), producer);

        Ok(Self {
            config,
            producers: RwLock::new(producers),
        })
    }

    async fn producer(&self, acks: RequiredAcks) -> Result<FutureProducer> {
        if let Some(producer) = self.producers.read().await.get(&acks) {
            return Ok(producer.clone());
        }
        let mut producers = self.producers.write().await;
        if let Some(producer) = producers.get(&acks) {
            return Ok(producer.clone());
        }
        let producer = create_producer(&self.config, acks)?;
        producers.insert(acks, producer.clone());
        Ok(producer)
    }
}

fn create_producer(config: &KafkaConfig, acks: RequiredAcks) -> Result<FutureProducer> {
    build_producer_config(config, acks)
        .create()
        .map_err(|e| BrokerError::Connection(format!("Failed to create Kafka producer: {}", e)))
}

fn acks_setting(acks: RequiredAcks) -> &'static str {
    match acks {
        RequiredAcks::None => "0",
        RequiredAcks::Leader => "1",
        RequiredAcks::All => "all",
    }
}

/// Build a ClientConfig for producers.
fn build_producer_config(config: &KafkaConfig, acks: RequiredAcks) -> ClientConfig {
    let mut client = ClientConfig::new();
    client.set("bootstrap.servers", &config.bootstrap_servers);
    client.set("client.id", &config.client_id);
    client.set("message.timeout.ms", "5000");
    client.set("acks", acks_setting(acks));
    if acks == RequiredAcks::All {
        client.set("enable.idempotence", "true");
    }

    apply_security_config(config, &mut client);
    client
}

/// Build a ClientConfig for a single-partition reader.
fn build_reader_config(
    config: &KafkaConfig,
    stream: &str,
    partition: i32,
    window: FetchWindow,
    mode: ReadMode,
) -> ClientConfig {
    let mut client = ClientConfig::new();
    client.set("bootstrap.servers", &config.bootstrap_servers);
    client.set("client.id", &config.client_id);
    client.set(
        "group.id",
        format!("{}.{}.{}", config.client_id, stream, partition),
    );
    client.set("enable.auto.commit", "false");
    client.set("enable.auto.offset.store", "false");
    // An out-of-range scan start must end the scan, not rewind it.
    client.set(
        "auto.offset.reset",
        match mode {
            ReadMode::Follow => "earliest",
            ReadMode::Scan => "latest",
        },
    );
    client.set("fetch.min.bytes", window.min_bytes.to_string());
    client.set("max.partition.fetch.bytes", window.max_bytes.to_string());
    client.set("fetch.wait.max.ms", config.max_wait_ms.to_string());
    client.set(
        "enable.partition.eof",
        if mode == ReadMode::Scan { "true" } else { "false" },
    );

    apply_security_config(config, &mut client);
    client
}

/// Apply security settings to a ClientConfig.
fn apply_security_config(config: &KafkaConfig, client: &mut ClientConfig) {
    if let Some(ref protocol) = config.security_protocol {
        client.set("security.protocol", protocol);
    }

    if let Some(ref mechanism) = config.sasl_mechanism {
        client.set("sasl.mechanism", mechanism);
    }

    if let Some(ref username) = config.sasl_username {
        client.set("sasl.username", username);
    }

    if let Some(ref password) = config.sasl_password {
        client.set("sasl.password", password);
    }

    if let Some(ref ca_location) = config.ssl_ca_location {
        client.set("ssl.ca.location", ca_location);
    }
}

fn assignment(stream: &str, partition: i32, offset: i64) -> Result<TopicPartitionList> {
    let mut tpl = TopicPartitionList::new();
    tpl.add_partition_offset(stream, partition, Offset::Offset(offset))
        .map_err(|e| BrokerError::Seek(format!("Invalid offset {}: {}", offset, e)))?;
    Ok(tpl)
}

#[async_trait]
impl MessageLog for KafkaMessageLog {
    async fn open(
        &self,
        stream: &str,
        partition: i32,
        offset: i64,
        window: FetchWindow,
        mode: ReadMode,
    ) -> Result<Box<dyn PartitionReader>> {
        let consumer: StreamConsumer =
            build_reader_config(&self.config, stream, partition, window, mode)
                .create()
                .map_err(|e| {
                    BrokerError::Connection(format!("Failed to create Kafka consumer: {}", e))
                })?;

        let offset = offset.max(0);
        consumer
            .assign(&assignment(stream, partition, offset)?)
            .map_err(|e| BrokerError::Connection(format!("Failed to assign partition: {}", e)))?;

        debug!(
            stream = %stream,
            partition,
            offset,
            mode = ?mode,
            "Opened Kafka partition reader"
        );

        Ok(Box::new(KafkaPartitionReader {
            consumer,
            stream: stream.to_string(),
            partition,
            mode,
        }))
    }

    async fn write(
        &self,
        stream: &str,
        message: OutboundMessage,
        acks: RequiredAcks,
        timeout: Duration,
    ) -> Result<Delivery> {
        let producer = self.producer(acks).await?;
        let record = FutureRecord::to(stream)
            .key(&message.key)
            .payload(&message.value);

        let (partition, offset) = producer
            .send(record, timeout)
            .await
            .map_err(|(e, _)| BrokerError::Publish(format!("Failed to publish: {}", e)))?;

        debug!(
            stream = %stream,
            partition,
            offset,
            "Published message to Kafka"
        );

        Ok(Delivery { partition, offset })
    }
}

struct KafkaPartitionReader {
    consumer: StreamConsumer,
    stream: String,
    partition: i32,
    mode: ReadMode,
}

#[async_trait]
impl PartitionReader for KafkaPartitionReader {
    async fn fetch(&mut self) -> Result<Option<LogMessage>> {
        loop {
            match self.consumer.recv().await {
                Ok(message) => {
                    return Ok(Some(LogMessage {
                        stream: message.topic().to_string(),
                        partition: message.partition(),
                        offset: message.offset(),
                        key: message.key().map(<[u8]>::to_vec),
                        value: message.payload().map(<[u8]>::to_vec).unwrap_or_default(),
                    }));
                }
                Err(KafkaError::PartitionEOF(partition)) => match self.mode {
                    ReadMode::Scan => return Ok(None),
                    ReadMode::Follow => {
                        warn!(
                            stream = %self.stream,
                            partition,
                            "Unexpected end-of-partition event while following"
                        );
                    }
                },
                Err(e) => {
                    return Err(BrokerError::Fetch(format!(
                        "{}:{}: {}",
                        self.stream, self.partition, e
                    )))
                }
            }
        }
    }

    async fn seek(&mut self, offset: i64) -> Result<()> {
        if offset < 0 {
            return Err(BrokerError::Seek(format!("Negative offset {}", offset)));
        }
        self.consumer
            .assign(&assignment(&self.stream, self.partition, offset)?)
            .map_err(|e| BrokerError::Seek(format!("Failed to reassign partition: {}", e)))
    }
}
