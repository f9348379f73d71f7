//! Partition ingestion.
//!
//! One `PartitionLoop` per (stream, partition) reads messages in offset order,
//! decodes them, extracts and executes their commands, and commits the cursor
//! afterwards (at-least-once). `Ingestor` initializes cursors and supervises
//! every loop until cancellation or failure.

mod partition;

use std::sync::Arc;

use serde::Deserialize;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, info_span, Instrument};

use crate::broker::{BrokerError, MessageLog};
use crate::codec::{CodecRegistry, DecodeError};
use crate::command::ExtractError;
use crate::config::{Config, StreamConfig};
use crate::engine::ExecutionError;
use crate::storage::{CommandStore, CursorStore, StorageError};

pub use crate::command::UnknownGroupPolicy;
pub use partition::PartitionLoop;

/// What the loop does with a message whose command list cannot be extracted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MalformedPolicy {
    /// Stop the partition; an operator decides how to proceed.
    #[default]
    Stop,
    /// Log, execute nothing, and commit past the message.
    Skip,
}

/// Ingestion settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    /// Commit the cursor after this many processed messages.
    pub commit_every: usize,
    pub malformed: MalformedPolicy,
    pub unknown_groups: UnknownGroupPolicy,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            commit_every: 1,
            malformed: MalformedPolicy::default(),
            unknown_groups: UnknownGroupPolicy::default(),
        }
    }
}

/// Where a partition loop is in its cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Recovering,
    Reading,
    Decoding,
    Extracting,
    Executing,
    Committing,
    Stopped,
}

/// Shared collaborators for every partition loop.
#[derive(Clone)]
pub struct Backends {
    pub log: Arc<dyn MessageLog>,
    pub cursors: Arc<dyn CursorStore>,
    pub commands: Arc<dyn CommandStore>,
}

/// Outcome of a partition loop that stopped cleanly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestReport {
    pub stream: String,
    pub partition: i32,
    /// Messages fully handled (executed or skipped) by this run.
    pub processed: u64,
    /// Last offset written to the cursor store by this run.
    pub committed: Option<i64>,
}

/// Why a partition loop stopped.
///
/// Every variant names the stream and partition, and the offset when one is
/// known, so the message can be inspected and replayed by hand.
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("{stream}:{partition}: cursor store failed (offset {offset:?}): {source}")]
    Cursor {
        stream: String,
        partition: i32,
        offset: Option<i64>,
        source: StorageError,
    },

    #[error("{stream}:{partition}: broker failed at offset {offset}: {source}")]
    Broker {
        stream: String,
        partition: i32,
        offset: i64,
        source: BrokerError,
    },

    #[error("{stream}:{partition}: undecodable message at offset {offset}: {source}")]
    Decode {
        stream: String,
        partition: i32,
        offset: i64,
        source: DecodeError,
    },

    #[error("{stream}:{partition}: malformed message at offset {offset}: {source}")]
    Malformed {
        stream: String,
        partition: i32,
        offset: i64,
        source: ExtractError,
    },

    #[error("{stream}:{partition}: execution failed at offset {offset}: {source}")]
    Execution {
        stream: String,
        partition: i32,
        offset: i64,
        source: ExecutionError,
    },

    #[error("No codec registered for stream '{stream}'")]
    MissingCodec { stream: String },

    #[error("Ingestion task aborted: {0}")]
    Aborted(String),
}

impl IngestError {
    pub fn stream(&self) -> Option<&str> {
        match self {
            Self::Cursor { stream, .. }
            | Self::Broker { stream, .. }
            | Self::Decode { stream, .. }
            | Self::Malformed { stream, .. }
            | Self::Execution { stream, .. }
            | Self::MissingCodec { stream } => Some(stream),
            Self::Aborted(_) => None,
        }
    }

    pub fn partition(&self) -> Option<i32> {
        match self {
            Self::Cursor { partition, .. }
            | Self::Broker { partition, .. }
            | Self::Decode { partition, .. }
            | Self::Malformed { partition, .. }
            | Self::Execution { partition, .. } => Some(*partition),
            Self::MissingCodec { .. } | Self::Aborted(_) => None,
        }
    }

    pub fn offset(&self) -> Option<i64> {
        match self {
            Self::Cursor { offset, .. } => *offset,
            Self::Broker { offset, .. }
            | Self::Decode { offset, .. }
            | Self::Malformed { offset, .. }
            | Self::Execution { offset, .. } => Some(*offset),
            Self::MissingCodec { .. } | Self::Aborted(_) => None,
        }
    }

    /// Phase the loop was in when it failed.
    pub fn phase(&self) -> Phase {
        match self {
            Self::Cursor { offset: None, .. } | Self::MissingCodec { .. } => Phase::Recovering,
            Self::Cursor { .. } => Phase::Committing,
            Self::Broker { .. } => Phase::Reading,
            Self::Decode { .. } => Phase::Decoding,
            Self::Malformed { .. } => Phase::Extracting,
            Self::Execution { .. } => Phase::Executing,
            Self::Aborted(_) => Phase::Stopped,
        }
    }
}

/// Runs one loop per configured partition.
pub struct Ingestor {
    backends: Backends,
    codecs: CodecRegistry,
    streams: Vec<StreamConfig>,
    config: IngestConfig,
}

impl Ingestor {
    pub fn new(
        backends: Backends,
        codecs: CodecRegistry,
        streams: Vec<StreamConfig>,
        config: IngestConfig,
    ) -> Self {
        Self {
            backends,
            codecs,
            streams,
            config,
        }
    }

    pub fn from_config(config: &Config, backends: Backends) -> Self {
        Self::new(
            backends,
            config.codecs(),
            config.streams.clone(),
            config.ingest.clone(),
        )
    }

    /// Initialize cursors, run every partition loop, and wait for all of them.
    ///
    /// Returns one outcome per partition. Partitions whose cursor could not be
    /// initialized never start and are reported as failures.
    pub async fn run(&self, cancel: CancellationToken) -> Vec<Result<IngestReport, IngestError>> {
        let mut outcomes = Vec::new();
        let mut tasks = JoinSet::new();

        for stream in &self.streams {
            let Some(codec) = self.codecs.get(&stream.name) else {
                error!(stream = %stream.name, "No codec registered; stream not ingested");
                outcomes.push(Err(IngestError::MissingCodec {
                    stream: stream.name.clone(),
                }));
                continue;
            };

            for partition in 0..stream.partitions {
                if let Err(source) = self
                    .backends
                    .cursors
                    .set_if_absent(&stream.name, partition, 0)
                    .await
                {
                    let err = IngestError::Cursor {
                        stream: stream.name.clone(),
                        partition,
                        offset: None,
                        source,
                    };
                    error!(stream = %stream.name, partition, error = %err, "Cursor initialization failed");
                    outcomes.push(Err(err));
                    continue;
                }

                let worker = PartitionLoop::new(
                    stream.name.clone(),
                    partition,
                    stream.fetch_window(),
                    Arc::clone(&codec),
                    self.backends.clone(),
                    self.config.clone(),
                );
                let span = info_span!("ingest", stream = %stream.name, partition);
                tasks.spawn(worker.run(cancel.child_token()).instrument(span));
            }
        }

        info!(partitions = tasks.len(), "Ingestion started");

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(Ok(report)) => {
                    info!(
                        stream = %report.stream,
                        partition = report.partition,
                        processed = report.processed,
                        committed = ?report.committed,
                        "Partition stopped"
                    );
                    outcomes.push(Ok(report));
                }
                Ok(Err(err)) => {
                    error!(
                        stream = ?err.stream(),
                        partition = ?err.partition(),
                        offset = ?err.offset(),
                        phase = ?err.phase(),
                        error = %err,
                        "Partition failed"
                    );
                    outcomes.push(Err(err));
                }
                Err(join_error) => {
                    error!(error = %join_error, "Ingestion task aborted");
                    outcomes.push(Err(IngestError::Aborted(join_error.to_string())));
                }
            }
        }

        outcomes
    }
}
