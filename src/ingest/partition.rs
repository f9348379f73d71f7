//! The per-partition loop.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use super::{Backends, IngestConfig, IngestError, IngestReport, MalformedPolicy, Phase};
use crate::broker::{FetchWindow, LogMessage, PartitionReader, ReadMode};
use crate::codec::Codec;
use crate::command::extract;
use crate::engine::execute;

#[derive(Debug, Default)]
struct Progress {
    processed: u64,
    /// Last processed offset not yet reflected in the cursor.
    pending: Option<i64>,
    uncommitted: usize,
    committed: Option<i64>,
}

/// Consumes one partition: Recovering, then Reading → Decoding → Extracting →
/// Executing → Committing until cancelled or failed.
pub struct PartitionLoop {
    stream: String,
    partition: i32,
    window: FetchWindow,
    codec: Arc<dyn Codec>,
    backends: Backends,
    config: IngestConfig,
    phase: Phase,
}

impl PartitionLoop {
    pub fn new(
        stream: String,
        partition: i32,
        window: FetchWindow,
        codec: Arc<dyn Codec>,
        backends: Backends,
        config: IngestConfig,
    ) -> Self {
        Self {
            stream,
            partition,
            window,
            codec,
            backends,
            config,
            phase: Phase::Recovering,
        }
    }

    fn enter(&mut self, phase: Phase) {
        trace!(from = ?self.phase, to = ?phase, "Phase change");
        self.phase = phase;
    }

    /// Run until `cancel` fires or a message cannot be handled.
    ///
    /// The cursor must already exist. Processed but uncommitted progress is
    /// committed before returning, whatever the reason for stopping.
    pub async fn run(mut self, cancel: CancellationToken) -> Result<IngestReport, IngestError> {
        self.enter(Phase::Recovering);
        let start = self
            .backends
            .cursors
            .get(&self.stream, self.partition)
            .await
            .map_err(|source| IngestError::Cursor {
                stream: self.stream.clone(),
                partition: self.partition,
                offset: None,
                source,
            })?;

        info!(offset = start, "Recovered cursor");

        let mut reader = self
            .backends
            .log
            .open(&self.stream, self.partition, start, self.window, ReadMode::Follow)
            .await
            .map_err(|source| IngestError::Broker {
                stream: self.stream.clone(),
                partition: self.partition,
                offset: start,
                source,
            })?;

        let mut progress = Progress::default();
        let outcome = self
            .consume(reader.as_mut(), start, &cancel, &mut progress)
            .await;
        let flushed = self.flush(&mut progress).await;
        self.enter(Phase::Stopped);

        match (outcome, flushed) {
            (Err(err), Err(flush_err)) => {
                warn!(error = %flush_err, "Could not commit progress while stopping");
                Err(err)
            }
            (Err(err), Ok(())) | (Ok(()), Err(err)) => Err(err),
            (Ok(()), Ok(())) => Ok(IngestReport {
                stream: self.stream.clone(),
                partition: self.partition,
                processed: progress.processed,
                committed: progress.committed,
            }),
        }
    }

    async fn consume(
        &mut self,
        reader: &mut dyn PartitionReader,
        start: i64,
        cancel: &CancellationToken,
        progress: &mut Progress,
    ) -> Result<(), IngestError> {
        let mut next = start;
        loop {
            if cancel.is_cancelled() {
                debug!(offset = next, "Cancelled before read");
                return Ok(());
            }

            self.enter(Phase::Reading);
            let fetched = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    debug!(offset = next, "Cancelled during read");
                    return Ok(());
                }
                fetched = reader.fetch() => fetched,
            };

            let message = match fetched {
                Ok(Some(message)) => message,
                Ok(None) => {
                    info!(offset = next, "Reader reported end of data");
                    return Ok(());
                }
                Err(source) => {
                    return Err(IngestError::Broker {
                        stream: self.stream.clone(),
                        partition: self.partition,
                        offset: next,
                        source,
                    })
                }
            };

            if cancel.is_cancelled() {
                debug!(offset = message.offset, "Cancelled after read; message left for next run");
                return Ok(());
            }

            self.process(&message, progress).await?;
            next = message.offset + 1;
        }
    }

    async fn process(&mut self, message: &LogMessage, progress: &mut Progress) -> Result<(), IngestError> {
        let offset = message.offset;

        self.enter(Phase::Decoding);
        let record = self
            .codec
            .decode(&message.value)
            .map_err(|source| IngestError::Decode {
                stream: self.stream.clone(),
                partition: self.partition,
                offset,
                source,
            })?;

        self.enter(Phase::Extracting);
        let commands = match extract(&record, self.config.unknown_groups) {
            Ok(commands) => commands,
            Err(source) => match self.config.malformed {
                MalformedPolicy::Stop => {
                    return Err(IngestError::Malformed {
                        stream: self.stream.clone(),
                        partition: self.partition,
                        offset,
                        source,
                    })
                }
                MalformedPolicy::Skip => {
                    warn!(offset, error = %source, "Skipping malformed message");
                    Vec::new()
                }
            },
        };

        self.enter(Phase::Executing);
        let summary = execute(&commands, &message.value, self.backends.commands.as_ref())
            .await
            .map_err(|source| IngestError::Execution {
                stream: self.stream.clone(),
                partition: self.partition,
                offset,
                source,
            })?;
        debug!(
            offset,
            executed = summary.executed,
            skipped = summary.skipped,
            "Message processed"
        );

        progress.processed += 1;
        progress.pending = Some(offset);
        progress.uncommitted += 1;
        if progress.uncommitted >= self.config.commit_every.max(1) {
            self.commit(progress).await?;
        }
        Ok(())
    }

    async fn commit(&mut self, progress: &mut Progress) -> Result<(), IngestError> {
        let Some(last) = progress.pending else {
            return Ok(());
        };
        self.enter(Phase::Committing);
        let cursor = last + 1;
        self.backends
            .cursors
            .set(&self.stream, self.partition, cursor)
            .await
            .map_err(|source| IngestError::Cursor {
                stream: self.stream.clone(),
                partition: self.partition,
                offset: Some(cursor),
                source,
            })?;
        trace!(cursor, "Committed");
        progress.pending = None;
        progress.uncommitted = 0;
        progress.committed = Some(cursor);
        Ok(())
    }

    async fn flush(&mut self, progress: &mut Progress) -> Result<(), IngestError> {
        if progress.uncommitted == 0 {
            return Ok(());
        }
        self.commit(progress).await
    }
}
