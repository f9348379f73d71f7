//! Historical search.
//!
//! Scans log partitions from given offsets and collects the messages a match
//! rule accepts. Each seed is scanned by its own task; results are returned
//! only after every task has finished. Failures degrade to fewer results,
//! never to an error.

mod rule;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use tokio::task::JoinSet;
use tokio::time::{timeout_at, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, debug_span, info, warn, Instrument};

use crate::broker::{FetchWindow, LogMessage, MessageLog, ReadMode};
use crate::codec::{Codec, CodecRegistry};
use crate::config::Config;
use crate::storage::Cursor;

pub use rule::{MatchRule, RuleSpec, CATEGORY_FIELD, ID_FIELD};

/// Search settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Default time budget for one search.
    pub deadline_secs: u64,
    /// Consecutive fetch errors after which a seed's scan gives up.
    pub max_fetch_errors: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            deadline_secs: 5,
            max_fetch_errors: 16,
        }
    }
}

impl SearchConfig {
    pub fn deadline(&self) -> Duration {
        Duration::from_secs(self.deadline_secs)
    }
}

/// Where one scan starts.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Seed {
    pub stream: String,
    pub partition: i32,
    /// First offset read. Negative values start at 0.
    pub offset: i64,
}

impl Seed {
    pub fn new(stream: impl Into<String>, partition: i32, offset: i64) -> Self {
        Self {
            stream: stream.into(),
            partition,
            offset,
        }
    }
}

/// Seeds positioned at the last ingested message of each cursor.
///
/// A cursor names the next offset to consume, so the seed starts one before
/// it (never below 0). With `stream_filter` only that stream's cursors are
/// used.
pub fn seeds_from_cursors(cursors: &[Cursor], stream_filter: Option<&str>) -> Vec<Seed> {
    let mut seeds: Vec<Seed> = cursors
        .iter()
        .filter(|c| stream_filter.map_or(true, |s| c.stream == s))
        .map(|c| Seed::new(c.stream.clone(), c.partition, (c.offset - 1).max(0)))
        .collect();
    seeds.sort_by(|a, b| (&a.stream, a.partition).cmp(&(&b.stream, b.partition)));
    seeds
}

/// Scatter-gather scanner over many partitions.
pub struct SearchEngine {
    log: Arc<dyn MessageLog>,
    codecs: CodecRegistry,
    windows: HashMap<String, FetchWindow>,
    config: SearchConfig,
}

impl SearchEngine {
    pub fn new(log: Arc<dyn MessageLog>, codecs: CodecRegistry, config: SearchConfig) -> Self {
        Self {
            log,
            codecs,
            windows: HashMap::new(),
            config,
        }
    }

    pub fn from_config(config: &Config, log: Arc<dyn MessageLog>) -> Self {
        let mut engine = Self::new(log, config.codecs(), config.search.clone());
        for stream in &config.streams {
            engine = engine.with_window(stream.name.clone(), stream.fetch_window());
        }
        engine
    }

    /// Fetch bounds for one stream's scans.
    pub fn with_window(mut self, stream: impl Into<String>, window: FetchWindow) -> Self {
        self.windows.insert(stream.into(), window);
        self
    }

    /// Search with the configured default deadline.
    pub async fn search_default(&self, seeds: &[Seed], rule: &RuleSpec) -> Vec<LogMessage> {
        self.search(seeds, rule, self.config.deadline()).await
    }

    /// Scan every seed until `deadline` elapses or its partition ends.
    pub async fn search(&self, seeds: &[Seed], rule: &RuleSpec, deadline: Duration) -> Vec<LogMessage> {
        self.search_cancellable(seeds, rule, deadline, &CancellationToken::new())
            .await
    }

    /// Like [`search`](Self::search) but also stops when `cancel` fires.
    ///
    /// Messages matched before cancellation are still returned.
    pub async fn search_cancellable(
        &self,
        seeds: &[Seed],
        rule: &RuleSpec,
        deadline: Duration,
        cancel: &CancellationToken,
    ) -> Vec<LogMessage> {
        let until = deadline_instant(deadline);
        let mut tasks = JoinSet::new();

        for seed in seeds {
            let Some(codec) = self.codecs.get(&seed.stream) else {
                warn!(stream = %seed.stream, "No codec for stream; seed skipped");
                continue;
            };
            let scan = SeedScan {
                log: Arc::clone(&self.log),
                seed: seed.clone(),
                window: self
                    .windows
                    .get(&seed.stream)
                    .copied()
                    .unwrap_or_default(),
                rule: rule.build(codec),
                until,
                max_fetch_errors: self.config.max_fetch_errors,
                cancel: cancel.child_token(),
            };
            let span = debug_span!(
                "search_seed",
                stream = %seed.stream,
                partition = seed.partition,
                offset = seed.offset
            );
            tasks.spawn(scan.run().instrument(span));
        }

        let mut results = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(matches) => results.extend(matches),
                Err(e) => warn!(error = %e, "Seed scan task failed"),
            }
        }

        info!(
            seeds = seeds.len(),
            matches = results.len(),
            "Search finished"
        );
        results
    }
}

/// Far enough ahead to never elapse during a scan.
const FAR_FUTURE: Duration = Duration::from_secs(30 * 365 * 24 * 60 * 60);

/// `now + deadline`, saturating instead of overflowing for huge deadlines.
fn deadline_instant(deadline: Duration) -> Instant {
    let now = Instant::now();
    now.checked_add(deadline)
        .or_else(|| now.checked_add(FAR_FUTURE))
        .unwrap_or(now)
}

struct SeedScan {
    log: Arc<dyn MessageLog>,
    seed: Seed,
    window: FetchWindow,
    rule: MatchRule,
    until: Instant,
    max_fetch_errors: usize,
    cancel: CancellationToken,
}

impl SeedScan {
    async fn run(mut self) -> Vec<LogMessage> {
        let start = self.seed.offset.max(0);
        let opened = timeout_at(
            self.until,
            self.log.open(
                &self.seed.stream,
                self.seed.partition,
                start,
                self.window,
                ReadMode::Scan,
            ),
        )
        .await;

        let mut reader = match opened {
            Ok(Ok(reader)) => reader,
            Ok(Err(e)) => {
                warn!(error = %e, "Could not open partition for scan");
                return Vec::new();
            }
            Err(_) => {
                debug!("Deadline elapsed before the partition opened");
                return Vec::new();
            }
        };

        let mut matches = Vec::new();
        let mut consecutive_errors = 0;

        loop {
            let fetched = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    debug!("Scan cancelled");
                    break;
                }
                fetched = timeout_at(self.until, reader.fetch()) => fetched,
            };

            match fetched {
                Err(_) => {
                    debug!("Deadline elapsed");
                    break;
                }
                Ok(Ok(None)) => {
                    debug!("End of partition");
                    break;
                }
                Ok(Ok(Some(message))) => {
                    consecutive_errors = 0;
                    if self.rule.advance(&message) {
                        debug!(offset = message.offset, "Matched");
                        matches.push(message);
                    }
                }
                Ok(Err(e)) => {
                    consecutive_errors += 1;
                    warn!(error = %e, consecutive_errors, "Fetch failed during scan");
                    if consecutive_errors > self.max_fetch_errors {
                        warn!("Too many consecutive fetch errors; abandoning scan");
                        break;
                    }
                }
            }
        }

        matches
    }
}

/// Decode matched messages with their stream's codec, dropping any that fail.
pub fn decode_matches(codecs: &CodecRegistry, messages: &[LogMessage]) -> Vec<serde_json::Value> {
    messages
        .iter()
        .filter_map(|message| {
            let codec: Arc<dyn Codec> = codecs.get(&message.stream)?;
            match codec.decode(&message.value) {
                Ok(record) => Some(record.into_value()),
                Err(e) => {
                    warn!(
                        stream = %message.stream,
                        partition = message.partition,
                        offset = message.offset,
                        error = %e,
                        "Matched message no longer decodes"
                    );
                    None
                }
            }
        })
        .collect()
}
