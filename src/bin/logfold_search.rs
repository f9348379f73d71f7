//! logfold-search: Historical search
//!
//! Scans every ingested partition from its last processed message and prints
//! the related messages as JSON lines on stdout.
//!
//! ## Configuration
//! - LOGFOLD_SEARCH_ID: Identifier to anchor on (required)
//! - LOGFOLD_SEARCH_CATEGORY: Category to match after the anchor. Without it
//!   every message from the anchor onwards matches.
//! - LOGFOLD_SEARCH_STREAM: Only scan this stream (optional)
//! - LOGFOLD_SEARCH_DEADLINE_SECS: Time budget (default: `search.deadline_secs`)
//! - LOGFOLD_CONFIG / LOGFOLD_LOG / LOGFOLD_LOG_FORMAT as for logfold-ingest

use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use logfold::broker::init_broker;
use logfold::config::Config;
use logfold::search::{decode_matches, seeds_from_cursors, RuleSpec, SearchEngine};
use logfold::storage::init_storage;
use logfold::utils::bootstrap::{connect_with_retry, init_tracing};
use logfold::utils::retry::connection_backoff;

const SEARCH_ID_ENV_VAR: &str = "LOGFOLD_SEARCH_ID";
const SEARCH_CATEGORY_ENV_VAR: &str = "LOGFOLD_SEARCH_CATEGORY";
const SEARCH_STREAM_ENV_VAR: &str = "LOGFOLD_SEARCH_STREAM";
const SEARCH_DEADLINE_ENV_VAR: &str = "LOGFOLD_SEARCH_DEADLINE_SECS";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let config = Config::load(None).map_err(|e| {
        error!("Failed to load configuration: {}", e);
        e
    })?;

    let id = std::env::var(SEARCH_ID_ENV_VAR).map_err(|_| {
        error!("{} must be set", SEARCH_ID_ENV_VAR);
        format!("{SEARCH_ID_ENV_VAR} not set")
    })?;
    let rule = match std::env::var(SEARCH_CATEGORY_ENV_VAR) {
        Ok(category) => RuleSpec::subject(id, category),
        Err(_) => RuleSpec::comment(id),
    };
    let stream = std::env::var(SEARCH_STREAM_ENV_VAR).ok();
    let deadline = std::env::var(SEARCH_DEADLINE_ENV_VAR)
        .ok()
        .and_then(|s| s.parse().ok())
        .map(Duration::from_secs)
        .unwrap_or_else(|| config.search.deadline());

    let (cursors, _) = connect_with_retry(
        "redis",
        &config.storage.redis.url,
        connection_backoff(),
        || init_storage(&config.storage),
    )
    .await?;

    let log = connect_with_retry(
        "kafka",
        &config.broker.kafka.bootstrap_servers,
        connection_backoff(),
        || init_broker(&config.broker),
    )
    .await?;

    let seeds = seeds_from_cursors(&cursors.list().await?, stream.as_deref());
    info!(seeds = seeds.len(), ?rule, ?deadline, "Searching");

    let engine = SearchEngine::from_config(&config, log);
    let cancel = CancellationToken::new();
    let search = engine.search_cancellable(&seeds, &rule, deadline, &cancel);
    tokio::pin!(search);

    let matches = tokio::select! {
        matches = &mut search => matches,
        signal = tokio::signal::ctrl_c() => {
            signal?;
            info!("Interrupted; returning matches found so far");
            cancel.cancel();
            search.await
        }
    };

    for value in decode_matches(&config.codecs(), &matches) {
        println!("{}", serde_json::to_string(&value)?);
    }

    Ok(())
}

