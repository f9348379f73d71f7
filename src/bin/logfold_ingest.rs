//! logfold-ingest: Log folding service
//!
//! Consumes every partition of every configured stream and applies the
//! command lists embedded in each message to the key/value store.
//!
//! ## Architecture
//! ```text
//! [kafka topic/partition] --> [partition loop] --> [redis commands]
//!                                     |
//!                                     v
//!                              [redis cursor hash]
//! ```
//!
//! ## Configuration
//! - LOGFOLD_CONFIG: Path to a YAML config file (optional)
//! - LOGFOLD_LOG: Log filter (default: info)
//! - LOGFOLD_LOG_FORMAT: Set to `json` for structured logs
//!
//! Stops on Ctrl-C after committing processed progress. Exits non-zero if
//! any partition stopped on an error.

use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use logfold::broker::init_broker;
use logfold::config::Config;
use logfold::ingest::{Backends, Ingestor};
use logfold::storage::init_storage;
use logfold::utils::bootstrap::{connect_with_retry, init_tracing};
use logfold::utils::retry::connection_backoff;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let config = Config::load(None).map_err(|e| {
        error!("Failed to load configuration: {}", e);
        e
    })?;

    let (cursors, commands) = connect_with_retry(
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

    let ingestor = Ingestor::from_config(
        &config,
        Backends {
            log,
            cursors,
            commands,
        },
    );

    let cancel = CancellationToken::new();
    let mut running = tokio::spawn({
        let cancel = cancel.clone();
        async move { ingestor.run(cancel).await }
    });

    info!(streams = config.streams.len(), "logfold-ingest started");

    let outcomes = tokio::select! {
        joined = &mut running => joined?,
        signal = tokio::signal::ctrl_c() => {
            signal?;
            info!("Shutdown requested");
            cancel.cancel();
            running.await?
        }
    };

    let failed = outcomes.iter().filter(|o| o.is_err()).count();
    if failed > 0 {
        error!(failed, "Ingestion stopped with errors");
        return Err(format!("{failed} partition(s) stopped with errors").into());
    }

    info!("logfold-ingest stopped");
    Ok(())
}
