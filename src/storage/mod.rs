//! Storage collaborators.
//!
//! This module contains:
//! - `CursorStore` trait: durable next-offset markers per stream partition
//! - `CommandStore` trait: the list/hash/key/sorted-set operations commands
//!   are applied to
//! - Implementations: Redis (feature `redis`), Mock (in-memory)

use std::sync::Arc;

use tracing::info;

use crate::config::{StorageConfig, StorageType};

mod command_store;
mod cursor_store;
pub mod mock;

#[cfg(feature = "redis")]
pub mod redis;

pub use command_store::{CommandStore, Reply};
pub use cursor_store::{Cursor, CursorStore};
pub use mock::{MockCommandStore, MockCursorStore, StoreCall};

#[cfg(feature = "redis")]
pub use self::redis::{RedisCommandStore, RedisCursorStore};

/// Result type for storage operations.
pub type Result<T> = std::result::Result<T, StorageError>;

/// Errors that can occur during storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Cursor not found: stream={stream}, partition={partition}")]
    CursorNotFound { stream: String, partition: i32 },

    #[error("Corrupt cursor record '{field}': {value:?}")]
    CorruptCursor { field: String, value: String },

    #[error("Storage backend error: {0}")]
    Backend(String),

    #[cfg(feature = "redis")]
    #[error("Redis error: {0}")]
    Redis(#[from] ::redis::RedisError),
}

/// Initialize storage based on configuration.
///
/// Returns the (CursorStore, CommandStore) pair for the configured backend.
/// Both halves of the Redis backend share one connection URL.
pub async fn init_storage(
    config: &StorageConfig,
) -> std::result::Result<(Arc<dyn CursorStore>, Arc<dyn CommandStore>), Box<dyn std::error::Error>>
{
    match config.storage_type {
        StorageType::Memory => {
            info!("Storage: in-memory");
            Ok((
                Arc::new(MockCursorStore::new()),
                Arc::new(MockCommandStore::new()),
            ))
        }
        #[cfg(feature = "redis")]
        StorageType::Redis => {
            info!(url = %config.redis.url, "Storage: redis");
            let cursors =
                RedisCursorStore::new(&config.redis.url, Some(&config.redis.cursor_key)).await?;
            let commands = RedisCommandStore::new(&config.redis.url).await?;
            Ok((Arc::new(cursors), Arc::new(commands)))
        }
        #[cfg(not(feature = "redis"))]
        StorageType::Redis => {
            tracing::error!("Redis storage requested but 'redis' feature is not enabled");
            Err("Redis feature not enabled".into())
        }
    }
}
