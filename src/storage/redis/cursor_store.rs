//! Redis CursorStore implementation.
//!
//! All cursors live in a single hash so they can be listed with one
//! `HGETALL`. Each `(stream, partition)` pair is a field holding the next
//! offset as a decimal string.

use async_trait::async_trait;
use redis::{aio::ConnectionManager, AsyncCommands, Client};
use tracing::{debug, info};

use crate::storage::{Cursor, CursorStore, Result, StorageError};

/// Default hash key holding every cursor.
pub const DEFAULT_CURSOR_KEY: &str = "offset";

/// Redis implementation of CursorStore.
///
/// Hash key: `{cursor_key}`; field: `{stream}:{partition}`.
pub struct RedisCursorStore {
    conn: ConnectionManager,
    cursor_key: String,
}

impl RedisCursorStore {
    /// Create a new Redis cursor store.
    ///
    /// # Arguments
    /// * `url` - Redis connection URL (e.g., redis://localhost:6379)
    /// * `cursor_key` - Hash key holding the cursors (default: "offset")
    pub async fn new(url: &str, cursor_key: Option<&str>) -> Result<Self> {
        let client = Client::open(url)?;
        let conn = ConnectionManager::new(client).await?;

        info!(url = %url, "Connected to Redis for cursors");

        Ok(Self {
            conn,
            cursor_key: cursor_key.unwrap_or(DEFAULT_CURSOR_KEY).to_string(),
        })
    }

    fn parse_offset(field: &str, value: &str) -> Result<i64> {
        value.parse().map_err(|_| StorageError::CorruptCursor {
            field: field.to_string(),
            value: value.to_string(),
        })
    }
}

#[async_trait]
impl CursorStore for RedisCursorStore {
    async fn get(&self, stream: &str, partition: i32) -> Result<i64> {
        let field = Cursor::field(stream, partition);
        let mut conn = self.conn.clone();

        let value: Option<String> = conn.hget(&self.cursor_key, &field).await?;
        let value = value.ok_or_else(|| StorageError::CursorNotFound {
            stream: stream.to_string(),
            partition,
        })?;

        let offset = Self::parse_offset(&field, &value)?;
        debug!(stream = %stream, partition, offset, "Retrieved cursor from Redis");
        Ok(offset)
    }

    async fn set_if_absent(&self, stream: &str, partition: i32, offset: i64) -> Result<bool> {
        let field = Cursor::field(stream, partition);
        let mut conn = self.conn.clone();

        let created: bool = conn
            .hset_nx(&self.cursor_key, &field, offset.to_string())
            .await?;

        if created {
            info!(stream = %stream, partition, offset, "Initialized cursor in Redis");
        }
        Ok(created)
    }

    async fn set(&self, stream: &str, partition: i32, offset: i64) -> Result<()> {
        let field = Cursor::field(stream, partition);
        let mut conn = self.conn.clone();

        let _: () = conn
            .hset(&self.cursor_key, &field, offset.to_string())
            .await?;

        debug!(stream = %stream, partition, offset, "Stored cursor in Redis");
        Ok(())
    }

    async fn list(&self) -> Result<Vec<Cursor>> {
        let mut conn = self.conn.clone();
        let all: Vec<(String, String)> = conn.hgetall(&self.cursor_key).await?;

        let mut cursors = Vec::with_capacity(all.len());
        for (field, value) in all {
            let (stream, partition) =
                Cursor::parse_field(&field).ok_or_else(|| StorageError::CorruptCursor {
                    field: field.clone(),
                    value: value.clone(),
                })?;
            let offset = Self::parse_offset(&field, &value)?;
            cursors.push(Cursor::new(stream, partition, offset));
        }
        Ok(cursors)
    }
}
