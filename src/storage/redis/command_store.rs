//! Redis CommandStore implementation.
//!
//! Maps each operation onto one Redis command: `RPUSH`, `HSET`, `SET`,
//! `ZINCRBY`. Works unchanged against Ledis and other Redis-protocol stores.

use async_trait::async_trait;
use redis::{aio::ConnectionManager, AsyncCommands, Client};
use tracing::{debug, info};

use crate::storage::{CommandStore, Reply, Result};

pub struct RedisCommandStore {
    conn: ConnectionManager,
}

impl RedisCommandStore {
    pub async fn new(url: &str) -> Result<Self> {
        let client = Client::open(url)?;
        let conn = ConnectionManager::new(client).await?;

        info!(url = %url, "Connected to Redis for commands");

        Ok(Self { conn })
    }
}

#[async_trait]
impl CommandStore for RedisCommandStore {
    async fn list_append(&self, key: &str, value: &[u8]) -> Result<Reply> {
        let mut conn = self.conn.clone();
        let len: i64 = conn.rpush(key, value).await?;
        debug!(key = %key, len, "RPUSH");
        Ok(Reply::Int(len))
    }

    async fn hash_set(&self, key: &str, field: &str, value: &[u8]) -> Result<Reply> {
        let mut conn = self.conn.clone();
        // HSET only reports how many fields were added, so the written value
        // is what flows on to the next command.
        let added: i64 = conn.hset(key, field, value).await?;
        debug!(key = %key, field = %field, added, "HSET");
        Ok(Reply::Bytes(value.to_vec()))
    }

    async fn assign(&self, key: &str, value: &[u8]) -> Result<Reply> {
        let mut conn = self.conn.clone();
        let status: String = conn.set(key, value).await?;
        debug!(key = %key, status = %status, "SET");
        Ok(Reply::Status(status))
    }

    async fn sorted_set_incr(&self, key: &str, member: &[u8], delta: f64) -> Result<Reply> {
        let mut conn = self.conn.clone();
        let score: f64 = conn.zincr(key, member, delta).await?;
        debug!(key = %key, score, "ZINCRBY");
        Ok(Reply::Float(score))
    }
}
