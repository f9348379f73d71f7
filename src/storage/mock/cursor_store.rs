//! Mock CursorStore implementation for testing.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::storage::{Cursor, CursorStore, Result, StorageError};

type CursorKey = (String, i32);

/// Mock cursor store that keeps cursors in memory.
///
/// Every successful `set` is also appended to a history so tests can check
/// the exact sequence of commits.
#[derive(Default)]
pub struct MockCursorStore {
    cursors: RwLock<HashMap<CursorKey, i64>>,
    commits: RwLock<Vec<Cursor>>,
    fail_on_get: RwLock<bool>,
    fail_on_set: RwLock<bool>,
}

impl MockCursorStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set_fail_on_get(&self, fail: bool) {
        *self.fail_on_get.write().await = fail;
    }

    pub async fn set_fail_on_set(&self, fail: bool) {
        *self.fail_on_set.write().await = fail;
    }

    /// Offsets passed to `set`, in call order, for one partition.
    pub async fn commits(&self, stream: &str, partition: i32) -> Vec<i64> {
        self.commits
            .read()
            .await
            .iter()
            .filter(|c| c.stream == stream && c.partition == partition)
            .map(|c| c.offset)
            .collect()
    }

    /// Current offset without the not-found error.
    pub async fn peek(&self, stream: &str, partition: i32) -> Option<i64> {
        self.cursors
            .read()
            .await
            .get(&(stream.to_string(), partition))
            .copied()
    }
}

#[async_trait]
impl CursorStore for MockCursorStore {
    async fn get(&self, stream: &str, partition: i32) -> Result<i64> {
        if *self.fail_on_get.read().await {
            return Err(StorageError::Backend("Mock get failure".to_string()));
        }
        self.peek(stream, partition)
            .await
            .ok_or_else(|| StorageError::CursorNotFound {
                stream: stream.to_string(),
                partition,
            })
    }

    async fn set_if_absent(&self, stream: &str, partition: i32, offset: i64) -> Result<bool> {
        if *self.fail_on_set.read().await {
            return Err(StorageError::Backend("Mock set failure".to_string()));
        }
        let mut cursors = self.cursors.write().await;
        let key = (stream.to_string(), partition);
        if cursors.contains_key(&key) {
            return Ok(false);
        }
        cursors.insert(key, offset);
        Ok(true)
    }

    async fn set(&self, stream: &str, partition: i32, offset: i64) -> Result<()> {
        if *self.fail_on_set.read().await {
            return Err(StorageError::Backend("Mock set failure".to_string()));
        }
        self.cursors
            .write()
            .await
            .insert((stream.to_string(), partition), offset);
        self.commits
            .write()
            .await
            .push(Cursor::new(stream, partition, offset));
        Ok(())
    }

    async fn list(&self) -> Result<Vec<Cursor>> {
        if *self.fail_on_get.read().await {
            return Err(StorageError::Backend("Mock list failure".to_string()));
        }
        Ok(self
            .cursors
            .read()
            .await
            .iter()
            .map(|((stream, partition), offset)| Cursor::new(stream.clone(), *partition, *offset))
            .collect())
    }
}
