//! Mock CommandStore implementation for testing.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::storage::{CommandStore, Reply, Result, StorageError};

/// One recorded storage call.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreCall {
    ListAppend {
        key: String,
        value: Vec<u8>,
    },
    HashSet {
        key: String,
        field: String,
        value: Vec<u8>,
    },
    Assign {
        key: String,
        value: Vec<u8>,
    },
    SortedSetIncr {
        key: String,
        member: Vec<u8>,
        delta: f64,
    },
}

impl StoreCall {
    pub fn key(&self) -> &str {
        match self {
            StoreCall::ListAppend { key, .. }
            | StoreCall::HashSet { key, .. }
            | StoreCall::Assign { key, .. }
            | StoreCall::SortedSetIncr { key, .. } => key,
        }
    }
}

#[derive(Default)]
struct Data {
    lists: HashMap<String, Vec<Vec<u8>>>,
    hashes: HashMap<String, HashMap<String, Vec<u8>>>,
    values: HashMap<String, Vec<u8>>,
    sorted_sets: HashMap<String, HashMap<Vec<u8>, f64>>,
}

/// Mock command store.
///
/// Applies operations to in-memory structures with the same reply shapes as
/// the Redis backend and records every attempted call in order. The hash
/// operation reports the prior field value when there was one.
#[derive(Default)]
pub struct MockCommandStore {
    data: RwLock<Data>,
    calls: RwLock<Vec<StoreCall>>,
    fail_on_call: RwLock<Option<usize>>,
}

impl MockCommandStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the call with this zero-based index (counted across all
    /// operations since creation).
    pub async fn set_fail_on_call(&self, index: Option<usize>) {
        *self.fail_on_call.write().await = index;
    }

    pub async fn calls(&self) -> Vec<StoreCall> {
        self.calls.read().await.clone()
    }

    pub async fn call_count(&self) -> usize {
        self.calls.read().await.len()
    }

    pub async fn list(&self, key: &str) -> Vec<Vec<u8>> {
        self.data
            .read()
            .await
            .lists
            .get(key)
            .cloned()
            .unwrap_or_default()
    }

    pub async fn hash_field(&self, key: &str, field: &str) -> Option<Vec<u8>> {
        self.data
            .read()
            .await
            .hashes
            .get(key)
            .and_then(|h| h.get(field))
            .cloned()
    }

    pub async fn value(&self, key: &str) -> Option<Vec<u8>> {
        self.data.read().await.values.get(key).cloned()
    }

    pub async fn score(&self, key: &str, member: &[u8]) -> Option<f64> {
        self.data
            .read()
            .await
            .sorted_sets
            .get(key)
            .and_then(|z| z.get(member))
            .copied()
    }

    /// Record the call and decide whether it should fail.
    async fn record(&self, call: StoreCall) -> Result<()> {
        let mut calls = self.calls.write().await;
        let index = calls.len();
        let key = call.key().to_string();
        calls.push(call);
        if *self.fail_on_call.read().await == Some(index) {
            return Err(StorageError::Backend(format!(
                "Mock failure on call {} (key={})",
                index, key
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl CommandStore for MockCommandStore {
    async fn list_append(&self, key: &str, value: &[u8]) -> Result<Reply> {
        self.record(StoreCall::ListAppend {
            key: key.to_string(),
            value: value.to_vec(),
        })
        .await?;
        let mut data = self.data.write().await;
        let list = data.lists.entry(key.to_string()).or_default();
        list.push(value.to_vec());
        Ok(Reply::Int(list.len() as i64))
    }

    async fn hash_set(&self, key: &str, field: &str, value: &[u8]) -> Result<Reply> {
        self.record(StoreCall::HashSet {
            key: key.to_string(),
            field: field.to_string(),
            value: value.to_vec(),
        })
        .await?;
        let mut data = self.data.write().await;
        let prior = data
            .hashes
            .entry(key.to_string())
            .or_default()
            .insert(field.to_string(), value.to_vec());
        Ok(Reply::Bytes(prior.unwrap_or_else(|| value.to_vec())))
    }

    async fn assign(&self, key: &str, value: &[u8]) -> Result<Reply> {
        self.record(StoreCall::Assign {
            key: key.to_string(),
            value: value.to_vec(),
        })
        .await?;
        self.data
            .write()
            .await
            .values
            .insert(key.to_string(), value.to_vec());
        Ok(Reply::Status("OK".to_string()))
    }

    async fn sorted_set_incr(&self, key: &str, member: &[u8], delta: f64) -> Result<Reply> {
        self.record(StoreCall::SortedSetIncr {
            key: key.to_string(),
            member: member.to_vec(),
            delta,
        })
        .await?;
        let mut data = self.data.write().await;
        let score = data
            .sorted_sets
            .entry(key.to_string())
            .or_default()
            .entry(member.to_vec())
            .or_insert(0.0);
        *score += delta;
        Ok(Reply::Float(*score))
    }
}
