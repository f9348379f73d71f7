//! CommandStore trait definition.

use async_trait::async_trait;

use super::Result;

/// Value returned by a storage operation.
///
/// Only its byte rendering is chained between commands, so a list length can
/// be stored as a hash field value by the next command.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    Nil,
    Int(i64),
    Float(f64),
    Bytes(Vec<u8>),
    Status(String),
}

impl Reply {
    /// Byte rendering used when a later command reads this result.
    ///
    /// Numbers render the way the store prints them (`3`, `1.5`); `Nil` is
    /// empty.
    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            Reply::Nil => Vec::new(),
            Reply::Int(n) => n.to_string().into_bytes(),
            Reply::Float(f) => f.to_string().into_bytes(),
            Reply::Bytes(b) => b.clone(),
            Reply::Status(s) => s.clone().into_bytes(),
        }
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, Reply::Nil)
    }
}

/// Structure-specific write operations.
///
/// Each call is atomic on its own; nothing spans calls.
#[async_trait]
pub trait CommandStore: Send + Sync {
    /// Append `value` to the list at `key`. Returns the new list length.
    async fn list_append(&self, key: &str, value: &[u8]) -> Result<Reply>;

    /// Set `field` of the hash at `key`. Returns the prior field value when
    /// the backend reports it, otherwise the value just written.
    async fn hash_set(&self, key: &str, field: &str, value: &[u8]) -> Result<Reply>;

    /// Assign `value` to `key`. Returns the assignment status.
    async fn assign(&self, key: &str, value: &[u8]) -> Result<Reply>;

    /// Increment the score of `member` in the sorted set at `key`. Returns
    /// the new score.
    async fn sorted_set_incr(&self, key: &str, member: &[u8], delta: f64) -> Result<Reply>;
}
