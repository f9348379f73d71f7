//! CursorStore trait definition.

use async_trait::async_trait;

use super::Result;

/// Durable "next offset to consume" for one stream partition.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Cursor {
    pub stream: String,
    pub partition: i32,
    pub offset: i64,
}

impl Cursor {
    pub fn new(stream: impl Into<String>, partition: i32, offset: i64) -> Self {
        Self {
            stream: stream.into(),
            partition,
            offset,
        }
    }

    /// Composite record key: `<stream>:<partition>`.
    pub fn field(stream: &str, partition: i32) -> String {
        format!("{}:{}", stream, partition)
    }

    /// Split a composite record key back into (stream, partition).
    ///
    /// Stream names may themselves contain `:`; the partition is always the
    /// last segment.
    pub fn parse_field(field: &str) -> Option<(String, i32)> {
        let (stream, partition) = field.rsplit_once(':')?;
        if stream.is_empty() {
            return None;
        }
        let partition = partition.parse().ok()?;
        Some((stream.to_string(), partition))
    }
}

/// Interface for cursor persistence.
///
/// Records are visible to every process sharing the backing store: the
/// ingestion loop resumes from them after a crash and search discovers seed
/// offsets from them.
///
/// # Implementations
///
/// - `RedisCursorStore`: one Redis hash, field per partition
/// - `MockCursorStore`: In-memory mock for testing
#[async_trait]
pub trait CursorStore: Send + Sync {
    /// Next offset to consume.
    ///
    /// Fails with `StorageError::CursorNotFound` if no record exists.
    async fn get(&self, stream: &str, partition: i32) -> Result<i64>;

    /// Create the record if it does not exist. Never overwrites.
    ///
    /// Returns `true` if this call created the record.
    async fn set_if_absent(&self, stream: &str, partition: i32, offset: i64) -> Result<bool>;

    /// Unconditionally store the next offset to consume.
    async fn set(&self, stream: &str, partition: i32, offset: i64) -> Result<()>;

    /// Every cursor record currently stored, in no particular order.
    async fn list(&self) -> Result<Vec<Cursor>>;
}
