//! Task Source: FIFO bundle queue.
//!
//! A pop removes the item for good. There is no visibility timeout and no
//! redelivery, so a bundle that fails after being taken is dropped.

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use std::collections::VecDeque;
use std::sync::Mutex;

use crate::error::QueueError;
use crate::types::BundleTask;

#[async_trait]
pub trait TaskSource: Send + Sync {
    /// Atomically pop the head of the queue. `Ok(None)` means the queue is
    /// empty and is not an error.
    async fn take_next(&self) -> Result<Option<String>, QueueError>;
}

// ---------------------------------------------------------------------------
// Redis
// ---------------------------------------------------------------------------

/// Redis list used as the bundle queue: producers `RPUSH`, we `LPOP`.
#[derive(Clone)]
pub struct RedisTaskSource {
    conn: ConnectionManager,
    key: String,
}

impl RedisTaskSource {
    /// Connect eagerly so an unreachable queue fails at startup.
    pub async fn connect(url: &str, key: impl Into<String>) -> Result<Self, QueueError> {
        let client = redis::Client::open(url)?;
        let conn = ConnectionManager::new(client).await?;
        Ok(Self {
            conn,
            key: key.into(),
        })
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Append a task at the tail. Returns the queue length after the push.
    pub async fn enqueue(&self, task: &BundleTask) -> Result<u64, QueueError> {
        let payload = serde_json::to_string(task)?;
        let mut conn = self.conn.clone();
        let len: u64 = redis::cmd("RPUSH")
            .arg(&self.key)
            .arg(payload)
            .query_async(&mut conn)
            .await?;
        Ok(len)
    }
}

#[async_trait]
impl TaskSource for RedisTaskSource {
    async fn take_next(&self) -> Result<Option<String>, QueueError> {
        let mut conn = self.conn.clone();
        let item: Option<String> = redis::cmd("LPOP")
            .arg(&self.key)
            .query_async(&mut conn)
            .await?;
        Ok(item)
    }
}

// ---------------------------------------------------------------------------
// In-memory
// ---------------------------------------------------------------------------

/// Process-local queue with the same pop semantics. Used for tests and for
/// driving the pipeline without a Redis instance.
#[derive(Debug, Default)]
pub struct MemoryTaskSource {
    items: Mutex<VecDeque<String>>,
}

impl MemoryTaskSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_raw(&self, raw: impl Into<String>) {
        self.lock().push_back(raw.into());
    }

    pub fn push(&self, task: &BundleTask) -> Result<(), QueueError> {
        self.push_raw(serde_json::to_string(task)?);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, VecDeque<String>> {
        // A poisoned queue still holds valid strings.
        self.items.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl TaskSource for MemoryTaskSource {
    async fn take_next(&self) -> Result<Option<String>, QueueError> {
        Ok(self.lock().pop_front())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_source_is_fifo_and_drains() {
        let source = MemoryTaskSource::new();
        source.push(&BundleTask::new("b1", "https://x/1.png")).unwrap();
        source.push_raw("not json");

        let first = source.take_next().await.unwrap().unwrap();
        assert_eq!(BundleTask::decode(&first).unwrap().bundle_id, "b1");
        assert_eq!(source.take_next().await.unwrap().as_deref(), Some("not json"));
        assert!(source.take_next().await.unwrap().is_none());
        assert!(source.is_empty());
    }
}
