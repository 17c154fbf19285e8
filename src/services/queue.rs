//! Durable FIFO job queue between the chat pipeline and the index worker.
//!
//! Delivery is at-least-once: a crash between dequeue and completed
//! processing redelivers or duplicates the job. Exactly-once store state
//! comes from the idempotent upsert, not from the queue.

use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use tokio::sync::{mpsc, Mutex};
use tracing::debug;

use crate::error::{Error, Result};
use crate::models::IndexingJob;

/// FIFO queue with blocking, bounded-wait consumption.
#[async_trait]
pub trait JobQueue: Send + Sync {
    /// Append a job; returns once the backend acknowledges the write.
    async fn push(&self, job: &IndexingJob) -> Result<()>;

    /// Pop the oldest job, waiting up to `timeout`. `Ok(None)` means the
    /// wait elapsed on an empty queue; `Err` is a connection-level failure
    /// (or a malformed payload, surfaced as `Error::Serialization`).
    async fn pop(&self, timeout: Duration) -> Result<Option<IndexingJob>>;
}

/// Redis-list-backed queue: `RPUSH` on push, `BLPOP` on pop.
///
/// Any number of competing consumers may pop from the same key; each job
/// is delivered to exactly one of them.
#[derive(Clone)]
pub struct RedisQueue {
    conn: ConnectionManager,
    key: String,
}

impl RedisQueue {
    /// Connect to the queue backend. The connection is created once per
    /// process and reused; the manager reconnects after failures.
    pub async fn connect(url: &str, key: impl Into<String>) -> Result<Self> {
        let client = redis::Client::open(url)
            .map_err(|e| Error::Config(format!("Invalid Redis URL: {}", e)))?;
        let conn = ConnectionManager::new(client).await?;

        Ok(Self {
            conn,
            key: key.into(),
        })
    }
}

#[async_trait]
impl JobQueue for RedisQueue {
    async fn push(&self, job: &IndexingJob) -> Result<()> {
        let payload = serde_json::to_string(job)?;
        let mut conn = self.conn.clone();
        let _: usize = conn.rpush(&self.key, payload).await?;

        debug!(queue = %self.key, message_id = %job.message_id, "Enqueued indexing job");

        Ok(())
    }

    async fn pop(&self, timeout: Duration) -> Result<Option<IndexingJob>> {
        let mut conn = self.conn.clone();
        let entry: Option<(String, String)> = conn.blpop(&self.key, timeout.as_secs_f64()).await?;

        match entry {
            Some((_, payload)) => Ok(Some(serde_json::from_str(&payload)?)),
            None => Ok(None),
        }
    }
}

/// Process-local FIFO queue for tests.
///
/// Jobs still round-trip through their JSON wire form, so queue consumers
/// exercise the same payloads as with the Redis backend.
pub struct InMemoryQueue {
    tx: mpsc::UnboundedSender<String>,
    rx: Mutex<mpsc::UnboundedReceiver<String>>,
}

impl InMemoryQueue {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            tx,
            rx: Mutex::new(rx),
        }
    }
}

impl Default for InMemoryQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl JobQueue for InMemoryQueue {
    async fn push(&self, job: &IndexingJob) -> Result<()> {
        let payload = serde_json::to_string(job)?;
        self.tx
            .send(payload)
            .map_err(|_| Error::Queue("Queue receiver dropped".to_string()))?;
        Ok(())
    }

    async fn pop(&self, timeout: Duration) -> Result<Option<IndexingJob>> {
        let mut rx = self.rx.lock().await;
        match tokio::time::timeout(timeout, rx.recv()).await {
            Ok(Some(payload)) => Ok(Some(serde_json::from_str(&payload)?)),
            Ok(None) => Err(Error::Queue("Queue sender dropped".to_string())),
            Err(_) => Ok(None),
        }
    }
}
