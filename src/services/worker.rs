//! Queue consumer: the long-running half of queued-mode indexing.
//!
//! One job is fully processed before the next is dequeued; horizontal
//! scaling is more worker processes against the same queue. A job-level
//! failure is logged and the job dropped - redelivery and duplicates are
//! already harmless because the store upsert is idempotent.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use crate::error::Error;

use super::indexer::{IndexOutcome, IndexerService};
use super::queue::JobQueue;

/// Bounded wait for one blocking pop; also bounds shutdown latency.
const POP_TIMEOUT: Duration = Duration::from_secs(5);

/// Backoff after a queue connection error.
const RECONNECT_BACKOFF: Duration = Duration::from_secs(1);

/// Single-consumer indexing worker.
#[derive(Clone)]
pub struct IndexWorker {
    inner: Arc<IndexWorkerInner>,
}

struct IndexWorkerInner {
    queue: Arc<dyn JobQueue>,
    indexer: IndexerService,
    running: RwLock<bool>,
}

impl IndexWorker {
    pub fn new(queue: Arc<dyn JobQueue>, indexer: IndexerService) -> Self {
        Self {
            inner: Arc::new(IndexWorkerInner {
                queue,
                indexer,
                running: RwLock::new(false),
            }),
        }
    }

    /// Start the worker loop. Returns a handle used to stop it.
    pub async fn start(&self) -> IndexWorkerHandle {
        *self.inner.running.write().await = true;

        let worker = self.clone();
        let handle = tokio::spawn(async move {
            worker.run_loop().await;
        });

        info!("Index worker started");

        IndexWorkerHandle {
            worker: self.clone(),
            handle,
        }
    }

    async fn run_loop(&self) {
        loop {
            if !*self.inner.running.read().await {
                info!("Index worker stopping");
                break;
            }

            match self.inner.queue.pop(POP_TIMEOUT).await {
                Ok(Some(job)) => match self.inner.indexer.process(&job).await {
                    Ok(IndexOutcome::Indexed) => {}
                    Ok(IndexOutcome::Skipped) => {
                        debug!(message_id = %job.message_id, "Job skipped");
                    }
                    // One bad job must never take the loop down; there is
                    // no retry queue, the job is dropped.
                    Err(e) => {
                        error!(message_id = %job.message_id, error = %e, "Failed to process indexing job");
                    }
                },
                Ok(None) => {}
                // A payload that does not parse is a job-level problem:
                // discard it and keep draining at full speed.
                Err(Error::Serialization(e)) => {
                    error!(error = %e, "Discarding malformed job payload");
                }
                Err(e) => {
                    warn!(error = %e, "Queue error, backing off");
                    sleep(RECONNECT_BACKOFF).await;
                }
            }
        }
    }
}

/// Handle for stopping a running worker.
pub struct IndexWorkerHandle {
    worker: IndexWorker,
    handle: JoinHandle<()>,
}

impl IndexWorkerHandle {
    /// Signal the loop to stop and wait for it to exit. The in-flight
    /// blocking pop bounds how long this takes.
    pub async fn stop(self) {
        *self.worker.inner.running.write().await = false;
        let _ = self.handle.await;
    }
}
