//! Indexing dispatch: inline processing or queue handoff.
//!
//! The strategy is chosen once at construction and held behind the single
//! `index` entry point; call sites never branch on the mode flag.

use std::sync::Arc;

use tracing::info;

use crate::config::{Config, IndexingMode};
use crate::error::{Error, Result};
use crate::models::IndexingJob;

use super::indexer::IndexerService;
use super::queue::{JobQueue, RedisQueue};

/// Entry point the chat pipeline calls once per persisted message.
pub struct IndexingDispatcher {
    backend: Backend,
}

enum Backend {
    /// Run the processing routine inline; the caller observes the outcome.
    Inline(IndexerService),
    /// Hand the job to the queue; a worker process observes the outcome.
    Queued(Arc<dyn JobQueue>),
}

impl IndexingDispatcher {
    /// Synchronous-mode dispatcher over an indexer.
    pub fn inline(indexer: IndexerService) -> Self {
        Self {
            backend: Backend::Inline(indexer),
        }
    }

    /// Asynchronous-mode dispatcher over a queue.
    pub fn queued(queue: Arc<dyn JobQueue>) -> Self {
        Self {
            backend: Backend::Queued(queue),
        }
    }

    /// Wire the dispatcher from configuration: embedding client plus
    /// Qdrant store inline, or the Redis queue in queued mode. A missing
    /// queue URL in queued mode is a fatal configuration error.
    pub async fn from_config(config: &Config) -> Result<Self> {
        match config.indexing.mode {
            IndexingMode::Sync => {
                let indexer = IndexerService::from_config(config)?;

                info!(mode = "sync", "Indexing dispatcher ready");
                Ok(Self::inline(indexer))
            }
            IndexingMode::Queued => {
                let url = config.queue.url.as_deref().ok_or_else(|| {
                    Error::Config("REDIS_URL must be set for queued indexing".to_string())
                })?;
                let queue = RedisQueue::connect(url, config.queue.key.clone()).await?;

                info!(mode = "queued", queue = %config.queue.key, "Indexing dispatcher ready");
                Ok(Self::queued(Arc::new(queue)))
            }
        }
    }

    pub fn mode(&self) -> IndexingMode {
        match &self.backend {
            Backend::Inline(_) => IndexingMode::Sync,
            Backend::Queued(_) => IndexingMode::Queued,
        }
    }

    /// Index one message. Inline mode returns after processing completes,
    /// success or failure visible to the caller; queued mode returns once
    /// the queue acknowledges the push, and the eventual outcome is not
    /// observable here.
    pub async fn index(&self, job: IndexingJob) -> Result<()> {
        match &self.backend {
            Backend::Inline(indexer) => {
                indexer.process(&job).await?;
                Ok(())
            }
            Backend::Queued(queue) => queue.push(&job).await,
        }
    }
}
