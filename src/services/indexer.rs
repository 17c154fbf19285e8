//! The shared processing routine and the retrieval read path.
//!
//! Both dispatch modes funnel into [`IndexerService::process`]; retrieval
//! is a thin embed-then-search composition over the same clients.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info};

use crate::config::Config;
use crate::error::Result;
use crate::models::IndexingJob;

use super::embeddings::{Embedder, EmbeddingClient};
use super::qdrant::QdrantStore;
use super::vector::{MessagePoint, PointPayload, SearchHit, SearchOptions, VectorStore};

/// Extracted text shorter than this is skipped; tiny fragments add noise
/// without retrieval value.
const MIN_INDEXABLE_CHARS: usize = 10;

/// Character budget for the stored content preview.
const PREVIEW_CHARS: usize = 500;

/// Outcome of processing one job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexOutcome {
    /// A vector point was written for the message.
    Indexed,
    /// The message carried no indexable text; nothing was written.
    Skipped,
}

/// Runs the indexing routine and serves similarity queries.
#[derive(Clone)]
pub struct IndexerService {
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn VectorStore>,
}

impl IndexerService {
    pub fn new(embedder: Arc<dyn Embedder>, store: Arc<dyn VectorStore>) -> Self {
        Self { embedder, store }
    }

    /// Wire the service over the real clients. Retrieval needs this in
    /// every deployment; queued-mode producers only need it in the worker
    /// process.
    pub fn from_config(config: &Config) -> Result<Self> {
        let embedder = Arc::new(EmbeddingClient::new(&config.embedding)?);
        let store = Arc::new(QdrantStore::new(&config.qdrant, config.embedding.dimension)?);
        Ok(Self::new(embedder, store))
    }

    /// Process one indexing job: extract text, gate on length, ensure the
    /// collection, embed, upsert.
    ///
    /// Skipping is a deliberate no-op, not an error. Embedding and store
    /// failures propagate to the caller: the sync dispatcher surfaces
    /// them, the worker logs and drops the job.
    pub async fn process(&self, job: &IndexingJob) -> Result<IndexOutcome> {
        let text = job.plain_text();
        let text = text.trim();

        // The length gate runs before any store interaction, so a skipped
        // job has no side effects at all - not even collection creation.
        if text.chars().count() < MIN_INDEXABLE_CHARS {
            debug!(message_id = %job.message_id, "Skipping message without indexable text");
            return Ok(IndexOutcome::Skipped);
        }

        self.store.ensure_collection().await?;

        let vector = self.embedder.embed(text).await?;

        let payload = PointPayload {
            user_id: job.user_id.clone(),
            chat_id: job.chat_id.clone(),
            message_id: job.message_id.clone(),
            role: job.role,
            timestamp: Utc::now(),
            content_preview: text.chars().take(PREVIEW_CHARS).collect(),
        };

        self.store.upsert(MessagePoint { vector, payload }).await?;

        info!(message_id = %job.message_id, chat_id = %job.chat_id, "Indexed message");

        Ok(IndexOutcome::Indexed)
    }

    /// Embed `query` once and return prior messages of `user_id` ranked by
    /// similarity, subject to the options' filters and relevance floor.
    pub async fn search(
        &self,
        query: &str,
        user_id: &str,
        options: &SearchOptions,
    ) -> Result<Vec<SearchHit>> {
        let vector = self.embedder.embed(query).await?;
        self.store.search(&vector, user_id, options).await
    }
}
