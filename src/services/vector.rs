//! Vector store abstraction and the point/search types shared by its
//! implementations.
//!
//! [`super::QdrantStore`] is the production implementation;
//! [`InMemoryVectorStore`] backs tests and zero-dependency local
//! development.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::error::{Error, Result};
use crate::models::MessageRole;

/// Default number of search results.
pub const DEFAULT_SEARCH_LIMIT: usize = 5;

/// Default relevance floor for similarity search.
pub const DEFAULT_SCORE_THRESHOLD: f32 = 0.6;

/// Metadata stored alongside a message vector.
///
/// `user_id` and `chat_id` are immutable for the lifetime of a point;
/// changing ownership is delete + reinsert, never an update.
#[derive(Debug, Clone, PartialEq)]
pub struct PointPayload {
    pub user_id: String,
    pub chat_id: String,
    pub message_id: String,
    pub role: MessageRole,
    /// Write time, not message creation time.
    pub timestamp: DateTime<Utc>,
    pub content_preview: String,
}

/// One stored vector plus payload. The store keys points by
/// `payload.message_id`, so the point id and the payload field cannot
/// diverge.
#[derive(Debug, Clone)]
pub struct MessagePoint {
    pub vector: Vec<f32>,
    pub payload: PointPayload,
}

/// Similarity search parameters. All filters are conjunctive, on top of
/// the mandatory user scope.
#[derive(Debug, Clone)]
pub struct SearchOptions {
    pub limit: usize,
    /// Relevance floor: results below this score never appear, regardless
    /// of rank.
    pub score_threshold: f32,
    pub chat_id: Option<String>,
    pub role: Option<MessageRole>,
    /// Inclusive lower bound on the point's write timestamp.
    pub after: Option<DateTime<Utc>>,
    /// Inclusive upper bound on the point's write timestamp.
    pub before: Option<DateTime<Utc>>,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            limit: DEFAULT_SEARCH_LIMIT,
            score_threshold: DEFAULT_SCORE_THRESHOLD,
            chat_id: None,
            role: None,
            after: None,
            before: None,
        }
    }
}

impl SearchOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_score_threshold(mut self, threshold: f32) -> Self {
        self.score_threshold = threshold;
        self
    }

    pub fn in_chat(mut self, chat_id: impl Into<String>) -> Self {
        self.chat_id = Some(chat_id.into());
        self
    }

    pub fn with_role(mut self, role: MessageRole) -> Self {
        self.role = Some(role);
        self
    }

    pub fn after(mut self, timestamp: DateTime<Utc>) -> Self {
        self.after = Some(timestamp);
        self
    }

    pub fn before(mut self, timestamp: DateTime<Utc>) -> Self {
        self.before = Some(timestamp);
        self
    }
}

/// One search result.
#[derive(Debug, Clone)]
pub struct SearchHit {
    pub score: f32,
    pub payload: PointPayload,
}

/// Vector store client: collection lifecycle, point mutations, filtered
/// similarity search.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Idempotent collection bootstrap: existence check, then creation
    /// with the configured dimension and payload indexes if absent. Cheap
    /// to call before every write.
    async fn ensure_collection(&self) -> Result<()>;

    /// Durable overwrite-by-id write: a point with the same message id
    /// replaces the previous one.
    async fn upsert(&self, point: MessagePoint) -> Result<()>;

    /// Remove the point for one message, if present.
    async fn delete_message(&self, message_id: &str) -> Result<()>;

    /// Remove every point belonging to a chat.
    async fn delete_chat(&self, chat_id: &str) -> Result<()>;

    /// Remove every point belonging to a user.
    async fn delete_user(&self, user_id: &str) -> Result<()>;

    /// Top-`limit` cosine matches for `user_id` at or above the score
    /// threshold, narrowed by the options' filters, ordered by descending
    /// score.
    async fn search(
        &self,
        vector: &[f32],
        user_id: &str,
        options: &SearchOptions,
    ) -> Result<Vec<SearchHit>>;
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

/// In-memory vector store for tests and local development.
///
/// The collection does not exist until [`VectorStore::ensure_collection`]
/// is called, mirroring the lazy bootstrap of the real store.
pub struct InMemoryVectorStore {
    dimension: usize,
    collection: RwLock<Option<HashMap<String, MessagePoint>>>,
}

impl InMemoryVectorStore {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            collection: RwLock::new(None),
        }
    }

    /// Whether the collection has been created.
    pub async fn collection_exists(&self) -> bool {
        self.collection.read().await.is_some()
    }

    /// Number of stored points.
    pub async fn len(&self) -> usize {
        self.collection.read().await.as_ref().map_or(0, HashMap::len)
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Fetch one point by message id.
    pub async fn get(&self, message_id: &str) -> Option<MessagePoint> {
        self.collection
            .read()
            .await
            .as_ref()
            .and_then(|points| points.get(message_id).cloned())
    }
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    async fn ensure_collection(&self) -> Result<()> {
        let mut collection = self.collection.write().await;
        if collection.is_none() {
            *collection = Some(HashMap::new());
        }
        Ok(())
    }

    async fn upsert(&self, point: MessagePoint) -> Result<()> {
        if point.vector.len() != self.dimension {
            return Err(Error::Config(format!(
                "Vector dimension {} does not match collection dimension {}",
                point.vector.len(),
                self.dimension
            )));
        }

        let mut collection = self.collection.write().await;
        let points = collection
            .as_mut()
            .ok_or_else(|| Error::VectorStore("Collection does not exist".to_string()))?;

        points.insert(point.payload.message_id.clone(), point);
        Ok(())
    }

    async fn delete_message(&self, message_id: &str) -> Result<()> {
        if let Some(points) = self.collection.write().await.as_mut() {
            points.remove(message_id);
        }
        Ok(())
    }

    async fn delete_chat(&self, chat_id: &str) -> Result<()> {
        if let Some(points) = self.collection.write().await.as_mut() {
            points.retain(|_, point| point.payload.chat_id != chat_id);
        }
        Ok(())
    }

    async fn delete_user(&self, user_id: &str) -> Result<()> {
        if let Some(points) = self.collection.write().await.as_mut() {
            points.retain(|_, point| point.payload.user_id != user_id);
        }
        Ok(())
    }

    async fn search(
        &self,
        vector: &[f32],
        user_id: &str,
        options: &SearchOptions,
    ) -> Result<Vec<SearchHit>> {
        let collection = self.collection.read().await;
        let Some(points) = collection.as_ref() else {
            return Ok(Vec::new());
        };

        let mut hits: Vec<SearchHit> = points
            .values()
            .filter(|point| point.payload.user_id == user_id)
            .filter(|point| {
                options
                    .chat_id
                    .as_ref()
                    .map_or(true, |chat_id| &point.payload.chat_id == chat_id)
            })
            .filter(|point| options.role.map_or(true, |role| point.payload.role == role))
            .filter(|point| {
                options
                    .after
                    .map_or(true, |after| point.payload.timestamp >= after)
            })
            .filter(|point| {
                options
                    .before
                    .map_or(true, |before| point.payload.timestamp <= before)
            })
            .map(|point| SearchHit {
                score: cosine_similarity(vector, &point.vector),
                payload: point.payload.clone(),
            })
            .filter(|hit| hit.score >= options.score_threshold)
            .collect();

        hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        hits.truncate(options.limit);

        Ok(hits)
    }
}
