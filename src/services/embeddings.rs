//! Embedding client for the OpenAI embeddings API.
//!
//! A thin wrapper over the HTTP endpoint: one request per call, no retries
//! and no provider fallback - retry policy belongs to the caller. The
//! credentials are checked on first use rather than at startup, so
//! deployments that never index also never need them.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use crate::config::EmbeddingConfig;
use crate::error::{Error, Result};

/// Transport timeout for embedding calls.
const REQUEST_TIMEOUT_SECS: u64 = 60;

/// Text-to-vector provider.
///
/// Every vector produced by one configuration has the same dimension;
/// batch embedding is order-preserving with one vector per input.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Configured output dimension.
    fn dimension(&self) -> usize;

    /// Embed a single text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Embed many texts in one provider call.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}

/// OpenAI embeddings response (doubles as the error envelope).
#[derive(Debug, Deserialize)]
struct EmbedResponse {
    data: Option<Vec<EmbedData>>,
    error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
struct EmbedData {
    embedding: Vec<f32>,
    index: usize,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    message: String,
}

/// Client for a remote embedding provider.
#[derive(Clone)]
pub struct EmbeddingClient {
    inner: Arc<EmbeddingClientInner>,
}

struct EmbeddingClientInner {
    client: Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
    dimension: usize,
}

impl EmbeddingClient {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| Error::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            inner: Arc::new(EmbeddingClientInner {
                client,
                base_url: config.base_url.trim_end_matches('/').to_string(),
                model: config.model.clone(),
                api_key: config.api_key.clone(),
                dimension: config.dimension,
            }),
        })
    }

    fn api_key(&self) -> Result<&str> {
        self.inner
            .api_key
            .as_deref()
            .ok_or_else(|| Error::Config("OPENAI_API_KEY is not set".to_string()))
    }

    async fn request(&self, input: serde_json::Value) -> Result<Vec<Vec<f32>>> {
        let api_key = self.api_key()?;
        let url = format!("{}/embeddings", self.inner.base_url);

        let body = json!({
            "model": self.inner.model,
            "input": input,
        });

        let response = self
            .inner
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", api_key))
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::Embedding(format!("Embedding request failed: {}", e)))?;

        let resp: EmbedResponse = response
            .json()
            .await
            .map_err(|e| Error::Embedding(format!("Failed to parse embedding response: {}", e)))?;

        if let Some(error) = resp.error {
            return Err(Error::Embedding(format!("Provider error: {}", error.message)));
        }

        let mut data = resp
            .data
            .ok_or_else(|| Error::Embedding("No embeddings in response".to_string()))?;

        // The API may return entries out of order; restore input order.
        data.sort_by_key(|d| d.index);

        let vectors: Vec<Vec<f32>> = data.into_iter().map(|d| d.embedding).collect();

        for vector in &vectors {
            if vector.len() != self.inner.dimension {
                return Err(Error::Config(format!(
                    "Embedding dimension {} does not match configured dimension {}",
                    vector.len(),
                    self.inner.dimension
                )));
            }
        }

        Ok(vectors)
    }
}

#[async_trait]
impl Embedder for EmbeddingClient {
    fn dimension(&self) -> usize {
        self.inner.dimension
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let vectors = self.request(json!(text)).await?;
        vectors
            .into_iter()
            .next()
            .ok_or_else(|| Error::Embedding("No embedding in response".to_string()))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        debug!(count = texts.len(), model = %self.inner.model, "Generating embeddings");

        let vectors = self.request(json!(texts)).await?;

        if vectors.len() != texts.len() {
            return Err(Error::Embedding(format!(
                "Expected {} embeddings, got {}",
                texts.len(),
                vectors.len()
            )));
        }

        Ok(vectors)
    }
}

/// Deterministic embedder producing hash-seeded unit vectors.
///
/// Not semantic - the same text always maps to the same vector, different
/// texts map to effectively unrelated ones. Intended for tests and offline
/// development where no provider is reachable.
pub struct HashEmbedder {
    dimension: usize,
}

impl HashEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self { dimension }
    }

    fn hash_embed(&self, text: &str) -> Vec<f32> {
        use std::collections::hash_map::DefaultHasher;
        use std::hash::{Hash, Hasher};

        let mut embedding = vec![0.0f32; self.dimension];

        for (i, slot) in embedding.iter_mut().enumerate() {
            let mut hasher = DefaultHasher::new();
            text.hash(&mut hasher);
            (i as u64).hash(&mut hasher);
            let hash = hasher.finish();

            *slot = ((hash as f64 / u64::MAX as f64) * 2.0 - 1.0) as f32;
        }

        // Normalize to unit length
        let norm: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for x in &mut embedding {
                *x /= norm;
            }
        }

        embedding
    }
}

#[async_trait]
impl Embedder for HashEmbedder {
    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        Ok(self.hash_embed(text))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.hash_embed(t)).collect())
    }
}
