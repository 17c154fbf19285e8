//! Configuration management for Recall.
//!
//! Loads configuration from environment variables with `.env` support.
//! Instances are built once at startup and handed down to the services
//! that need them; there is no global configuration state.

use std::env;

/// Indexing execution mode, selected once at process start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexingMode {
    /// Run the processing routine inline on the calling task.
    Sync,
    /// Push jobs onto the durable queue for a worker process to drain.
    Queued,
}

impl IndexingMode {
    /// Only the exact sentinel `queued` selects asynchronous indexing;
    /// absence or any other value means synchronous.
    fn parse(value: Option<&str>) -> Self {
        match value {
            Some("queued") => Self::Queued,
            _ => Self::Sync,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub embedding: EmbeddingConfig,
    pub qdrant: QdrantConfig,
    pub queue: QueueConfig,
    pub indexing: IndexingConfig,
}

#[derive(Debug, Clone)]
pub struct EmbeddingConfig {
    /// Checked lazily on the first embedding attempt, not at startup.
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    pub dimension: usize,
}

#[derive(Debug, Clone)]
pub struct QdrantConfig {
    pub url: String,
    pub api_key: Option<String>,
    pub collection: String,
}

#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// Required for queued mode and for the worker process; sync-mode
    /// deployments may leave it unset.
    pub url: Option<String>,
    pub key: String,
}

#[derive(Debug, Clone)]
pub struct IndexingConfig {
    pub mode: IndexingMode,
}

impl Config {
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        Self {
            embedding: EmbeddingConfig {
                api_key: env::var("OPENAI_API_KEY").ok(),
                base_url: env_or("OPENAI_BASE_URL", "https://api.openai.com/v1"),
                model: env_or("OPENAI_EMBEDDING_MODEL", "text-embedding-3-small"),
                dimension: env_or("EMBEDDING_DIMENSION", "1536").parse().unwrap_or(1536),
            },
            qdrant: QdrantConfig {
                url: env_or("QDRANT_URL", "http://localhost:6334"),
                api_key: env::var("QDRANT_API_KEY").ok(),
                collection: env_or("QDRANT_COLLECTION", "chat_messages"),
            },
            queue: QueueConfig {
                url: env::var("REDIS_URL").ok(),
                key: env_or("INDEXING_QUEUE_KEY", "recall:indexing"),
            },
            indexing: IndexingConfig {
                mode: IndexingMode::parse(env::var("INDEXING_MODE").ok().as_deref()),
            },
        }
    }
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}
