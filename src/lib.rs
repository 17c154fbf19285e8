//! Recall - Semantic Message Memory
//!
//! Turns persisted chat messages into vector embeddings, stores them in a
//! similarity-searchable collection, and retrieves semantically relevant
//! prior messages scoped to the owning user.
//!
//! Indexing runs in one of two modes, selected once at startup: inline
//! (the caller waits for the processing routine) or queued (the job is
//! pushed onto a durable queue and drained by the `recall-worker` binary).
//! Both modes funnel into the same processing routine, and the store
//! upsert is idempotent by message id, so at-least-once queue delivery
//! converges on the same final state.

pub mod config;
pub mod error;
pub mod models;
pub mod services;

pub use config::{Config, IndexingMode};
pub use error::{Error, Result};
pub use models::{IndexingJob, MessagePart, MessageRole};
pub use services::{
    Embedder, EmbeddingClient, HashEmbedder, InMemoryQueue, InMemoryVectorStore, IndexOutcome,
    IndexWorker, IndexWorkerHandle, IndexerService, IndexingDispatcher, JobQueue, MessagePoint,
    PointPayload, QdrantStore, RedisQueue, SearchHit, SearchOptions, VectorStore,
};
