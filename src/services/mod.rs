//! Service layer: embedding client, vector store, queue, dispatcher, worker.

mod dispatcher;
mod embeddings;
mod indexer;
mod qdrant;
mod queue;
mod vector;
mod worker;

pub use dispatcher::IndexingDispatcher;
pub use embeddings::{Embedder, EmbeddingClient, HashEmbedder};
pub use indexer::{IndexOutcome, IndexerService};
pub use qdrant::QdrantStore;
pub use queue::{InMemoryQueue, JobQueue, RedisQueue};
pub use vector::{
    InMemoryVectorStore, MessagePoint, PointPayload, SearchHit, SearchOptions, VectorStore,
    DEFAULT_SCORE_THRESHOLD, DEFAULT_SEARCH_LIMIT,
};
pub use worker::{IndexWorker, IndexWorkerHandle};
