//! End-to-end pipeline scenarios over the in-memory store and queue.
//!
//! These tests exercise the full dispatch paths: inline processing, queue
//! handoff plus worker drain, deletion, and retrieval - with deterministic
//! embedders standing in for the remote provider.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::sleep;

use recall::{
    Embedder, HashEmbedder, InMemoryQueue, InMemoryVectorStore, IndexWorker, IndexerService,
    IndexingDispatcher, IndexingJob, JobQueue, MessagePart, MessageRole, Result, SearchOptions,
};

const DIM: usize = 3;

/// Embedder with a fixed phrase-to-vector table, so tests can stage
/// "semantically close" texts; unknown text falls back to hashing.
struct TableEmbedder {
    table: Vec<(&'static str, Vec<f32>)>,
    fallback: HashEmbedder,
}

impl TableEmbedder {
    fn new(table: Vec<(&'static str, Vec<f32>)>) -> Self {
        Self {
            table,
            fallback: HashEmbedder::new(DIM),
        }
    }
}

#[async_trait]
impl Embedder for TableEmbedder {
    fn dimension(&self) -> usize {
        DIM
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        for (phrase, vector) in &self.table {
            if *phrase == text {
                return Ok(vector.clone());
            }
        }
        self.fallback.embed(text).await
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut vectors = Vec::with_capacity(texts.len());
        for text in texts {
            vectors.push(self.embed(text).await?);
        }
        Ok(vectors)
    }
}

/// Embedder that counts calls, for asserting that skipped jobs never
/// reach the provider.
struct CountingEmbedder {
    inner: HashEmbedder,
    calls: AtomicUsize,
}

impl CountingEmbedder {
    fn new() -> Self {
        Self {
            inner: HashEmbedder::new(DIM),
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl Embedder for CountingEmbedder {
    fn dimension(&self) -> usize {
        self.inner.dimension()
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.embed(text).await
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.embed_batch(texts).await
    }
}

fn job(message_id: &str, chat_id: &str, user_id: &str, text: &str) -> IndexingJob {
    IndexingJob {
        message_id: message_id.to_string(),
        chat_id: chat_id.to_string(),
        user_id: user_id.to_string(),
        role: MessageRole::User,
        parts: vec![MessagePart::Text {
            text: text.to_string(),
        }],
    }
}

async fn wait_for(store: &InMemoryVectorStore, expected: usize) {
    for _ in 0..100 {
        if store.len().await >= expected {
            return;
        }
        sleep(Duration::from_millis(20)).await;
    }
    panic!("worker did not index {} points in time", expected);
}

/// Scenario A: an indexed message is found by a semantically close query
/// scoped to its owner, at or above the default threshold.
#[tokio::test]
async fn indexed_message_is_retrievable_by_similar_query() {
    let embedder = Arc::new(TableEmbedder::new(vec![
        ("I love hiking in the Alps", vec![1.0, 0.0, 0.0]),
        ("mountain trips", vec![0.97, 0.24, 0.0]),
    ]));
    let store = Arc::new(InMemoryVectorStore::new(DIM));
    let indexer = IndexerService::new(embedder, store.clone());
    let dispatcher = IndexingDispatcher::inline(indexer.clone());

    dispatcher
        .index(job("m1", "c1", "u1", "I love hiking in the Alps"))
        .await
        .unwrap();

    let hits = indexer
        .search("mountain trips", "u1", &SearchOptions::default())
        .await
        .unwrap();

    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].payload.message_id, "m1");
    assert!(hits[0].score >= SearchOptions::default().score_threshold);
}

/// Scenario B: re-indexing a message id with new content overwrites in
/// place; the store ends up with one point reflecting the second write.
#[tokio::test]
async fn reindexing_same_message_overwrites() {
    let store = Arc::new(InMemoryVectorStore::new(DIM));
    let indexer = IndexerService::new(Arc::new(HashEmbedder::new(DIM)), store.clone());
    let dispatcher = IndexingDispatcher::inline(indexer);

    dispatcher
        .index(job("m1", "c1", "u1", "original content of the message"))
        .await
        .unwrap();
    let first = store.get("m1").await.unwrap();

    dispatcher
        .index(job("m1", "c1", "u1", "edited content of the message"))
        .await
        .unwrap();

    assert_eq!(store.len().await, 1);
    let second = store.get("m1").await.unwrap();
    assert_eq!(second.payload.content_preview, "edited content of the message");
    assert!(second.payload.timestamp >= first.payload.timestamp);
}

/// Scenario C: deleting a chat removes exactly its messages; a search not
/// scoped by chat only sees the survivors.
#[tokio::test]
async fn chat_deletion_removes_only_that_chat() {
    let store = Arc::new(InMemoryVectorStore::new(DIM));
    let indexer = IndexerService::new(Arc::new(HashEmbedder::new(DIM)), store.clone());

    let text = "travel plans for the autumn holidays";
    indexer.process(&job("m1", "c1", "u1", text)).await.unwrap();
    indexer.process(&job("m2", "c1", "u1", text)).await.unwrap();
    indexer.process(&job("m3", "c2", "u1", text)).await.unwrap();

    use recall::VectorStore;
    store.delete_chat("c1").await.unwrap();

    let hits = indexer
        .search(text, "u1", &SearchOptions::default())
        .await
        .unwrap();

    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].payload.message_id, "m3");
    assert_eq!(hits[0].payload.chat_id, "c2");
}

/// Scenario D: a job with no text segment performs no embedding call and
/// no store mutation of any kind.
#[tokio::test]
async fn file_only_job_touches_nothing() {
    let embedder = Arc::new(CountingEmbedder::new());
    let store = Arc::new(InMemoryVectorStore::new(DIM));
    let indexer = IndexerService::new(embedder.clone(), store.clone());
    let dispatcher = IndexingDispatcher::inline(indexer);

    let file_job = IndexingJob {
        message_id: "m1".to_string(),
        chat_id: "c1".to_string(),
        user_id: "u1".to_string(),
        role: MessageRole::User,
        parts: vec![MessagePart::Other],
    };

    dispatcher.index(file_job).await.unwrap();

    assert_eq!(embedder.calls.load(Ordering::SeqCst), 0);
    assert!(!store.collection_exists().await);
}

/// A search scoped to one user never returns another user's points, even
/// when their vectors are arbitrarily similar.
#[tokio::test]
async fn search_never_crosses_user_boundaries() {
    let store = Arc::new(InMemoryVectorStore::new(DIM));
    let indexer = IndexerService::new(Arc::new(HashEmbedder::new(DIM)), store.clone());

    let text = "identical content indexed for two users";
    indexer.process(&job("m1", "c1", "u1", text)).await.unwrap();
    indexer.process(&job("m2", "c2", "u2", text)).await.unwrap();

    let hits = indexer
        .search(text, "u1", &SearchOptions::default())
        .await
        .unwrap();

    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].payload.user_id, "u1");
}

/// Results below the supplied threshold never appear, regardless of rank.
#[tokio::test]
async fn threshold_is_a_relevance_floor() {
    let embedder = Arc::new(TableEmbedder::new(vec![
        ("the alpine expedition report", vec![1.0, 0.0, 0.0]),
        ("the cafeteria lunch menu", vec![0.0, 1.0, 0.0]),
        ("summit logistics", vec![0.98, 0.2, 0.0]),
    ]));
    let store = Arc::new(InMemoryVectorStore::new(DIM));
    let indexer = IndexerService::new(embedder, store.clone());

    indexer
        .process(&job("m1", "c1", "u1", "the alpine expedition report"))
        .await
        .unwrap();
    indexer
        .process(&job("m2", "c1", "u1", "the cafeteria lunch menu"))
        .await
        .unwrap();

    let options = SearchOptions::new().with_limit(10);
    let hits = indexer.search("summit logistics", "u1", &options).await.unwrap();

    // The orthogonal cafeteria point would rank second, but it is below
    // the floor and must be absent, not merely last.
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].payload.message_id, "m1");
    for hit in &hits {
        assert!(hit.score >= options.score_threshold);
    }
}

/// The same job processed inline and through queue + worker produces the
/// same stored point, apart from the write timestamp.
#[tokio::test]
async fn sync_and_queued_modes_converge_on_the_same_state() {
    let text = "a message that takes the same shape either way";

    // Inline path.
    let sync_store = Arc::new(InMemoryVectorStore::new(DIM));
    let sync_indexer =
        IndexerService::new(Arc::new(HashEmbedder::new(DIM)), sync_store.clone());
    IndexingDispatcher::inline(sync_indexer)
        .index(job("m1", "c1", "u1", text))
        .await
        .unwrap();

    // Queued path: dispatcher pushes, worker drains.
    let queue = Arc::new(InMemoryQueue::new());
    let queued_store = Arc::new(InMemoryVectorStore::new(DIM));
    let queued_indexer =
        IndexerService::new(Arc::new(HashEmbedder::new(DIM)), queued_store.clone());

    let worker = IndexWorker::new(queue.clone(), queued_indexer);
    let handle = worker.start().await;

    IndexingDispatcher::queued(queue)
        .index(job("m1", "c1", "u1", text))
        .await
        .unwrap();

    wait_for(&queued_store, 1).await;
    handle.stop().await;

    let sync_point = sync_store.get("m1").await.unwrap();
    let queued_point = queued_store.get("m1").await.unwrap();

    assert_eq!(sync_point.vector, queued_point.vector);
    assert_eq!(sync_point.payload.user_id, queued_point.payload.user_id);
    assert_eq!(sync_point.payload.chat_id, queued_point.payload.chat_id);
    assert_eq!(sync_point.payload.message_id, queued_point.payload.message_id);
    assert_eq!(sync_point.payload.role, queued_point.payload.role);
    assert_eq!(
        sync_point.payload.content_preview,
        queued_point.payload.content_preview
    );
}

/// At-least-once delivery: a duplicated job converges on one point.
#[tokio::test]
async fn duplicate_delivery_is_harmless() {
    let queue = Arc::new(InMemoryQueue::new());
    let store = Arc::new(InMemoryVectorStore::new(DIM));
    let indexer = IndexerService::new(Arc::new(HashEmbedder::new(DIM)), store.clone());

    let worker = IndexWorker::new(queue.clone(), indexer);
    let handle = worker.start().await;

    let duplicated = job("m1", "c1", "u1", "a job the queue delivered twice");
    queue.push(&duplicated).await.unwrap();
    queue.push(&duplicated).await.unwrap();
    queue.push(&job("m2", "c1", "u1", "an unrelated second message")).await.unwrap();

    wait_for(&store, 2).await;
    handle.stop().await;

    assert_eq!(store.len().await, 2);
    assert!(store.get("m1").await.is_some());
    assert!(store.get("m2").await.is_some());
}
