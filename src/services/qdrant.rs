//! Qdrant-backed vector store.
//!
//! One shared collection holds the vectors for all users; the mandatory
//! `user_id` filter in [`VectorStore::search`] is the multi-tenancy
//! boundary, backed by a keyword payload index created at bootstrap.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use qdrant_client::qdrant::{
    Condition, CreateCollectionBuilder, CreateFieldIndexCollectionBuilder, DeletePointsBuilder,
    Distance, FieldType, Filter, PointStruct, PointsIdsList, Range, ScoredPoint,
    SearchPointsBuilder, UpsertPointsBuilder, Value, VectorParamsBuilder,
};
use qdrant_client::Qdrant;
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::QdrantConfig;
use crate::error::{Error, Result};
use crate::models::MessageRole;

use super::vector::{MessagePoint, PointPayload, SearchHit, SearchOptions, VectorStore};

/// Point payload key names
const KEY_USER_ID: &str = "user_id";
const KEY_CHAT_ID: &str = "chat_id";
const KEY_MESSAGE_ID: &str = "message_id";
const KEY_ROLE: &str = "role";
const KEY_TIMESTAMP: &str = "timestamp";
const KEY_TIMESTAMP_UNIX: &str = "timestamp_unix";
const KEY_CONTENT_PREVIEW: &str = "content_preview";

/// Namespace for deriving point ids from non-UUID message ids.
const POINT_ID_NAMESPACE: Uuid = Uuid::from_u128(0x8f2d_5e91_c3b4_4a6f_9e07_1c2a_6b5d_4e38);

/// Qdrant accepts only UUID or integer point ids. Message ids that already
/// are UUIDs pass through; anything else maps deterministically through
/// UUID v5, so re-indexing and delete-by-id keep addressing the same point.
fn point_id(message_id: &str) -> String {
    match Uuid::parse_str(message_id) {
        Ok(id) => id.to_string(),
        Err(_) => Uuid::new_v5(&POINT_ID_NAMESPACE, message_id.as_bytes()).to_string(),
    }
}

/// Vector store client backed by Qdrant.
#[derive(Clone)]
pub struct QdrantStore {
    inner: Arc<QdrantStoreInner>,
}

struct QdrantStoreInner {
    client: Qdrant,
    collection: String,
    dimension: usize,
}

impl QdrantStore {
    /// Build the client. No request is made here; the collection is
    /// bootstrapped lazily on the first write.
    pub fn new(config: &QdrantConfig, dimension: usize) -> Result<Self> {
        let client = Qdrant::from_url(&config.url)
            .api_key(config.api_key.clone())
            .build()
            .map_err(|e| Error::Config(format!("Failed to build Qdrant client: {}", e)))?;

        Ok(Self {
            inner: Arc::new(QdrantStoreInner {
                client,
                collection: config.collection.clone(),
                dimension,
            }),
        })
    }

    async fn delete_by_filter(&self, filter: Filter) -> Result<()> {
        self.inner
            .client
            .delete_points(
                DeletePointsBuilder::new(&self.inner.collection)
                    .points(filter)
                    .wait(true),
            )
            .await
            .map_err(|e| Error::VectorStore(format!("Failed to delete points: {}", e)))?;

        Ok(())
    }
}

#[async_trait]
impl VectorStore for QdrantStore {
    async fn ensure_collection(&self) -> Result<()> {
        let collection = &self.inner.collection;

        let exists = self
            .inner
            .client
            .collection_exists(collection)
            .await
            .map_err(|e| Error::VectorStore(format!("Failed to check collection: {}", e)))?;

        if exists {
            let info = self
                .inner
                .client
                .collection_info(collection)
                .await
                .map_err(|e| Error::VectorStore(format!("Failed to get collection info: {}", e)))?;

            let existing_dim = info
                .result
                .as_ref()
                .and_then(|r| r.config.as_ref())
                .and_then(|c| c.params.as_ref())
                .and_then(|p| p.vectors_config.as_ref())
                .and_then(|vc| match vc.config.as_ref() {
                    Some(qdrant_client::qdrant::vectors_config::Config::Params(params)) => {
                        Some(params.size as usize)
                    }
                    _ => None,
                })
                .unwrap_or(0);

            // A mismatched collection holds someone's data; never recreate.
            if existing_dim != self.inner.dimension {
                return Err(Error::Config(format!(
                    "Collection {} has dimension {} but {} is configured",
                    collection, existing_dim, self.inner.dimension
                )));
            }

            return Ok(());
        }

        self.inner
            .client
            .create_collection(
                CreateCollectionBuilder::new(collection).vectors_config(VectorParamsBuilder::new(
                    self.inner.dimension as u64,
                    Distance::Cosine,
                )),
            )
            .await
            .map_err(|e| Error::VectorStore(format!("Failed to create collection: {}", e)))?;

        // Payload indexes back filtered search: user scoping is exact
        // match, time filters are range queries.
        self.inner
            .client
            .create_field_index(CreateFieldIndexCollectionBuilder::new(
                collection,
                KEY_USER_ID,
                FieldType::Keyword,
            ))
            .await
            .map_err(|e| Error::VectorStore(format!("Failed to index user_id: {}", e)))?;

        self.inner
            .client
            .create_field_index(CreateFieldIndexCollectionBuilder::new(
                collection,
                KEY_TIMESTAMP_UNIX,
                FieldType::Integer,
            ))
            .await
            .map_err(|e| Error::VectorStore(format!("Failed to index timestamp: {}", e)))?;

        info!(collection = %collection, dimension = self.inner.dimension, "Created vector collection");

        Ok(())
    }

    async fn upsert(&self, point: MessagePoint) -> Result<()> {
        if point.vector.len() != self.inner.dimension {
            return Err(Error::Config(format!(
                "Vector dimension {} does not match collection dimension {}",
                point.vector.len(),
                self.inner.dimension
            )));
        }

        let message_id = point.payload.message_id.clone();
        let qdrant_point = PointStruct::new(
            point_id(&message_id),
            point.vector,
            build_payload(&point.payload),
        );

        self.inner
            .client
            .upsert_points(
                UpsertPointsBuilder::new(&self.inner.collection, vec![qdrant_point]).wait(true),
            )
            .await
            .map_err(|e| Error::VectorStore(format!("Failed to upsert point: {}", e)))?;

        debug!(collection = %self.inner.collection, message_id = %message_id, "Upserted message vector");

        Ok(())
    }

    async fn delete_message(&self, message_id: &str) -> Result<()> {
        self.inner
            .client
            .delete_points(
                DeletePointsBuilder::new(&self.inner.collection)
                    .points(PointsIdsList {
                        ids: vec![point_id(message_id).into()],
                    })
                    .wait(true),
            )
            .await
            .map_err(|e| Error::VectorStore(format!("Failed to delete point: {}", e)))?;

        Ok(())
    }

    async fn delete_chat(&self, chat_id: &str) -> Result<()> {
        self.delete_by_filter(Filter::must([Condition::matches(
            KEY_CHAT_ID,
            chat_id.to_string(),
        )]))
        .await
    }

    async fn delete_user(&self, user_id: &str) -> Result<()> {
        self.delete_by_filter(Filter::must([Condition::matches(
            KEY_USER_ID,
            user_id.to_string(),
        )]))
        .await
    }

    async fn search(
        &self,
        vector: &[f32],
        user_id: &str,
        options: &SearchOptions,
    ) -> Result<Vec<SearchHit>> {
        let builder =
            SearchPointsBuilder::new(&self.inner.collection, vector.to_vec(), options.limit as u64)
                .filter(search_filter(user_id, options))
                .score_threshold(options.score_threshold)
                .with_payload(true);

        let response = self
            .inner
            .client
            .search_points(builder)
            .await
            .map_err(|e| Error::VectorStore(format!("Search failed: {}", e)))?;

        Ok(response.result.into_iter().map(scored_point_to_hit).collect())
    }
}

/// Build the conjunctive search filter. `user_id` comes first: it is the
/// tenancy boundary, not an optional refinement.
fn search_filter(user_id: &str, options: &SearchOptions) -> Filter {
    let mut conditions = vec![Condition::matches(KEY_USER_ID, user_id.to_string())];

    if let Some(chat_id) = &options.chat_id {
        conditions.push(Condition::matches(KEY_CHAT_ID, chat_id.clone()));
    }

    if let Some(role) = options.role {
        conditions.push(Condition::matches(KEY_ROLE, role.as_str().to_string()));
    }

    if options.after.is_some() || options.before.is_some() {
        conditions.push(Condition::range(
            KEY_TIMESTAMP_UNIX,
            Range {
                gte: options.after.map(|t| t.timestamp() as f64),
                lte: options.before.map(|t| t.timestamp() as f64),
                ..Default::default()
            },
        ));
    }

    Filter::must(conditions)
}

fn build_payload(payload: &PointPayload) -> HashMap<String, Value> {
    let mut map = HashMap::new();
    map.insert(KEY_USER_ID.to_string(), Value::from(payload.user_id.clone()));
    map.insert(KEY_CHAT_ID.to_string(), Value::from(payload.chat_id.clone()));
    map.insert(
        KEY_MESSAGE_ID.to_string(),
        Value::from(payload.message_id.clone()),
    );
    map.insert(
        KEY_ROLE.to_string(),
        Value::from(payload.role.as_str().to_string()),
    );
    map.insert(
        KEY_TIMESTAMP.to_string(),
        Value::from(payload.timestamp.to_rfc3339()),
    );
    // Numeric twin of `timestamp`; carries the range index.
    map.insert(
        KEY_TIMESTAMP_UNIX.to_string(),
        Value::from(payload.timestamp.timestamp()),
    );
    map.insert(
        KEY_CONTENT_PREVIEW.to_string(),
        Value::from(payload.content_preview.clone()),
    );
    map
}

fn payload_str(payload: &HashMap<String, Value>, key: &str) -> Option<String> {
    payload.get(key).and_then(|v| match &v.kind {
        Some(qdrant_client::qdrant::value::Kind::StringValue(s)) => Some(s.clone()),
        _ => None,
    })
}

fn parse_payload(payload: &HashMap<String, Value>) -> PointPayload {
    let role = match payload_str(payload, KEY_ROLE).as_deref() {
        Some("assistant") => MessageRole::Assistant,
        _ => MessageRole::User,
    };

    let timestamp = payload_str(payload, KEY_TIMESTAMP)
        .and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(Utc::now);

    PointPayload {
        user_id: payload_str(payload, KEY_USER_ID).unwrap_or_default(),
        chat_id: payload_str(payload, KEY_CHAT_ID).unwrap_or_default(),
        message_id: payload_str(payload, KEY_MESSAGE_ID).unwrap_or_default(),
        role,
        timestamp,
        content_preview: payload_str(payload, KEY_CONTENT_PREVIEW).unwrap_or_default(),
    }
}

fn scored_point_to_hit(point: ScoredPoint) -> SearchHit {
    SearchHit {
        score: point.score,
        payload: parse_payload(&point.payload),
    }
}
