//! ============================================================================
//! Memory Store - Qdrant vector database operations
//! ============================================================================
//! `VectorStore` is the seam between the memory layer and the ANN index.
//! `QdrantStore` owns one client session, created explicitly and reused for
//! every call. Typed records are flattened into payload maps before they get
//! here; this module only sees ids, vectors and string payloads.
//! ============================================================================

use async_trait::async_trait;
use qdrant_client::qdrant::{
    point_id::PointIdOptions, vectors_config, Condition, CreateCollectionBuilder, Distance,
    Filter, PointStruct, SearchPointsBuilder, UpsertPointsBuilder, Value, VectorParamsBuilder,
};
use qdrant_client::Qdrant;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::embeddings::{check_dimension, EMBEDDING_DIM};
use super::types::{Collection, MemoryRecord, Payload};
use crate::config::StoreConfig;
use crate::error::{MemoryError, MemoryResult};

/// A point ready to be written: id, vector and flattened payload
#[derive(Debug, Clone, PartialEq)]
pub struct MemoryPoint {
    pub id: Uuid,
    pub vector: Vec<f32>,
    pub payload: Payload,
}

impl MemoryPoint {
    pub fn from_record(record: &MemoryRecord, vector: Vec<f32>) -> Self {
        Self {
            id: record.id(),
            vector,
            payload: record.to_payload(),
        }
    }
}

/// One similarity search hit
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    /// `None` when the store holds a non-UUID id
    pub id: Option<Uuid>,
    pub payload: Payload,
    pub score: f32,
}

/// What `ensure_collections` did for one collection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnsureStatus {
    Created,
    Existing,
}

/// Collection statistics
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionStats {
    pub collection: Collection,
    pub points_count: u64,
}

/// ANN index with payload filtering.
///
/// Implementations must make each upsert and query atomic on their own; the
/// memory layer does no locking.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Create any missing collection with 384 dimensions and cosine distance.
    /// Idempotent, and safe against concurrent creators.
    async fn ensure_collections(&self) -> MemoryResult<Vec<(Collection, EnsureStatus)>>;

    /// Insert a point. Ids are always fresh, so this never overwrites in practice.
    async fn upsert(&self, collection: Collection, point: MemoryPoint) -> MemoryResult<()>;

    /// Up to `limit` hits whose payload `user_id` equals `user_id`, best first
    async fn query(
        &self,
        collection: Collection,
        vector: Vec<f32>,
        user_id: &str,
        limit: u64,
    ) -> MemoryResult<Vec<SearchHit>>;

    /// Number of points in a collection
    async fn count(&self, collection: Collection) -> MemoryResult<u64>;

    /// Check if the store is reachable
    async fn health_check(&self) -> MemoryResult<bool>;
}

/// Memory store backed by Qdrant vector database
pub struct QdrantStore {
    client: Qdrant,
}

impl QdrantStore {
    /// Open a client session. Does not touch collections.
    pub fn connect(config: &StoreConfig) -> MemoryResult<Self> {
        debug!("Connecting to Qdrant at {}", config.endpoint);

        let mut builder =
            Qdrant::from_url(&config.endpoint).timeout(Duration::from_secs(config.timeout_secs));
        if let Some(key) = &config.credential {
            builder = builder.api_key(key.clone());
        }

        let client = builder
            .build()
            .map_err(|e| MemoryError::connectivity("Failed to create Qdrant client", e))?;

        Ok(Self { client })
    }

    async fn ensure_collection(&self, collection: Collection) -> MemoryResult<EnsureStatus> {
        let name = collection.name();

        if self.collection_exists(name).await? {
            debug!("Collection {} already exists", name);
            self.verify_dimension(name).await?;
            return Ok(EnsureStatus::Existing);
        }

        info!("Creating collection: {}", name);

        let created = self
            .client
            .create_collection(
                CreateCollectionBuilder::new(name).vectors_config(VectorParamsBuilder::new(
                    EMBEDDING_DIM as u64,
                    Distance::Cosine,
                )),
            )
            .await;

        match created {
            Ok(_) => {
                info!("Collection {} created successfully", name);
                Ok(EnsureStatus::Created)
            }
            Err(e) => {
                // Lost a race against another process creating the same collection
                if self.collection_exists(name).await? {
                    debug!("Collection {} was created concurrently", name);
                    self.verify_dimension(name).await?;
                    Ok(EnsureStatus::Existing)
                } else {
                    Err(MemoryError::connectivity("Failed to create collection", e))
                }
            }
        }
    }

    async fn collection_exists(&self, name: &str) -> MemoryResult<bool> {
        self.client
            .collection_exists(name)
            .await
            .map_err(|e| MemoryError::connectivity("Failed to check collection existence", e))
    }

    async fn verify_dimension(&self, name: &str) -> MemoryResult<()> {
        let info = self
            .client
            .collection_info(name)
            .await
            .map_err(|e| MemoryError::connectivity("Failed to get collection info", e))?;

        let config = info
            .result
            .and_then(|r| r.config)
            .and_then(|c| c.params)
            .and_then(|p| p.vectors_config)
            .and_then(|v| v.config);

        check_vector_params(name, config)
    }
}

/// An existing collection is usable only with a single unnamed 384-d cosine vector
fn check_vector_params(name: &str, config: Option<vectors_config::Config>) -> MemoryResult<()> {
    match config {
        Some(vectors_config::Config::Params(params)) => {
            if params.size != EMBEDDING_DIM as u64 {
                return Err(MemoryError::DimensionMismatch {
                    expected: EMBEDDING_DIM,
                    actual: params.size as usize,
                });
            }
            if params.distance != Distance::Cosine as i32 {
                return Err(MemoryError::Config(format!(
                    "Collection {} uses distance {:?}, expected Cosine",
                    name,
                    Distance::try_from(params.distance).unwrap_or(Distance::UnknownDistance)
                )));
            }
            Ok(())
        }
        Some(vectors_config::Config::ParamsMap(_)) => Err(MemoryError::Config(format!(
            "Collection {} uses named vectors, expected a single unnamed vector",
            name
        ))),
        None => Err(MemoryError::Config(format!(
            "Collection {} has no vector configuration",
            name
        ))),
    }
}

#[async_trait]
impl VectorStore for QdrantStore {
    async fn ensure_collections(&self) -> MemoryResult<Vec<(Collection, EnsureStatus)>> {
        let mut report = Vec::with_capacity(Collection::ALL.len());
        for collection in Collection::ALL {
            let status = self.ensure_collection(collection).await?;
            report.push((collection, status));
        }
        Ok(report)
    }

    async fn upsert(&self, collection: Collection, point: MemoryPoint) -> MemoryResult<()> {
        check_dimension(&point.vector)?;

        debug!("Upserting point {} into {}", point.id, collection);

        let payload: HashMap<String, Value> = point
            .payload
            .into_iter()
            .map(|(k, v)| (k, Value::from(v)))
            .collect();

        let point = PointStruct::new(point.id.to_string(), point.vector, payload);

        self.client
            .upsert_points(UpsertPointsBuilder::new(collection.name(), vec![point]).wait(true))
            .await
            .map_err(|e| MemoryError::connectivity("Failed to upsert point", e))?;

        Ok(())
    }

    async fn query(
        &self,
        collection: Collection,
        vector: Vec<f32>,
        user_id: &str,
        limit: u64,
    ) -> MemoryResult<Vec<SearchHit>> {
        check_dimension(&vector)?;

        debug!(
            "Searching {} for user {} (limit: {})",
            collection, user_id, limit
        );

        // Hard filter on user_id match
        let filter = Filter::must([Condition::matches("user_id", user_id.to_string())]);

        let search_result = self
            .client
            .search_points(
                SearchPointsBuilder::new(collection.name(), vector, limit)
                    .filter(filter)
                    .with_payload(true),
            )
            .await
            .map_err(|e| MemoryError::connectivity("Failed to search points", e))?;

        let hits: Vec<SearchHit> = search_result
            .result
            .into_iter()
            .map(|point| SearchHit {
                id: point.id.and_then(extract_uuid_from_point_id),
                payload: string_payload(point.payload),
                score: point.score,
            })
            .collect();

        debug!("Found {} hits in {}", hits.len(), collection);
        Ok(hits)
    }

    async fn count(&self, collection: Collection) -> MemoryResult<u64> {
        let info = self
            .client
            .collection_info(collection.name())
            .await
            .map_err(|e| MemoryError::connectivity("Failed to get collection info", e))?;

        Ok(info.result.and_then(|r| r.points_count).unwrap_or(0))
    }

    async fn health_check(&self) -> MemoryResult<bool> {
        match self.client.health_check().await {
            Ok(_) => Ok(true),
            Err(e) => {
                warn!("Qdrant health check failed: {}", e);
                Ok(false)
            }
        }
    }
}

// Helper to extract UUID from PointId
fn extract_uuid_from_point_id(point_id: qdrant_client::qdrant::PointId) -> Option<Uuid> {
    match point_id.point_id_options? {
        PointIdOptions::Uuid(uuid_str) => Uuid::parse_str(&uuid_str).ok(),
        PointIdOptions::Num(_) => None,
    }
}

// Keep string-valued payload entries; every field we write is a string
fn string_payload(payload: HashMap<String, Value>) -> Payload {
    payload
        .into_iter()
        .filter_map(|(k, v)| v.as_str().map(|s| (k, s.to_string())))
        .collect()
}
