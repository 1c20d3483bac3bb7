//! ============================================================================
//! Memory Manager - Orchestrates memory storage and retrieval
//! ============================================================================
//! High-level API used by the agent: `store` after every response,
//! `retrieve` before answering, `clear` reserved for a forget feature.
//! ============================================================================

use std::sync::Arc;
use tracing::{debug, info, warn};

use super::embeddings::{Embedder, EmbeddingService, EMBEDDING_DIM};
use super::reader::MemoryReader;
use super::store::{CollectionStats, EnsureStatus, QdrantStore, VectorStore};
use super::types::{AgentResult, ClearOutcome, Collection, RecalledContext};
use super::writer::MemoryWriter;
use crate::config::MemoryConfig;
use crate::error::{MemoryError, MemoryResult};

/// Memory manager combining writer, reader and the shared store session
pub struct MemoryManager {
    store: Arc<dyn VectorStore>,
    writer: MemoryWriter,
    reader: MemoryReader,
}

impl MemoryManager {
    /// Build a manager over an already-open store and embedder
    pub fn new(embedder: Arc<dyn Embedder>, store: Arc<dyn VectorStore>) -> Self {
        Self {
            writer: MemoryWriter::new(embedder.clone(), store.clone()),
            reader: MemoryReader::new(embedder, store.clone()),
            store,
        }
    }

    /// Connect to Qdrant with the HTTP embedding service and bootstrap collections
    pub async fn connect(config: &MemoryConfig) -> MemoryResult<Self> {
        let embedder = Arc::new(EmbeddingService::new(&config.embedding));
        Self::connect_with_embedder(config, embedder).await
    }

    /// Connect to Qdrant with a caller-supplied embedder and bootstrap collections.
    /// Any bootstrap failure is returned; the manager is not usable without it.
    pub async fn connect_with_embedder(
        config: &MemoryConfig,
        embedder: Arc<dyn Embedder>,
    ) -> MemoryResult<Self> {
        let manager = Self::open(config, embedder)?;
        manager.ensure_collections().await?;

        info!(
            "Memory system ready (store: {}, embedder: {})",
            config.store.endpoint,
            config.embedding.model
        );
        Ok(manager)
    }

    /// Open the Qdrant session without touching collections.
    /// Callers must run [`MemoryManager::ensure_collections`] before any traffic.
    pub fn open(config: &MemoryConfig, embedder: Arc<dyn Embedder>) -> MemoryResult<Self> {
        config.validate()?;

        if embedder.dimension() != EMBEDDING_DIM {
            return Err(MemoryError::DimensionMismatch {
                expected: EMBEDDING_DIM,
                actual: embedder.dimension(),
            });
        }

        let store = Arc::new(QdrantStore::connect(&config.store)?);
        Ok(Self::new(embedder, store))
    }

    /// Create missing collections. Safe to call repeatedly.
    pub async fn ensure_collections(&self) -> MemoryResult<Vec<(Collection, EnsureStatus)>> {
        self.store.ensure_collections().await
    }

    /// Persist one agent turn.
    ///
    /// Always writes a research record; adds a preference and/or fact record
    /// when the result carries a non-empty one. Writes are independent, so a
    /// failure part-way leaves the earlier records in place.
    pub async fn store(&self, user_id: &str, query: &str, result: &AgentResult) -> MemoryResult<()> {
        debug!("Storing agent turn for user {}", user_id);

        self.writer
            .store_research(user_id, query, result.summary(), result.mode())
            .await?;

        if let Some(preference) = result.preference() {
            self.writer.store_preference(user_id, preference).await?;
        }

        if let Some(fact) = result.fact() {
            self.writer.store_fact(user_id, fact, result.topic()).await?;
        }

        Ok(())
    }

    /// Context block for the agent, or the no-memory sentinel
    pub async fn retrieve(&self, user_id: &str, query: &str) -> MemoryResult<String> {
        self.reader.retrieve(user_id, query).await
    }

    /// Typed variant of [`MemoryManager::retrieve`]
    pub async fn recall(&self, user_id: &str, query: &str) -> MemoryResult<RecalledContext> {
        self.reader.recall(user_id, query).await
    }

    /// Forget a user's memory. Not implemented: removes nothing, never fails.
    pub async fn clear(&self, user_id: &str) -> ClearOutcome {
        warn!("Clear requested for user {} but forgetting is not supported", user_id);
        ClearOutcome::NotSupported
    }

    /// Check if the memory system is healthy
    pub async fn health_check(&self) -> MemoryResult<bool> {
        self.store.health_check().await
    }

    /// Point counts per collection
    pub async fn stats(&self) -> MemoryResult<Vec<CollectionStats>> {
        let mut stats = Vec::with_capacity(Collection::ALL.len());
        for collection in Collection::ALL {
            stats.push(CollectionStats {
                collection,
                points_count: self.store.count(collection).await?,
            });
        }
        Ok(stats)
    }

    pub fn writer(&self) -> &MemoryWriter {
        &self.writer
    }

    pub fn reader(&self) -> &MemoryReader {
        &self.reader
    }
}
