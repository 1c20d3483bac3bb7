//! ============================================================================
//! Memory Writer - Embeds and persists individual records
//! ============================================================================
//! One call, one embedding, one upsert. No batching, no deduplication.
//! ============================================================================

use std::sync::Arc;
use tracing::{debug, info};

use super::embeddings::{embed_checked, Embedder};
use super::store::{MemoryPoint, VectorStore};
use super::types::{FactRecord, MemoryRecord, PreferenceRecord, ResearchRecord};
use crate::error::MemoryResult;

/// Writes preference, research and fact records
pub struct MemoryWriter {
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn VectorStore>,
}

impl MemoryWriter {
    pub fn new(embedder: Arc<dyn Embedder>, store: Arc<dyn VectorStore>) -> Self {
        Self { embedder, store }
    }

    /// Save a user preference, embedded by its own text
    pub async fn store_preference(&self, user_id: &str, preference: &str) -> MemoryResult<()> {
        self.write(MemoryRecord::Preference(PreferenceRecord::new(
            user_id, preference,
        )))
        .await
    }

    /// Save a research session, embedded by the query so later queries find it
    pub async fn store_research(
        &self,
        user_id: &str,
        query: &str,
        summary: &str,
        mode: &str,
    ) -> MemoryResult<()> {
        self.write(MemoryRecord::Research(ResearchRecord::new(
            user_id, query, summary, mode,
        )))
        .await
    }

    /// Save a key fact extracted from research
    pub async fn store_fact(&self, user_id: &str, fact: &str, topic: &str) -> MemoryResult<()> {
        self.write(MemoryRecord::Fact(FactRecord::new(user_id, fact, topic)))
            .await
    }

    async fn write(&self, record: MemoryRecord) -> MemoryResult<()> {
        let collection = record.collection();
        debug!("Storing {} record for user {}", collection, record.user_id());

        let vector = embed_checked(self.embedder.as_ref(), record.embedding_text()).await?;
        self.store
            .upsert(collection, MemoryPoint::from_record(&record, vector))
            .await?;

        info!(
            "Stored {} record {} for user {}",
            collection,
            record.id(),
            record.user_id()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MemoryError;
    use crate::memory::embeddings::HashEmbedder;
    use crate::memory::in_memory::InMemoryStore;
    use crate::memory::types::Collection;

    async fn setup() -> (MemoryWriter, Arc<InMemoryStore>) {
        let store = Arc::new(InMemoryStore::new());
        store.ensure_collections().await.unwrap();
        let writer = MemoryWriter::new(Arc::new(HashEmbedder::new()), store.clone());
        (writer, store)
    }

    #[tokio::test]
    async fn test_store_preference() {
        let (writer, store) = setup().await;
        writer.store_preference("u1", "I prefer code examples").await.unwrap();

        let points = store.points(Collection::UserPreferences).await;
        assert_eq!(points.len(), 1);
        assert_eq!(points[0].payload["preference"], "I prefer code examples");
        assert_eq!(points[0].payload["user_id"], "u1");
        assert!(points[0].payload.contains_key("timestamp"));
    }

    #[tokio::test]
    async fn test_research_vector_is_query_embedding() {
        let (writer, store) = setup().await;
        writer
            .store_research("u1", "what is RAG?", "RAG is...", "deep")
            .await
            .unwrap();

        let expected = HashEmbedder::new().embed("what is RAG?").await.unwrap();
        let points = store.points(Collection::ResearchHistory).await;
        assert_eq!(points[0].vector, expected);
        assert_eq!(points[0].payload["mode"], "deep");
        assert_eq!(points[0].payload["summary"], "RAG is...");
    }

    #[tokio::test]
    async fn test_repeated_writes_append() {
        let (writer, store) = setup().await;
        writer.store_fact("u1", "LoRA reduces params", "LoRA").await.unwrap();
        writer.store_fact("u1", "LoRA reduces params", "LoRA").await.unwrap();

        let points = store.points(Collection::KeyFacts).await;
        assert_eq!(points.len(), 2);
        assert_ne!(points[0].id, points[1].id);
    }

    #[tokio::test]
    async fn test_dimension_mismatch_surfaces() {
        let store = Arc::new(InMemoryStore::new());
        store.ensure_collections().await.unwrap();
        let writer = MemoryWriter::new(Arc::new(HashEmbedder::with_dimension(512)), store.clone());

        let err = writer.store_fact("u1", "fact", "t").await.unwrap_err();
        assert!(matches!(err, MemoryError::DimensionMismatch { actual: 512, .. }));
        assert_eq!(store.count(Collection::KeyFacts).await.unwrap(), 0);
    }
}
