//! ============================================================================
//! Memory Reader - Filtered similarity search and context assembly
//! ============================================================================
//! The query is embedded once and the same vector searches all three
//! collections, even though research vectors come from past queries and
//! preference/fact vectors from statements.
//! ============================================================================

use std::sync::Arc;
use tracing::{debug, warn};

use super::embeddings::{embed_checked, Embedder};
use super::store::{SearchHit, VectorStore};
use super::types::{Collection, MemoryRecord, RecalledContext};
use crate::error::{MemoryError, MemoryResult};

/// Hits per collection
pub const DEFAULT_TOP_K: u64 = 3;

/// Reads a user's memories relevant to a query
pub struct MemoryReader {
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn VectorStore>,
    top_k: u64,
}

impl MemoryReader {
    pub fn new(embedder: Arc<dyn Embedder>, store: Arc<dyn VectorStore>) -> Self {
        Self {
            embedder,
            store,
            top_k: DEFAULT_TOP_K,
        }
    }

    /// Formatted context for the agent, or the no-memory sentinel.
    ///
    /// Store failures are returned as errors, never as the sentinel.
    pub async fn retrieve(&self, user_id: &str, query: &str) -> MemoryResult<String> {
        Ok(self.recall(user_id, query).await?.render())
    }

    /// Typed recall: up to `top_k` records per section, best first
    pub async fn recall(&self, user_id: &str, query: &str) -> MemoryResult<RecalledContext> {
        debug!("Recalling memories for user {} with query: {}", user_id, query);

        let vector = embed_checked(self.embedder.as_ref(), query).await?;

        let (preferences, research, facts) = tokio::try_join!(
            self.search(Collection::UserPreferences, vector.clone(), user_id),
            self.search(Collection::ResearchHistory, vector.clone(), user_id),
            self.search(Collection::KeyFacts, vector, user_id),
        )?;

        let mut context = RecalledContext::default();
        for record in preferences.into_iter().chain(research).chain(facts) {
            context.push(record);
        }

        debug!(
            "Recalled {} preferences, {} research, {} facts for user {}",
            context.preferences.len(),
            context.research.len(),
            context.facts.len(),
            user_id
        );
        Ok(context)
    }

    async fn search(
        &self,
        collection: Collection,
        vector: Vec<f32>,
        user_id: &str,
    ) -> MemoryResult<Vec<MemoryRecord>> {
        let hits = self
            .store
            .query(collection, vector, user_id, self.top_k)
            .await?;

        // A bad record costs only itself
        let records = hits
            .into_iter()
            .filter_map(|hit| match decode_hit(collection, user_id, hit) {
                Ok(record) => Some(record),
                Err(e) => {
                    warn!("Skipping record: {}", e);
                    None
                }
            })
            .collect();

        Ok(records)
    }
}

fn decode_hit(collection: Collection, user_id: &str, hit: SearchHit) -> MemoryResult<MemoryRecord> {
    let id = hit
        .id
        .ok_or_else(|| MemoryError::malformed(collection.name(), "id"))?;
    let record = MemoryRecord::from_payload(collection, id, &hit.payload)?;

    if record.user_id() != user_id {
        return Err(MemoryError::malformed(collection.name(), "user_id"));
    }
    Ok(record)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::embeddings::HashEmbedder;
    use crate::memory::in_memory::InMemoryStore;
    use crate::memory::store::MemoryPoint;
    use crate::memory::types::{Payload, NO_MEMORY_SENTINEL};
    use crate::memory::writer::MemoryWriter;
    use uuid::Uuid;

    async fn setup() -> (MemoryWriter, MemoryReader, Arc<InMemoryStore>) {
        let store = Arc::new(InMemoryStore::new());
        store.ensure_collections().await.unwrap();
        let embedder: Arc<dyn Embedder> = Arc::new(HashEmbedder::new());
        (
            MemoryWriter::new(embedder.clone(), store.clone()),
            MemoryReader::new(embedder, store.clone()),
            store,
        )
    }

    #[tokio::test]
    async fn test_empty_state_returns_sentinel() {
        let (_, reader, _) = setup().await;
        assert_eq!(reader.retrieve("new-user", "anything").await.unwrap(), NO_MEMORY_SENTINEL);
    }

    #[tokio::test]
    async fn test_exact_match_ranks_first() {
        let (writer, reader, _) = setup().await;
        for fact in ["alpha", "beta", "gamma", "delta", "epsilon"] {
            writer.store_fact("u1", fact, "greek").await.unwrap();
        }

        let context = reader.recall("u1", "gamma").await.unwrap();
        assert_eq!(context.facts.len(), DEFAULT_TOP_K as usize);
        assert_eq!(context.facts[0].fact, "gamma");
    }

    #[tokio::test]
    async fn test_outage_is_not_sentinel() {
        let (_, reader, store) = setup().await;
        store.set_unavailable(true);

        let result = reader.retrieve("u1", "anything").await;
        assert!(matches!(result, Err(MemoryError::Connectivity(_))));
    }

    #[tokio::test]
    async fn test_malformed_record_skipped() {
        let (writer, reader, store) = setup().await;
        writer.store_preference("u1", "good preference").await.unwrap();

        // Payload lacking the preference text
        let mut payload = Payload::new();
        payload.insert("user_id".to_string(), "u1".to_string());
        store
            .upsert(
                Collection::UserPreferences,
                MemoryPoint {
                    id: Uuid::new_v4(),
                    vector: HashEmbedder::new().embed("broken").await.unwrap(),
                    payload,
                },
            )
            .await
            .unwrap();

        let context = reader.recall("u1", "good preference").await.unwrap();
        assert_eq!(context.preferences.len(), 1);
        assert_eq!(context.preferences[0].preference, "good preference");
    }

    #[test]
    fn test_decode_rejects_foreign_user() {
        let mut payload = Payload::new();
        payload.insert("user_id".to_string(), "u2".to_string());
        payload.insert("fact".to_string(), "secret".to_string());
        let hit = SearchHit {
            id: Some(Uuid::new_v4()),
            payload,
            score: 1.0,
        };

        assert!(decode_hit(Collection::KeyFacts, "u1", hit).is_err());
    }
}
