//! In-process vector store with brute-force cosine search.
//!
//! Mirrors the Qdrant store's contract (hard `user_id` filter, best-first
//! ordering, limit) so the memory layer can be exercised without a server.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;
use tracing::debug;

use super::embeddings::check_dimension;
use super::store::{EnsureStatus, MemoryPoint, SearchHit, VectorStore};
use super::types::Collection;
use crate::error::{MemoryError, MemoryResult};

/// Calculate cosine similarity between two vectors.
pub fn cosine_similarity(v1: &[f32], v2: &[f32]) -> f32 {
    if v1.len() != v2.len() || v1.is_empty() {
        return 0.0;
    }
    let dot_product: f32 = v1.iter().zip(v2).map(|(a, b)| a * b).sum();
    let mag1: f32 = v1.iter().map(|a| a * a).sum::<f32>().sqrt();
    let mag2: f32 = v2.iter().map(|a| a * a).sum::<f32>().sqrt();
    if mag1 == 0.0 || mag2 == 0.0 {
        return 0.0;
    }
    dot_product / (mag1 * mag2)
}

#[derive(Default)]
pub struct InMemoryStore {
    collections: RwLock<HashMap<Collection, Vec<MemoryPoint>>>,
    unavailable: AtomicBool,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate an outage: every call fails with `Connectivity` while set
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Snapshot of every point in a collection, in insertion order
    pub async fn points(&self, collection: Collection) -> Vec<MemoryPoint> {
        self.collections
            .read()
            .await
            .get(&collection)
            .cloned()
            .unwrap_or_default()
    }

    fn check_available(&self) -> MemoryResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(MemoryError::Connectivity("store unavailable".to_string()));
        }
        Ok(())
    }

    fn missing(collection: Collection) -> MemoryError {
        MemoryError::Connectivity(format!("Collection {} does not exist", collection))
    }
}

#[async_trait]
impl VectorStore for InMemoryStore {
    async fn ensure_collections(&self) -> MemoryResult<Vec<(Collection, EnsureStatus)>> {
        self.check_available()?;

        let mut collections = self.collections.write().await;
        let report = Collection::ALL
            .into_iter()
            .map(|collection| {
                let status = if collections.contains_key(&collection) {
                    EnsureStatus::Existing
                } else {
                    collections.insert(collection, Vec::new());
                    EnsureStatus::Created
                };
                (collection, status)
            })
            .collect();

        Ok(report)
    }

    async fn upsert(&self, collection: Collection, point: MemoryPoint) -> MemoryResult<()> {
        self.check_available()?;
        check_dimension(&point.vector)?;

        let mut collections = self.collections.write().await;
        let points = collections
            .get_mut(&collection)
            .ok_or_else(|| Self::missing(collection))?;

        match points.iter_mut().find(|p| p.id == point.id) {
            Some(existing) => *existing = point,
            None => points.push(point),
        }
        Ok(())
    }

    async fn query(
        &self,
        collection: Collection,
        vector: Vec<f32>,
        user_id: &str,
        limit: u64,
    ) -> MemoryResult<Vec<SearchHit>> {
        self.check_available()?;
        check_dimension(&vector)?;

        let collections = self.collections.read().await;
        let points = collections
            .get(&collection)
            .ok_or_else(|| Self::missing(collection))?;

        let mut hits: Vec<SearchHit> = points
            .iter()
            .filter(|p| p.payload.get("user_id").map(String::as_str) == Some(user_id))
            .map(|p| SearchHit {
                id: Some(p.id),
                payload: p.payload.clone(),
                score: cosine_similarity(&vector, &p.vector),
            })
            .collect();

        // Stable sort: ties keep insertion order
        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        hits.truncate(limit as usize);

        debug!("Found {} hits in {}", hits.len(), collection);
        Ok(hits)
    }

    async fn count(&self, collection: Collection) -> MemoryResult<u64> {
        self.check_available()?;
        Ok(self
            .collections
            .read()
            .await
            .get(&collection)
            .map(|p| p.len() as u64)
            .unwrap_or(0))
    }

    async fn health_check(&self) -> MemoryResult<bool> {
        Ok(!self.unavailable.load(Ordering::SeqCst))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::embeddings::EMBEDDING_DIM;
    use crate::memory::types::Payload;
    use uuid::Uuid;

    fn point(user_id: &str, vector: Vec<f32>) -> MemoryPoint {
        let mut payload = Payload::new();
        payload.insert("user_id".to_string(), user_id.to_string());
        MemoryPoint {
            id: Uuid::new_v4(),
            vector,
            payload,
        }
    }

    fn axis(i: usize) -> Vec<f32> {
        let mut v = vec![0.0; EMBEDDING_DIM];
        v[i] = 1.0;
        v
    }

    #[test]
    fn test_cosine_similarity() {
        assert!((cosine_similarity(&[1.0, 0.0], &[2.0, 0.0]) - 1.0).abs() < 1e-6);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-6);
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 2.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 2.0]), 0.0);
    }

    #[tokio::test]
    async fn test_ensure_is_idempotent() {
        let store = InMemoryStore::new();
        let first = store.ensure_collections().await.unwrap();
        assert!(first.iter().all(|(_, s)| *s == EnsureStatus::Created));

        store
            .upsert(Collection::KeyFacts, point("u1", axis(0)))
            .await
            .unwrap();

        let second = store.ensure_collections().await.unwrap();
        assert!(second.iter().all(|(_, s)| *s == EnsureStatus::Existing));
        assert_eq!(store.count(Collection::KeyFacts).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_upsert_requires_collection() {
        let store = InMemoryStore::new();
        let result = store.upsert(Collection::KeyFacts, point("u1", axis(0))).await;
        assert!(matches!(result, Err(MemoryError::Connectivity(_))));
    }

    #[tokio::test]
    async fn test_query_filters_and_ranks() {
        let store = InMemoryStore::new();
        store.ensure_collections().await.unwrap();

        let near = point("u1", axis(0));
        let far = point("u1", axis(1));
        let other_user = point("u2", axis(0));
        for p in [far.clone(), near.clone(), other_user] {
            store.upsert(Collection::KeyFacts, p).await.unwrap();
        }

        let hits = store
            .query(Collection::KeyFacts, axis(0), "u1", 10)
            .await
            .unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].id, Some(near.id));
        assert_eq!(hits[1].id, Some(far.id));

        let limited = store
            .query(Collection::KeyFacts, axis(0), "u1", 1)
            .await
            .unwrap();
        assert_eq!(limited.len(), 1);
    }

    #[tokio::test]
    async fn test_wrong_dimension_rejected() {
        let store = InMemoryStore::new();
        store.ensure_collections().await.unwrap();

        let result = store.query(Collection::KeyFacts, vec![1.0; 8], "u1", 3).await;
        assert_eq!(
            result.unwrap_err(),
            MemoryError::DimensionMismatch {
                expected: EMBEDDING_DIM,
                actual: 8
            }
        );
    }

    #[tokio::test]
    async fn test_unavailable_store_fails() {
        let store = InMemoryStore::new();
        store.ensure_collections().await.unwrap();
        store.set_unavailable(true);

        assert!(!store.health_check().await.unwrap());
        let result = store.query(Collection::KeyFacts, axis(0), "u1", 3).await;
        assert!(matches!(result, Err(MemoryError::Connectivity(_))));
    }
}
