//! ============================================================================
//! Embedding Service - Vector embeddings for semantic memory search
//! ============================================================================
//! Generates 384-dimensional text embeddings through an OpenAI-compatible
//! `/embeddings` endpoint (e.g. a local server hosting all-MiniLM-L6-v2).
//! `HashEmbedder` is a deterministic offline stand-in for tests and smoke runs.
//! ============================================================================

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::config::EmbeddingConfig;
use crate::error::{MemoryError, MemoryResult};

/// Embedding dimension shared by the embedder and every collection
pub const EMBEDDING_DIM: usize = 384;

/// Text to vector function. Same model for writes and reads.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed a single text
    async fn embed(&self, text: &str) -> MemoryResult<Vec<f32>>;

    /// Dimension of the produced vectors
    fn dimension(&self) -> usize;

    /// Model identity
    fn model(&self) -> &str;
}

/// Embed `text` and verify the vector matches [`EMBEDDING_DIM`]
pub(crate) async fn embed_checked(embedder: &dyn Embedder, text: &str) -> MemoryResult<Vec<f32>> {
    let vector = embedder.embed(text).await?;
    check_dimension(&vector)?;
    Ok(vector)
}

/// Reject vectors whose length differs from [`EMBEDDING_DIM`]. Never pads or truncates.
pub fn check_dimension(vector: &[f32]) -> MemoryResult<()> {
    if vector.len() != EMBEDDING_DIM {
        return Err(MemoryError::DimensionMismatch {
            expected: EMBEDDING_DIM,
            actual: vector.len(),
        });
    }
    Ok(())
}

// ============================================================================
// HTTP embedding service
// ============================================================================

/// Embedding service for generating text vectors over HTTP
pub struct EmbeddingService {
    client: Client,
    api_key: Option<String>,
    base_url: String,
    model: String,
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest {
    model: String,
    input: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
    #[serde(default)]
    model: Option<String>,
    usage: Option<EmbeddingUsage>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    index: usize,
}

#[derive(Debug, Deserialize)]
#[allow(dead_code)]
struct EmbeddingUsage {
    prompt_tokens: u32,
    total_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
#[allow(dead_code)]
struct ErrorDetail {
    message: String,
    #[serde(rename = "type")]
    error_type: Option<String>,
}

impl EmbeddingService {
    /// Create from embedding configuration
    pub fn new(config: &EmbeddingConfig) -> Self {
        Self {
            client: Client::new(),
            api_key: config.api_key.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
        }
    }

    /// Generate embeddings for multiple texts, in input order
    pub async fn embed_batch(&self, texts: Vec<String>) -> MemoryResult<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(vec![]);
        }
        if texts.iter().any(|t| t.is_empty()) {
            return Err(MemoryError::Embedding("Cannot embed empty text".to_string()));
        }

        debug!("Generating embeddings for {} texts", texts.len());

        let expected = texts.len();
        let request = EmbeddingRequest {
            model: self.model.clone(),
            input: texts,
        };

        let mut builder = self
            .client
            .post(format!("{}/embeddings", self.base_url))
            .header("Content-Type", "application/json")
            .json(&request);
        if let Some(key) = &self.api_key {
            builder = builder.header("Authorization", format!("Bearer {}", key));
        }

        let response = builder.send().await.map_err(|e| {
            MemoryError::Embedding(format!("Failed to send embedding request: {}", e))
        })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| MemoryError::Embedding(format!("Failed to read response body: {}", e)))?;

        if !status.is_success() {
            if let Ok(error) = serde_json::from_str::<ErrorResponse>(&body) {
                return Err(MemoryError::Embedding(format!(
                    "Embedding API error ({}): {}",
                    status, error.error.message
                )));
            }
            return Err(MemoryError::Embedding(format!(
                "Embedding API error ({}): {}",
                status, body
            )));
        }

        let embeddings = parse_embedding_response(&body)?;
        if embeddings.len() != expected {
            return Err(MemoryError::Embedding(format!(
                "Expected {} embeddings, got {}",
                expected,
                embeddings.len()
            )));
        }
        Ok(embeddings)
    }

    /// Get the base URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

fn parse_embedding_response(body: &str) -> MemoryResult<Vec<Vec<f32>>> {
    let response: EmbeddingResponse = serde_json::from_str(body).map_err(|e| {
        MemoryError::Embedding(format!("Failed to parse embedding response: {}", e))
    })?;

    if let Some(usage) = &response.usage {
        debug!(
            "Embedding tokens used: {} (model: {})",
            usage.total_tokens,
            response.model.as_deref().unwrap_or("unknown")
        );
    }

    // Providers may return entries out of order
    let mut embeddings: Vec<(usize, Vec<f32>)> = response
        .data
        .into_iter()
        .map(|d| (d.index, d.embedding))
        .collect();
    embeddings.sort_by_key(|(idx, _)| *idx);

    Ok(embeddings.into_iter().map(|(_, e)| e).collect())
}

#[async_trait]
impl Embedder for EmbeddingService {
    async fn embed(&self, text: &str) -> MemoryResult<Vec<f32>> {
        self.embed_batch(vec![text.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| MemoryError::Embedding("No embedding returned".to_string()))
    }

    fn dimension(&self) -> usize {
        EMBEDDING_DIM
    }

    fn model(&self) -> &str {
        &self.model
    }
}

// ============================================================================
// Deterministic hash embedder
// ============================================================================

/// Offline embedder producing unit-length vectors seeded from a content hash.
///
/// Identical text always maps to the identical vector, so an exact-text
/// query scores 1.0 against its own record. Distinct texts land on unrelated
/// directions; there is no semantic similarity beyond exact matches.
#[derive(Debug, Clone)]
pub struct HashEmbedder {
    dimension: usize,
}

impl Default for HashEmbedder {
    fn default() -> Self {
        Self::new()
    }
}

impl HashEmbedder {
    pub fn new() -> Self {
        Self {
            dimension: EMBEDDING_DIM,
        }
    }

    /// Embedder with a non-standard dimension (used to exercise mismatch handling)
    pub fn with_dimension(dimension: usize) -> Self {
        Self { dimension }
    }

    fn generate(&self, text: &str) -> Vec<f32> {
        // Seed from SHA-256 so vectors stay stable across toolchains
        let hash = Sha256::digest(text.as_bytes());
        let mut seed_bytes = [0u8; 8];
        seed_bytes.copy_from_slice(&hash[..8]);
        let mut seed = u64::from_le_bytes(seed_bytes);

        // Knuth MMIX LCG
        let mut vector: Vec<f32> = (0..self.dimension)
            .map(|_| {
                seed = seed.wrapping_mul(6364136223846793005).wrapping_add(1);
                ((seed as f64 / u64::MAX as f64) * 2.0 - 1.0) as f32
            })
            .collect();

        let magnitude: f32 = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if magnitude > 0.0 {
            for v in &mut vector {
                *v /= magnitude;
            }
        }
        vector
    }
}

#[async_trait]
impl Embedder for HashEmbedder {
    async fn embed(&self, text: &str) -> MemoryResult<Vec<f32>> {
        if text.is_empty() {
            return Err(MemoryError::Embedding("Cannot embed empty text".to_string()));
        }
        Ok(self.generate(text))
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model(&self) -> &str {
        "hash-embedder-v1"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_service_creation() {
        let service = EmbeddingService::new(&EmbeddingConfig {
            base_url: "http://localhost:8080/v1/".to_string(),
            api_key: None,
            model: "all-MiniLM-L6-v2".to_string(),
        });
        assert_eq!(service.base_url(), "http://localhost:8080/v1");
        assert_eq!(service.model(), "all-MiniLM-L6-v2");
        assert_eq!(service.dimension(), EMBEDDING_DIM);
    }

    #[tokio::test]
    async fn test_empty_batch() {
        let service = EmbeddingService::new(&EmbeddingConfig::default());
        let result = service.embed_batch(vec![]).await;
        assert!(result.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_empty_text_rejected() {
        let service = EmbeddingService::new(&EmbeddingConfig::default());
        let result = service.embed("").await;
        assert!(matches!(result, Err(MemoryError::Embedding(_))));
    }

    #[test]
    fn test_response_sorted_by_index() {
        let body = r#"{
            "data": [
                {"embedding": [0.2, 0.2], "index": 1},
                {"embedding": [0.1, 0.1], "index": 0}
            ],
            "model": "all-MiniLM-L6-v2",
            "usage": {"prompt_tokens": 4, "total_tokens": 4}
        }"#;
        let embeddings = parse_embedding_response(body).unwrap();
        assert_eq!(embeddings, vec![vec![0.1, 0.1], vec![0.2, 0.2]]);
    }

    #[tokio::test]
    async fn test_hash_embedder_deterministic() {
        let embedder = HashEmbedder::new();
        let a = embedder.embed("I prefer code examples").await.unwrap();
        let b = embedder.embed("I prefer code examples").await.unwrap();
        let c = embedder.embed("I prefer prose").await.unwrap();

        assert_eq!(a.len(), EMBEDDING_DIM);
        assert_eq!(a, b);
        assert_ne!(a, c);

        let norm: f32 = a.iter().map(|v| v * v).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-4);
    }

    #[tokio::test]
    async fn test_hash_embedder_pinned_components() {
        // Stored vectors depend on these staying fixed
        let v = HashEmbedder::new().embed("I prefer code examples").await.unwrap();
        let expected = [-0.070416_f32, -0.042743, -0.078088, -0.037141];
        for (i, want) in expected.iter().enumerate() {
            assert!((v[i] - want).abs() < 1e-4, "component {}: {} != {}", i, v[i], want);
        }
    }

    #[tokio::test]
    async fn test_embed_checked_rejects_wrong_dimension() {
        let embedder = HashEmbedder::with_dimension(128);
        let err = embed_checked(&embedder, "text").await.unwrap_err();
        assert_eq!(
            err,
            MemoryError::DimensionMismatch {
                expected: EMBEDDING_DIM,
                actual: 128
            }
        );
    }
}
