//! ============================================================================
//! Memory Module - Long-term memory for the research agent
//! ============================================================================
//! Persists preferences, past research and key facts as vectors in three
//! Qdrant collections and recalls the most relevant ones for a new query.
//!
//! ## Features
//! - Typed records, flattened to payloads only at the store boundary
//! - Hard per-user filtering on every search
//! - One query embedding shared across the three collections
//! - Pluggable embedder and store (HTTP/Qdrant in production, in-memory in tests)
//!
//! ## Architecture
//! ```text
//! Agent result → MemoryManager::store → Embed → Upsert (1-3 collections)
//!
//! Agent query  → MemoryReader → Embed once → 3 filtered top-3 searches
//!                                                   ↓
//!                     USER PREFERENCES / PAST RESEARCH / KEY FACTS block
//! ```
//!
//! ## Usage
//! ```rust,ignore
//! use research_memory::{AgentResult, MemoryConfig, MemoryManager};
//!
//! let manager = MemoryManager::connect(&MemoryConfig::from_env()?).await?;
//!
//! manager.store("user123", "what is RAG?", &AgentResult {
//!     summary: Some("RAG is...".into()),
//!     preference: Some("I prefer code examples".into()),
//!     ..Default::default()
//! }).await?;
//!
//! let context = manager.retrieve("user123", "explain retrieval").await?;
//! ```
//! ============================================================================

mod embeddings;
mod in_memory;
mod manager;
mod reader;
mod store;
mod types;
mod writer;

// Re-export public types
pub use embeddings::{check_dimension, Embedder, EmbeddingService, HashEmbedder, EMBEDDING_DIM};
pub use in_memory::{cosine_similarity, InMemoryStore};
pub use manager::MemoryManager;
pub use reader::{MemoryReader, DEFAULT_TOP_K};
pub use store::{CollectionStats, EnsureStatus, MemoryPoint, QdrantStore, SearchHit, VectorStore};
pub use types::{
    AgentResult, ClearOutcome, Collection, FactRecord, MemoryRecord, Payload, PreferenceRecord,
    RecalledContext, ResearchRecord, DEFAULT_MODE, DEFAULT_TOPIC, NO_MEMORY_SENTINEL,
};
pub use writer::MemoryWriter;
