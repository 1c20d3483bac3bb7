//! ============================================================================
//! RESEARCH-MEMORY: Long-term memory for the research agent
//! ============================================================================
//! This crate handles the agent's per-user memory:
//! - Embedding text into 384-dimensional vectors
//! - Writing preferences, research sessions and facts to Qdrant
//! - Filtered similarity search and context assembly
//! ============================================================================

pub mod config;
pub mod error;
pub mod memory;

// Re-export main types for convenience
pub use config::{EmbeddingConfig, MemoryConfig, StoreConfig};
pub use error::{MemoryError, MemoryResult};
pub use memory::*;
