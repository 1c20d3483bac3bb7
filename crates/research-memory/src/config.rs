//! ============================================================================
//! Memory Configuration - Store endpoint, credential and embedder settings
//! ============================================================================
//! Built explicitly and handed to `MemoryManager::connect`. `from_env` reads
//! the process environment; loading a `.env` file is left to the binary.
//! ============================================================================

use serde::{Deserialize, Serialize};

use crate::error::{MemoryError, MemoryResult};

/// Default Qdrant gRPC endpoint
pub const DEFAULT_QDRANT_URL: &str = "http://localhost:6334";

/// Default OpenAI-compatible embeddings endpoint (local embedding server)
pub const DEFAULT_EMBEDDING_URL: &str = "http://localhost:8080/v1";

/// Default embedding model, 384-dimensional
pub const DEFAULT_EMBEDDING_MODEL: &str = "sentence-transformers/all-MiniLM-L6-v2";

const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// Complete configuration for the memory layer
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MemoryConfig {
    pub store: StoreConfig,
    pub embedding: EmbeddingConfig,
}

/// Vector store connection settings
#[derive(Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Store URL
    pub endpoint: String,
    /// Access token, if the store requires one
    pub credential: Option<String>,
    /// Per-request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_QDRANT_URL.to_string(),
            credential: None,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl std::fmt::Debug for StoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreConfig")
            .field("endpoint", &self.endpoint)
            .field("credential", &self.credential.as_ref().map(|_| "<redacted>"))
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

/// Embedding provider settings
#[derive(Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub model: String,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_EMBEDDING_URL.to_string(),
            api_key: None,
            model: DEFAULT_EMBEDDING_MODEL.to_string(),
        }
    }
}

impl std::fmt::Debug for EmbeddingConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmbeddingConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("model", &self.model)
            .finish()
    }
}

impl MemoryConfig {
    /// Read configuration from environment variables, falling back to defaults
    pub fn from_env() -> MemoryResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup (env-like)
    pub fn from_lookup<F>(lookup: F) -> MemoryResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let timeout_secs = match get("QDRANT_TIMEOUT_SECS") {
            Some(raw) => raw.trim().parse::<u64>().map_err(|e| {
                MemoryError::Config(format!("QDRANT_TIMEOUT_SECS '{}': {}", raw, e))
            })?,
            None => DEFAULT_TIMEOUT_SECS,
        };

        let config = Self {
            store: StoreConfig {
                endpoint: get("QDRANT_URL").unwrap_or_else(|| DEFAULT_QDRANT_URL.to_string()),
                credential: get("QDRANT_API_KEY"),
                timeout_secs,
            },
            embedding: EmbeddingConfig {
                base_url: get("EMBEDDING_URL").unwrap_or_else(|| DEFAULT_EMBEDDING_URL.to_string()),
                api_key: get("EMBEDDING_API_KEY"),
                model: get("EMBEDDING_MODEL").unwrap_or_else(|| DEFAULT_EMBEDDING_MODEL.to_string()),
            },
        };

        config.validate()?;
        Ok(config)
    }

    /// Reject configurations that cannot possibly connect
    pub fn validate(&self) -> MemoryResult<()> {
        if self.store.endpoint.trim().is_empty() {
            return Err(MemoryError::Config("store endpoint is empty".to_string()));
        }
        if self.embedding.base_url.trim().is_empty() {
            return Err(MemoryError::Config("embedding base URL is empty".to_string()));
        }
        if self.store.timeout_secs == 0 {
            return Err(MemoryError::Config("store timeout must be positive".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = MemoryConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.store.endpoint, DEFAULT_QDRANT_URL);
        assert!(config.store.credential.is_none());
        assert_eq!(config.store.timeout_secs, DEFAULT_TIMEOUT_SECS);
        assert_eq!(config.embedding.model, DEFAULT_EMBEDDING_MODEL);
    }

    #[test]
    fn test_env_overrides() {
        let config = MemoryConfig::from_lookup(lookup(&[
            ("QDRANT_URL", "https://qdrant.example:6334"),
            ("QDRANT_API_KEY", "secret"),
            ("QDRANT_TIMEOUT_SECS", "30"),
            ("EMBEDDING_API_KEY", ""),
        ]))
        .unwrap();

        assert_eq!(config.store.endpoint, "https://qdrant.example:6334");
        assert_eq!(config.store.credential.as_deref(), Some("secret"));
        assert_eq!(config.store.timeout_secs, 30);
        // Empty values count as unset
        assert!(config.embedding.api_key.is_none());
    }

    #[test]
    fn test_bad_timeout_rejected() {
        let result = MemoryConfig::from_lookup(lookup(&[("QDRANT_TIMEOUT_SECS", "soon")]));
        assert!(matches!(result, Err(MemoryError::Config(_))));
    }

    #[test]
    fn test_debug_redacts_credentials() {
        let mut config = MemoryConfig::default();
        config.store.credential = Some("top-secret".to_string());
        config.embedding.api_key = Some("also-secret".to_string());

        let printed = format!("{:?}", config);
        assert!(!printed.contains("top-secret"));
        assert!(!printed.contains("also-secret"));
        assert!(printed.contains("<redacted>"));
    }
}
