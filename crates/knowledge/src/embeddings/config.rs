//! Embedding configuration derived from the application config.

use finagent_core::AppConfig;
use serde::{Deserialize, Serialize};

/// Model name reported by the offline hash embedder.
pub const HASH_MODEL: &str = "hash-trigram-v1";

/// Default embedding model pulled into Ollama.
pub const OLLAMA_EMBEDDING_MODEL: &str = "nomic-embed-text";

/// Embedding provider settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EmbeddingConfig {
    /// Provider name: "azure-openai", "ollama" or "hash"
    pub provider: String,

    /// Model or deployment identifier
    pub model: String,

    /// Embedding vector dimensions
    pub dimensions: usize,

    /// Maximum inputs per embedding request
    pub batch_size: usize,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,

    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_version: Option<String>,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: "hash".to_string(),
            model: HASH_MODEL.to_string(),
            dimensions: 384,
            batch_size: 100,
            endpoint: None,
            api_key: None,
            api_version: None,
        }
    }
}

impl EmbeddingConfig {
    /// Resolve the embedding settings for the active configuration.
    pub fn from_app_config(config: &AppConfig) -> Self {
        match config.embedding_provider().as_str() {
            "azure-openai" => Self {
                provider: "azure-openai".to_string(),
                model: config.azure.embedding_deployment.clone(),
                dimensions: config.azure.embedding_dimensions,
                batch_size: 16,
                endpoint: config.azure.endpoint.clone(),
                api_key: config.azure.api_key.clone(),
                api_version: Some(config.azure.api_version.clone()),
            },
            "ollama" => Self {
                provider: "ollama".to_string(),
                model: OLLAMA_EMBEDDING_MODEL.to_string(),
                dimensions: 768,
                batch_size: 32,
                endpoint: Some(config.ollama.endpoint.clone()),
                api_key: None,
                api_version: None,
            },
            other => Self {
                provider: other.to_string(),
                dimensions: config.azure.embedding_dimensions,
                ..Self::default()
            },
        }
    }
}
