//! Embedding provider trait and factory.

use crate::embeddings::config::EmbeddingConfig;
use crate::embeddings::providers::{AzureOpenAiEmbeddings, HashEmbeddings, OllamaEmbeddings};
use finagent_core::{AppError, AppResult};
use std::sync::Arc;

/// Trait for embedding providers.
#[async_trait::async_trait]
pub trait EmbeddingProvider: Send + Sync + std::fmt::Debug {
    /// Get provider name (e.g., "azure-openai", "ollama", "hash")
    fn provider_name(&self) -> &str;

    /// Get model identifier
    fn model_name(&self) -> &str;

    /// Get embedding dimensions
    fn dimensions(&self) -> usize;

    /// Generate embeddings for multiple texts in a batch.
    async fn embed_batch(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>>;

    /// Generate embedding for a single text (convenience method).
    async fn embed(&self, text: &str) -> AppResult<Vec<f32>> {
        let mut results = self.embed_batch(&[text.to_string()]).await?;
        results
            .pop()
            .ok_or_else(|| AppError::Knowledge("No embedding returned".to_string()))
    }
}

/// Create an embedding provider based on configuration.
pub fn create_provider(config: &EmbeddingConfig) -> AppResult<Arc<dyn EmbeddingProvider>> {
    match config.provider.as_str() {
        "hash" => Ok(Arc::new(HashEmbeddings::new(config.dimensions))),

        "azure-openai" => {
            let endpoint = config.endpoint.clone().ok_or_else(|| {
                AppError::Config("AZURE_OPENAI_ENDPOINT is required for embeddings".to_string())
            })?;
            let api_key = config.api_key.clone().ok_or_else(|| {
                AppError::Config("AZURE_OPENAI_API_KEY is required for embeddings".to_string())
            })?;
            Ok(Arc::new(AzureOpenAiEmbeddings::new(
                endpoint, api_key, config,
            )?))
        }

        "ollama" => Ok(Arc::new(OllamaEmbeddings::new(config)?)),

        _ => Err(AppError::Knowledge(format!(
            "Unknown embedding provider: '{}'. Supported providers: azure-openai, ollama, hash",
            config.provider
        ))),
    }
}
