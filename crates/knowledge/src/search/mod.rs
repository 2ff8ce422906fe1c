//! Search index backends.
//!
//! Two backends implement [`SearchIndex`]: Azure AI Search over REST and a
//! local SQLite index used when no search service is configured.

pub mod azure;
pub mod filters;
pub mod local;

pub use azure::AzureSearchIndex;
pub use filters::{FilterValue, SearchFilters};
pub use local::LocalSearchIndex;

use crate::types::{IndexStats, RetrievalResult, SearchDocument};
use finagent_core::config::SearchBackend;
use finagent_core::{AppConfig, AppResult};
use std::sync::Arc;

/// A hybrid keyword + vector query.
#[derive(Debug, Clone)]
pub struct HybridQuery {
    /// Keyword query text
    pub text: String,
    /// Query embedding
    pub vector: Vec<f32>,
    /// Results to return
    pub top_k: usize,
    /// Candidates taken from the vector ranking
    pub k_nearest: usize,
    pub filter: SearchFilters,
}

impl HybridQuery {
    pub fn new(text: impl Into<String>, vector: Vec<f32>, top_k: usize) -> Self {
        Self {
            text: text.into(),
            vector,
            top_k,
            k_nearest: top_k.saturating_mul(2),
            filter: SearchFilters::default(),
        }
    }

    pub fn with_k_nearest(mut self, k_nearest: usize) -> Self {
        self.k_nearest = k_nearest;
        self
    }

    pub fn with_filter(mut self, filter: SearchFilters) -> Self {
        self.filter = filter;
        self
    }
}

/// Storage and hybrid ranking of indexed chunks.
#[async_trait::async_trait]
pub trait SearchIndex: Send + Sync {
    /// Backend identifier ("azure" or "local")
    fn backend_name(&self) -> &str;

    fn index_name(&self) -> &str;

    /// Create the index if needed for vectors of `dimensions`.
    async fn ensure_index(&self, dimensions: usize) -> AppResult<()>;

    /// Upload (insert or replace) documents, returning how many were stored.
    async fn upload(&self, documents: &[SearchDocument]) -> AppResult<usize>;

    async fn search(&self, query: &HybridQuery) -> AppResult<Vec<RetrievalResult>>;

    async fn stats(&self) -> AppResult<IndexStats>;

    /// Remove every indexed document.
    async fn reset(&self) -> AppResult<()>;
}

/// Open the search index selected by the configuration.
///
/// Returns `None` when the Azure backend is selected but its endpoint or key
/// is missing.
pub fn create_search_index(config: &AppConfig) -> AppResult<Option<Arc<dyn SearchIndex>>> {
    match config.search_backend() {
        SearchBackend::Azure => {
            match (config.search.endpoint.as_ref(), config.search.api_key.as_ref()) {
                (Some(endpoint), Some(api_key)) => Ok(Some(Arc::new(AzureSearchIndex::new(
                    endpoint,
                    api_key,
                    &config.search.index_name,
                )?))),
                _ => {
                    tracing::warn!(
                        "Azure AI Search selected but AZURE_SEARCH_ENDPOINT or AZURE_SEARCH_API_KEY is not set"
                    );
                    Ok(None)
                }
            }
        }
        SearchBackend::Local => Ok(Some(Arc::new(LocalSearchIndex::open(
            &config.local_index_path(),
            &config.search.index_name,
        )?))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_hybrid_query_defaults() {
        let query = HybridQuery::new("revenue", vec![0.1], 5);
        assert_eq!(query.k_nearest, 10);
        assert!(query.filter.is_empty());

        let huge = HybridQuery::new("revenue", vec![0.1], usize::MAX).with_k_nearest(3);
        assert_eq!(huge.k_nearest, 3);
        assert_eq!(HybridQuery::new("", vec![], usize::MAX).k_nearest, usize::MAX);
    }

    #[test]
    fn test_create_local_index() {
        let dir = TempDir::new().unwrap();
        let mut config = AppConfig::default();
        config.workspace = dir.path().to_path_buf();

        let index = create_search_index(&config).unwrap().unwrap();
        assert_eq!(index.backend_name(), "local");
        assert_eq!(index.index_name(), "financial-docs");
        assert!(config.local_index_path().exists());
    }

    #[test]
    fn test_azure_without_credentials_is_none() {
        let mut config = AppConfig::default();
        config.search.backend = Some(SearchBackend::Azure);
        assert!(create_search_index(&config).unwrap().is_none());
    }
}
