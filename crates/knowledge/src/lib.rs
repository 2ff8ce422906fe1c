//! Financial document knowledge layer.
//!
//! Parses reports into page text, splits pages into structure-aware chunks,
//! embeds them and stores them in a hybrid (keyword + vector) search index.
//! [`HybridRetriever`] serves the query side.

pub mod chunker;
pub mod embeddings;
pub mod ingest;
pub mod parser;
pub mod progress;
pub mod retrieval;
pub mod search;
pub mod types;

pub use chunker::StructureAwareChunker;
pub use embeddings::{create_provider, EmbeddingConfig, EmbeddingProvider};
pub use ingest::DocumentProcessor;
pub use progress::{ProgressEvent, ProgressReporter};
pub use retrieval::{citations, context_string, HybridRetriever};
pub use search::{create_search_index, FilterValue, HybridQuery, SearchFilters, SearchIndex};
pub use types::{
    ChunkType, Citation, DocumentChunk, IndexStats, IngestStats, RetrievalResult, SearchDocument,
};

use finagent_core::{AppConfig, AppResult};

/// Build the query-side retriever for the configured embedding provider and
/// search backend.
pub fn create_retriever(config: &AppConfig) -> AppResult<HybridRetriever> {
    let embedder = create_provider(&EmbeddingConfig::from_app_config(config))?;
    let index = create_search_index(config)?;
    Ok(HybridRetriever::new(embedder, index, config.search.top_k))
}
