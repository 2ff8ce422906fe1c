//! Hybrid retrieval over the search index.

pub mod rerank;

pub use rerank::{LexicalReranker, NoOpReranker, Reranker};

use crate::embeddings::EmbeddingProvider;
use crate::search::{HybridQuery, SearchFilters, SearchIndex};
use crate::types::{Citation, RetrievalResult};
use std::sync::Arc;

/// Maximum characters of content shown in a citation preview.
const CITATION_PREVIEW_CHARS: usize = 200;

/// Embeds queries and runs hybrid search with optional reranking.
pub struct HybridRetriever {
    embedder: Arc<dyn EmbeddingProvider>,
    index: Option<Arc<dyn SearchIndex>>,
    reranker: Arc<dyn Reranker>,
    top_k: usize,
}

impl HybridRetriever {
    pub fn new(
        embedder: Arc<dyn EmbeddingProvider>,
        index: Option<Arc<dyn SearchIndex>>,
        top_k: usize,
    ) -> Self {
        Self {
            embedder,
            index,
            reranker: Arc::new(LexicalReranker),
            top_k,
        }
    }

    pub fn with_reranker(mut self, reranker: Arc<dyn Reranker>) -> Self {
        self.reranker = reranker;
        self
    }

    pub fn index(&self) -> Option<&Arc<dyn SearchIndex>> {
        self.index.as_ref()
    }

    pub fn default_top_k(&self) -> usize {
        self.top_k
    }

    /// Retrieve the most relevant chunks for `query`.
    ///
    /// Failures are logged and produce an empty list.
    #[tracing::instrument(name = "retrieve", skip_all, fields(query = %query))]
    pub async fn retrieve(
        &self,
        query: &str,
        top_k: Option<usize>,
        filters: Option<&SearchFilters>,
        use_reranking: bool,
    ) -> Vec<RetrievalResult> {
        let top_k = top_k.unwrap_or(self.top_k).max(1);

        let index = match &self.index {
            Some(index) => index,
            None => {
                tracing::error!("Search client not initialized");
                return Vec::new();
            }
        };

        let vector = match self.embedder.embed(query).await {
            Ok(vector) => vector,
            Err(e) => {
                tracing::error!("Failed to embed query: {}", e);
                return Vec::new();
            }
        };

        // Extra candidates for the reranker; vector recall stays at 2 * top_k
        let candidates = if use_reranking {
            top_k.saturating_mul(2)
        } else {
            top_k
        };
        let mut hybrid = HybridQuery::new(query, vector, candidates)
            .with_k_nearest(top_k.saturating_mul(2));
        if let Some(filters) = filters {
            hybrid = hybrid.with_filter(filters.clone());
        }

        let mut results = match index.search(&hybrid).await {
            Ok(results) => results,
            Err(e) => {
                tracing::error!("Search failed: {}", e);
                return Vec::new();
            }
        };

        if use_reranking {
            results = self.reranker.rerank(query, results);
        }
        results.truncate(top_k);

        tracing::info!(
            "Retrieved {} results (backend: {}, reranker: {})",
            results.len(),
            index.backend_name(),
            if use_reranking { self.reranker.name() } else { "none" }
        );

        results
    }
}

/// Format results as a numbered context block for the LLM.
pub fn context_string(results: &[RetrievalResult]) -> String {
    if results.is_empty() {
        return "No relevant documents found.".to_string();
    }

    results
        .iter()
        .enumerate()
        .map(|(i, r)| {
            format!(
                "[{}] {}, Page {}, Section: {}\n{}\n",
                i + 1,
                r.document_name,
                r.page_number,
                r.section,
                r.content
            )
        })
        .collect::<Vec<_>>()
        .join("\n---\n")
}

/// Citation records for the results, numbered from 1.
pub fn citations(results: &[RetrievalResult]) -> Vec<Citation> {
    results
        .iter()
        .enumerate()
        .map(|(i, r)| Citation {
            id: i + 1,
            document: r.document_name.clone(),
            page: r.page_number,
            section: r.section.clone(),
            content: preview(&r.content),
            score: (r.score * 1000.0).round() / 1000.0,
        })
        .collect()
}

fn preview(content: &str) -> String {
    if content.chars().count() > CITATION_PREVIEW_CHARS {
        let truncated: String = content.chars().take(CITATION_PREVIEW_CHARS).collect();
        format!("{}...", truncated)
    } else {
        content.to_string()
    }
}
