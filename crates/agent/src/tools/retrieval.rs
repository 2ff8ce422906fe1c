//! `search_financial_documents`: hybrid search over the indexed reports.

use super::{tool_error, Tool};
use finagent_core::AppResult;
use finagent_knowledge::{citations, context_string, Citation, HybridRetriever, SearchFilters};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;

/// What a search hands back to the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalOutput {
    pub context: String,
    pub citations: Vec<Citation>,
    pub num_results: usize,
}

#[derive(Clone)]
pub struct RetrievalTool {
    retriever: Arc<HybridRetriever>,
}

impl RetrievalTool {
    pub fn new(retriever: Arc<HybridRetriever>) -> Self {
        Self { retriever }
    }

    pub fn retriever(&self) -> &Arc<HybridRetriever> {
        &self.retriever
    }

    pub async fn search(
        &self,
        query: &str,
        top_k: Option<usize>,
        filters: Option<&SearchFilters>,
        use_reranking: bool,
    ) -> RetrievalOutput {
        let results = self
            .retriever
            .retrieve(query, top_k, filters, use_reranking)
            .await;

        RetrievalOutput {
            context: context_string(&results),
            citations: citations(&results),
            num_results: results.len(),
        }
    }
}

#[async_trait::async_trait]
impl Tool for RetrievalTool {
    fn name(&self) -> &str {
        "search_financial_documents"
    }

    fn description(&self) -> &str {
        "Search through financial documents (earnings reports, statements, filings) to find \
         specific information. Uses hybrid keyword and vector search. Returns relevant excerpts \
         with citations. Use this when you need to find data from documents."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "What to search for",
                },
                "top_k": {
                    "type": "integer",
                    "description": "Number of results to return",
                },
                "filters": {
                    "type": "object",
                    "description": "Exact-match filters on document_name, page_number, section or chunk_type",
                },
                "use_reranking": {
                    "type": "boolean",
                    "description": "Rerank the candidates (default true)",
                },
            },
            "required": ["query"],
        })
    }

    async fn execute(&self, args: Value) -> AppResult<Value> {
        let Some(query) = args.get("query").and_then(Value::as_str) else {
            return Ok(tool_error("Missing required parameter 'query'"));
        };
        let top_k = args
            .get("top_k")
            .and_then(Value::as_u64)
            .map(|k| k as usize);
        let use_reranking = args
            .get("use_reranking")
            .and_then(Value::as_bool)
            .unwrap_or(true);
        let filters = match args.get("filters") {
            Some(value) if !value.is_null() => Some(SearchFilters::from_json(value)?),
            _ => None,
        };

        let output = self
            .search(query, top_k, filters.as_ref(), use_reranking)
            .await;
        Ok(serde_json::to_value(output)?)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use finagent_knowledge::embeddings::providers::HashEmbeddings;
    use finagent_knowledge::search::LocalSearchIndex;
    use finagent_knowledge::{EmbeddingProvider, SearchDocument, SearchIndex};
    use tempfile::TempDir;

    const DIMENSIONS: usize = 64;

    /// Local index holding a few report excerpts.
    pub(crate) async fn seeded_retriever(dir: &TempDir) -> Arc<HybridRetriever> {
        let embedder = Arc::new(HashEmbeddings::new(DIMENSIONS));
        let index: Arc<dyn SearchIndex> = Arc::new(
            LocalSearchIndex::open(&dir.path().join("index.sqlite"), "financial-docs").unwrap(),
        );
        index.ensure_index(DIMENSIONS).await.unwrap();

        let pages = [
            ("q3_report", 1, "Total revenue for Q3 2024 was $5.2 million"),
            ("q3_report", 2, "Net income for Q3 2024 was $1.3 million"),
            ("q4_report", 1, "Total revenue for Q4 2024 was $6.1 million"),
        ];
        let mut docs = Vec::new();
        for (doc, page, text) in pages {
            docs.push(SearchDocument {
                id: format!("{}_p{}_c0", doc, page),
                content: text.to_string(),
                document_name: doc.to_string(),
                page_number: page,
                chunk_index: 0,
                chunk_type: "text".to_string(),
                section: "Introduction".to_string(),
                embedding: embedder.embed(text).await.unwrap(),
            });
        }
        index.upload(&docs).await.unwrap();

        Arc::new(HybridRetriever::new(embedder, Some(index), 5))
    }

    #[tokio::test]
    async fn test_search_returns_context_and_citations() {
        let dir = TempDir::new().unwrap();
        let tool = RetrievalTool::new(seeded_retriever(&dir).await);

        let output = tool.search("Q3 total revenue", Some(2), None, true).await;
        assert_eq!(output.num_results, 2);
        assert_eq!(output.citations.len(), 2);
        assert!(output.context.starts_with("[1] "));
    }

    #[tokio::test]
    async fn test_execute_with_filters() {
        let dir = TempDir::new().unwrap();
        let tool = RetrievalTool::new(seeded_retriever(&dir).await);

        let output = tool
            .execute(json!({
                "query": "total revenue",
                "filters": {"document_name": "q4_report"},
            }))
            .await
            .unwrap();

        assert_eq!(output["num_results"], 1);
        assert_eq!(output["citations"][0]["document"], "q4_report");
    }

    #[tokio::test]
    async fn test_execute_requires_query() {
        let dir = TempDir::new().unwrap();
        let tool = RetrievalTool::new(seeded_retriever(&dir).await);
        let output = tool.execute(json!({})).await.unwrap();
        assert_eq!(output["success"], false);
    }
}
