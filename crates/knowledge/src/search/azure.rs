//! Azure AI Search backend over the REST API.

use crate::search::{HybridQuery, SearchIndex};
use crate::types::{IndexStats, RetrievalResult, SearchDocument};
use finagent_core::{AppError, AppResult};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;

/// Search service REST API version
pub const SEARCH_API_VERSION: &str = "2023-11-01";

const VECTOR_PROFILE: &str = "finagentHnswProfile";
const VECTOR_ALGORITHM: &str = "finagentHnsw";
const SELECT_FIELDS: &str = "id,content,document_name,page_number,chunk_index,chunk_type,section";

/// Request timeout in seconds
const REQUEST_TIMEOUT_SECS: u64 = 60;

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    value: Vec<SearchHit>,
}

#[derive(Debug, Deserialize)]
struct SearchHit {
    #[serde(rename = "@search.score", default)]
    score: f64,
    #[serde(default)]
    id: String,
    #[serde(default)]
    content: String,
    #[serde(default)]
    document_name: String,
    #[serde(default)]
    page_number: u32,
    #[serde(default)]
    chunk_type: String,
    #[serde(default)]
    section: String,
}

#[derive(Debug, Deserialize)]
struct IndexingResponse {
    #[serde(default)]
    value: Vec<IndexingResult>,
}

#[derive(Debug, Deserialize)]
struct IndexingResult {
    key: String,
    status: bool,
    #[serde(rename = "errorMessage", default)]
    error_message: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IndexStatistics {
    #[serde(default)]
    document_count: u64,
    #[serde(default)]
    storage_size: Option<u64>,
}

/// Azure AI Search index client.
pub struct AzureSearchIndex {
    client: Client,
    endpoint: String,
    api_key: String,
    index_name: String,
}

impl AzureSearchIndex {
    pub fn new(endpoint: &str, api_key: &str, index_name: &str) -> AppResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| AppError::Search(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            index_name: index_name.to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!(
            "{}/indexes/{}{}?api-version={}",
            self.endpoint, self.index_name, path, SEARCH_API_VERSION
        )
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> AppResult<reqwest::Response> {
        let response = request
            .header("api-key", &self.api_key)
            .send()
            .await
            .map_err(|e| AppError::Search(format!("Failed to reach Azure AI Search: {}", e)))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let error_text = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        Err(service_error(status, &self.index_name, &error_text))
    }

    /// Index definition for vectors of `dimensions`.
    fn index_definition(&self, dimensions: usize) -> Value {
        json!({
            "name": self.index_name,
            "fields": [
                {"name": "id", "type": "Edm.String", "key": true, "filterable": true},
                {"name": "content", "type": "Edm.String", "searchable": true},
                {"name": "document_name", "type": "Edm.String", "searchable": true, "filterable": true, "facetable": true},
                {"name": "page_number", "type": "Edm.Int32", "filterable": true},
                {"name": "chunk_index", "type": "Edm.Int32"},
                {"name": "chunk_type", "type": "Edm.String", "searchable": true, "filterable": true},
                {"name": "section", "type": "Edm.String", "searchable": true, "filterable": true},
                {
                    "name": "embedding",
                    "type": "Collection(Edm.Single)",
                    "searchable": true,
                    "dimensions": dimensions,
                    "vectorSearchProfile": VECTOR_PROFILE
                }
            ],
            "vectorSearch": {
                "algorithms": [{"name": VECTOR_ALGORITHM, "kind": "hnsw"}],
                "profiles": [{"name": VECTOR_PROFILE, "algorithm": VECTOR_ALGORITHM}]
            }
        })
    }

    fn search_body(query: &HybridQuery) -> AppResult<Value> {
        let search_text = if query.text.trim().is_empty() {
            "*"
        } else {
            query.text.as_str()
        };
        let mut body = json!({
            "search": search_text,
            "top": query.top_k,
            "select": SELECT_FIELDS,
        });

        if !query.vector.is_empty() {
            body["vectorQueries"] = json!([{
                "kind": "vector",
                "vector": query.vector,
                "k": query.k_nearest,
                "fields": "embedding"
            }]);
        }

        if let Some(filter) = query.filter.to_odata()? {
            body["filter"] = Value::String(filter);
        }

        Ok(body)
    }

    async fn distinct_documents(&self) -> AppResult<u64> {
        let body = json!({
            "search": "*",
            "top": 0,
            "facets": ["document_name,count:1000"]
        });
        let response = self
            .send(self.client.post(self.url("/docs/search")).json(&body))
            .await?;
        let value: Value = response
            .json()
            .await
            .map_err(|e| AppError::Search(format!("Failed to parse facet response: {}", e)))?;

        Ok(value["@search.facets"]["document_name"]
            .as_array()
            .map(|facets| facets.len() as u64)
            .unwrap_or(0))
    }
}

fn service_error(status: StatusCode, index_name: &str, body: &str) -> AppError {
    if status == StatusCode::NOT_FOUND {
        return AppError::Search(format!("Search index '{}' not found", index_name));
    }

    let message = serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v["error"]["message"].as_str().map(str::to_string))
        .unwrap_or_else(|| body.to_string());
    AppError::Search(format!("Azure AI Search error ({}): {}", status, message))
}

fn upload_body(documents: &[SearchDocument]) -> AppResult<Value> {
    let mut actions = Vec::with_capacity(documents.len());
    for doc in documents {
        let mut value = serde_json::to_value(doc)?;
        value["@search.action"] = Value::String("upload".to_string());
        actions.push(value);
    }
    Ok(json!({ "value": actions }))
}

#[async_trait::async_trait]
impl SearchIndex for AzureSearchIndex {
    fn backend_name(&self) -> &str {
        "azure"
    }

    fn index_name(&self) -> &str {
        &self.index_name
    }

    async fn ensure_index(&self, dimensions: usize) -> AppResult<()> {
        match self.send(self.client.get(self.url(""))).await {
            Ok(_) => {
                tracing::debug!("Search index '{}' already exists", self.index_name);
                return Ok(());
            }
            Err(AppError::Search(message)) if message.contains("not found") => {}
            Err(e) => return Err(e),
        }

        self.send(
            self.client
                .put(self.url(""))
                .json(&self.index_definition(dimensions)),
        )
        .await?;

        tracing::info!(
            "Created search index '{}' ({} dimensions)",
            self.index_name,
            dimensions
        );
        Ok(())
    }

    async fn upload(&self, documents: &[SearchDocument]) -> AppResult<usize> {
        if documents.is_empty() {
            return Ok(0);
        }

        let response = self
            .send(
                self.client
                    .post(self.url("/docs/index"))
                    .json(&upload_body(documents)?),
            )
            .await?;

        let parsed: IndexingResponse = response
            .json()
            .await
            .map_err(|e| AppError::Search(format!("Failed to parse indexing response: {}", e)))?;

        let mut succeeded = 0;
        for result in parsed.value {
            if result.status {
                succeeded += 1;
            } else {
                tracing::warn!(
                    "Failed to index {}: {}",
                    result.key,
                    result.error_message.unwrap_or_default()
                );
            }
        }
        Ok(succeeded)
    }

    #[tracing::instrument(name = "hybrid_search", skip(self, query), fields(backend = "azure", top_k = query.top_k))]
    async fn search(&self, query: &HybridQuery) -> AppResult<Vec<RetrievalResult>> {
        let body = Self::search_body(query)?;
        let response = self
            .send(self.client.post(self.url("/docs/search")).json(&body))
            .await?;

        let parsed: SearchResponse = response
            .json()
            .await
            .map_err(|e| AppError::Search(format!("Failed to parse search response: {}", e)))?;

        Ok(parsed.value.into_iter().map(hit_to_result).collect())
    }

    async fn stats(&self) -> AppResult<IndexStats> {
        let response = self.send(self.client.get(self.url("/stats"))).await?;
        let statistics: IndexStatistics = response
            .json()
            .await
            .map_err(|e| AppError::Search(format!("Failed to parse index statistics: {}", e)))?;

        Ok(IndexStats {
            backend: "azure".to_string(),
            index_name: self.index_name.clone(),
            documents: self.distinct_documents().await?,
            chunks: statistics.document_count,
            storage_bytes: statistics.storage_size,
        })
    }

    async fn reset(&self) -> AppResult<()> {
        match self.send(self.client.delete(self.url(""))).await {
            Ok(_) => {
                tracing::info!("Deleted search index '{}'", self.index_name);
                Ok(())
            }
            Err(AppError::Search(message)) if message.contains("not found") => Ok(()),
            Err(e) => Err(e),
        }
    }
}

fn hit_to_result(hit: SearchHit) -> RetrievalResult {
    RetrievalResult {
        content: hit.content,
        document_name: hit.document_name,
        page_number: hit.page_number,
        section: hit.section,
        score: hit.score,
        chunk_id: hit.id,
        chunk_type: hit.chunk_type,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::{FilterValue, SearchFilters};

    fn index() -> AzureSearchIndex {
        AzureSearchIndex::new("https://demo.search.windows.net/", "key", "financial-docs").unwrap()
    }

    #[test]
    fn test_urls() {
        assert_eq!(
            index().url("/docs/search"),
            "https://demo.search.windows.net/indexes/financial-docs/docs/search?api-version=2023-11-01"
        );
    }

    #[test]
    fn test_index_definition() {
        let definition = index().index_definition(1536);
        let fields = definition["fields"].as_array().unwrap();
        assert_eq!(fields.len(), 8);
        assert_eq!(fields[0]["key"], true);
        assert_eq!(fields[7]["dimensions"], 1536);
        assert_eq!(fields[7]["vectorSearchProfile"], "finagentHnswProfile");
        assert_eq!(
            definition["vectorSearch"]["profiles"][0]["algorithm"],
            "finagentHnsw"
        );
    }

    #[test]
    fn test_search_body() {
        let query = HybridQuery::new("net income", vec![0.5, 0.5], 5).with_filter(
            SearchFilters::new().with("page_number", FilterValue::Number(3.0)),
        );
        let body = AzureSearchIndex::search_body(&query).unwrap();

        assert_eq!(body["search"], "net income");
        assert_eq!(body["top"], 5);
        assert_eq!(body["vectorQueries"][0]["k"], 10);
        assert_eq!(body["vectorQueries"][0]["fields"], "embedding");
        assert_eq!(body["filter"], "page_number eq 3");
    }

    #[test]
    fn test_upload_body_marks_action() {
        let doc = SearchDocument {
            id: "q3_p1_c0".to_string(),
            content: "Revenue".to_string(),
            document_name: "q3".to_string(),
            page_number: 1,
            chunk_index: 0,
            chunk_type: "text".to_string(),
            section: "Introduction".to_string(),
            embedding: vec![0.1],
        };
        let body = upload_body(&[doc]).unwrap();
        assert_eq!(body["value"][0]["@search.action"], "upload");
        assert_eq!(body["value"][0]["section"], "Introduction");
    }

    #[test]
    fn test_search_hit_parsing() {
        let body = r#"{"value": [{"@search.score": 0.033, "id": "q3_p2_c1", "content": "Net income",
            "document_name": "q3", "page_number": 2, "chunk_index": 1, "chunk_type": "text",
            "section": "INCOME STATEMENT"}]}"#;
        let parsed: SearchResponse = serde_json::from_str(body).unwrap();
        let result = hit_to_result(parsed.value.into_iter().next().unwrap());
        assert_eq!(result.chunk_id, "q3_p2_c1");
        assert_eq!(result.page_number, 2);
        assert!((result.score - 0.033).abs() < 1e-9);
    }

    #[test]
    fn test_service_errors() {
        let err = service_error(StatusCode::NOT_FOUND, "financial-docs", "");
        assert!(err.to_string().contains("not found"));

        let err = service_error(
            StatusCode::BAD_REQUEST,
            "financial-docs",
            r#"{"error": {"message": "Invalid filter"}}"#,
        );
        assert!(err.to_string().contains("Invalid filter"));
    }
}
