//! Azure OpenAI embedding provider.
//!
//! Calls `POST {endpoint}/openai/deployments/{deployment}/embeddings` with
//! batched inputs and the `api-key` header.

use crate::embeddings::config::EmbeddingConfig;
use crate::embeddings::provider::EmbeddingProvider;
use crate::embeddings::retry::{with_retries, MAX_RETRIES};
use finagent_core::{AppError, AppResult};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, instrument};

/// Request timeout in seconds
const REQUEST_TIMEOUT_SECS: u64 = 60;

const DEFAULT_API_VERSION: &str = "2024-02-15-preview";

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    input: &'a [String],
    dimensions: usize,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    #[serde(default)]
    index: usize,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

/// Azure OpenAI embeddings client.
#[derive(Debug, Clone)]
pub struct AzureOpenAiEmbeddings {
    client: Client,
    endpoint: String,
    api_key: String,
    api_version: String,
    deployment: String,
    dimensions: usize,
    batch_size: usize,
}

impl AzureOpenAiEmbeddings {
    pub fn new(
        endpoint: impl Into<String>,
        api_key: impl Into<String>,
        config: &EmbeddingConfig,
    ) -> AppResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| AppError::Llm(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            api_version: config
                .api_version
                .clone()
                .unwrap_or_else(|| DEFAULT_API_VERSION.to_string()),
            deployment: config.model.clone(),
            dimensions: config.dimensions,
            batch_size: config.batch_size.max(1),
        })
    }

    fn url(&self) -> String {
        format!(
            "{}/openai/deployments/{}/embeddings?api-version={}",
            self.endpoint, self.deployment, self.api_version
        )
    }

    #[instrument(skip(self, inputs), fields(batch_size = inputs.len(), deployment = %self.deployment))]
    async fn request_batch(&self, inputs: &[String]) -> AppResult<Vec<Vec<f32>>> {
        let body = EmbeddingRequest {
            input: inputs,
            dimensions: self.dimensions,
        };

        let response = self
            .client
            .post(self.url())
            .header("api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::Llm(format!("Failed to send embedding request: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            let message = serde_json::from_str::<ErrorEnvelope>(&error_text)
                .map(|envelope| envelope.error.message)
                .unwrap_or(error_text);
            return Err(AppError::Llm(format!(
                "Azure OpenAI embeddings error ({}): {}",
                status, message
            )));
        }

        let parsed: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| AppError::Llm(format!("Failed to parse embedding response: {}", e)))?;

        collect_embeddings(parsed, inputs.len(), self.dimensions)
    }
}

/// Order embeddings by their input index and check the shape.
fn collect_embeddings(
    response: EmbeddingResponse,
    expected: usize,
    dimensions: usize,
) -> AppResult<Vec<Vec<f32>>> {
    let mut data = response.data;
    if data.len() != expected {
        return Err(AppError::Llm(format!(
            "Expected {} embeddings, got {}",
            expected,
            data.len()
        )));
    }
    data.sort_by_key(|item| item.index);

    let mut embeddings = Vec::with_capacity(data.len());
    for item in data {
        if item.embedding.len() != dimensions {
            return Err(AppError::Llm(format!(
                "Unexpected embedding dimensions: got {}, expected {}",
                item.embedding.len(),
                dimensions
            )));
        }
        embeddings.push(item.embedding);
    }
    Ok(embeddings)
}

#[async_trait::async_trait]
impl EmbeddingProvider for AzureOpenAiEmbeddings {
    fn provider_name(&self) -> &str {
        "azure-openai"
    }

    fn model_name(&self) -> &str {
        &self.deployment
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    #[instrument(skip(self, texts), fields(count = texts.len(), provider = "azure-openai"))]
    async fn embed_batch(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>> {
        let mut embeddings = vec![vec![0.0; self.dimensions]; texts.len()];

        // The service rejects empty inputs; those keep a zero vector
        let non_empty: Vec<(usize, String)> = texts
            .iter()
            .enumerate()
            .filter(|(_, text)| !text.trim().is_empty())
            .map(|(i, text)| (i, text.clone()))
            .collect();

        for batch in non_empty.chunks(self.batch_size) {
            let inputs: Vec<String> = batch.iter().map(|(_, text)| text.clone()).collect();
            let vectors = with_retries(MAX_RETRIES, || self.request_batch(&inputs)).await?;

            for ((i, _), vector) in batch.iter().zip(vectors) {
                embeddings[*i] = vector;
            }
            debug!("Embedded batch of {} texts", batch.len());
        }

        Ok(embeddings)
    }
}
