//! LLM provider factory.
//!
//! This module creates LLM clients from a provider name or from the
//! application configuration, resolving endpoints and secrets.

use crate::client::LlmClient;
use crate::providers::{azure_openai::DEFAULT_API_VERSION, AzureOpenAiClient, OllamaClient};
use crate::types::ProviderType;
use finagent_core::{AppConfig, AppError, AppResult};
use std::sync::Arc;

/// Create an LLM client based on the provider name.
///
/// # Arguments
/// * `provider` - Provider identifier ("azure-openai", "ollama")
/// * `endpoint` - Endpoint URL (required for Azure OpenAI)
/// * `api_key` - API key (required for Azure OpenAI)
/// * `api_version` - Azure OpenAI API version
///
/// # Errors
/// Returns error if the provider is unknown or required settings are missing.
pub fn create_client(
    provider: &str,
    endpoint: Option<&str>,
    api_key: Option<&str>,
    api_version: Option<&str>,
) -> Result<Arc<dyn LlmClient>, String> {
    match ProviderType::parse(provider) {
        Some(ProviderType::Ollama) => {
            let base_url = endpoint.unwrap_or("http://localhost:11434");
            Ok(Arc::new(OllamaClient::with_base_url(base_url)))
        }
        Some(ProviderType::AzureOpenAi) => {
            let endpoint = endpoint
                .ok_or_else(|| "Azure OpenAI provider requires an endpoint".to_string())?;
            let api_key =
                api_key.ok_or_else(|| "Azure OpenAI provider requires API key".to_string())?;
            Ok(Arc::new(AzureOpenAiClient::new(
                endpoint,
                api_key,
                api_version.unwrap_or(DEFAULT_API_VERSION),
            )))
        }
        None => Err(format!("Unknown provider: {}", provider)),
    }
}

/// Create the chat client for the configured provider.
pub fn create_client_from_config(config: &AppConfig) -> AppResult<Arc<dyn LlmClient>> {
    let (endpoint, api_key) = match ProviderType::parse(&config.provider) {
        Some(ProviderType::Ollama) => (Some(config.ollama.endpoint.as_str()), None),
        _ => (
            config.azure.endpoint.as_deref(),
            config.azure.api_key.as_deref(),
        ),
    };

    create_client(
        &config.provider,
        endpoint,
        api_key,
        Some(config.azure.api_version.as_str()),
    )
    .map_err(AppError::Config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_ollama_client() {
        let client = create_client("ollama", None, None, None).unwrap();
        assert_eq!(client.provider_name(), "ollama");
    }

    #[test]
    fn test_create_azure_client() {
        let client = create_client(
            "azure-openai",
            Some("https://res.openai.azure.com"),
            Some("key"),
            None,
        )
        .unwrap();
        assert_eq!(client.provider_name(), "azure-openai");
    }

    #[test]
    fn test_azure_requires_api_key() {
        match create_client("azure-openai", Some("https://res.openai.azure.com"), None, None) {
            Err(err) => assert!(err.contains("requires API key")),
            Ok(_) => panic!("Expected error for Azure without API key"),
        }
    }

    #[test]
    fn test_unknown_provider() {
        match create_client("unknown", None, None, None) {
            Err(err) => assert!(err.contains("Unknown provider")),
            Ok(_) => panic!("Expected error for unknown provider"),
        }
    }

    #[test]
    fn test_from_config_uses_ollama_endpoint() {
        let mut config = AppConfig::default();
        config.provider = "ollama".to_string();
        let client = create_client_from_config(&config).unwrap();
        assert_eq!(client.provider_name(), "ollama");
    }
}
