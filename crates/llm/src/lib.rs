//! LLM integration crate for finagent.
//!
//! This crate provides a provider-agnostic abstraction for chat completion
//! with tool calling and image inputs.
//!
//! # Providers
//! - **Azure OpenAI**: chat completions deployments (default)
//! - **Ollama**: local LLM runtime
//! - **Scripted**: deterministic replay for offline runs
//!
//! # Example
//! ```no_run
//! use finagent_llm::{LlmClient, LlmRequest, providers::OllamaClient};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = OllamaClient::new();
//! let request = LlmRequest::new("What is EBITDA?", "llama3.2");
//! let response = client.complete(&request).await?;
//! println!("{}", response.content);
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod factory;
pub mod providers;
pub mod types;

// Re-export main types
pub use client::{LlmClient, LlmRequest, LlmResponse, LlmUsage};
pub use factory::{create_client, create_client_from_config};
pub use providers::{AzureOpenAiClient, OllamaClient, ScriptedClient};
pub use types::{ChatMessage, ProviderType, Role, ToolCall, ToolSpec};
