//! LLM provider implementations.

pub mod azure_openai;
pub mod ollama;
pub mod scripted;

pub use azure_openai::AzureOpenAiClient;
pub use ollama::OllamaClient;
pub use scripted::ScriptedClient;
