//! Embedding provider implementations.

pub mod azure_openai;
pub mod hash;
pub mod ollama;

pub use azure_openai::AzureOpenAiEmbeddings;
pub use hash::HashEmbeddings;
pub use ollama::OllamaEmbeddings;
