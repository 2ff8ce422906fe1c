//! Embedding generation for chunks and queries.
//!
//! One provider embeds chunks at ingestion time and queries at retrieval
//! time, so both live in the same vector space.

pub mod config;
pub mod provider;
pub mod providers;
mod retry;

pub use config::EmbeddingConfig;
pub use provider::{create_provider, EmbeddingProvider};
