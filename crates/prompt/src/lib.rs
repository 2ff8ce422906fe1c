//! Prompt system for finagent.
//!
//! This crate provides structured prompt management with:
//! - YAML-based prompt definitions, compiled in and overridable per workspace
//! - Handlebars template rendering

pub mod builder;
pub mod loader;
pub mod types;

// Re-export main types
pub use builder::{build_prompt, render_template};
pub use loader::{list_prompts, load_builtin, load_prompt};
pub use types::{BuiltPrompt, BuiltPromptMetadata, PromptDefinition};
