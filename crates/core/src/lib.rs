//! Finagent Core Library
//!
//! This crate provides the foundational utilities shared by every finagent crate:
//! - Error handling (`AppError`, `AppResult`)
//! - Logging infrastructure and optional OpenTelemetry export
//! - Configuration management (`.env`, `.finagent/config.yaml`, environment, CLI)

pub mod config;
pub mod error;
pub mod logging;
pub mod telemetry;

// Re-export commonly used types
pub use config::AppConfig;
pub use error::{AppError, AppResult};
