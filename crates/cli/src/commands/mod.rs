//! Command handlers for the Finagent CLI.
//!
//! Each subcommand lives in its own submodule.

pub mod ask;
pub mod calc;
pub mod chat;
pub mod doctor;
pub mod eval;
pub mod golden;
pub mod index;
pub mod ingest;
pub mod search;

pub use ask::AskCommand;
pub use calc::CalcCommand;
pub use chat::ChatCommand;
pub use doctor::DoctorCommand;
pub use eval::EvalCommand;
pub use golden::GoldenSetCommand;
pub use index::IndexCommand;
pub use ingest::IngestCommand;
pub use search::SearchCommand;

use finagent_core::AppResult;
use finagent_knowledge::Citation;
use serde::Serialize;

/// Source lines as `- <doc>, Page <n> (<section>)`.
pub(crate) fn format_sources(citations: &[Citation]) -> Vec<String> {
    citations
        .iter()
        .map(|c| format!("- {}, Page {} ({})", c.document, c.page, c.section))
        .collect()
}

pub(crate) fn print_sources(citations: &[Citation]) {
    if citations.is_empty() {
        return;
    }
    println!("\nSources:");
    for line in format_sources(citations) {
        println!("{}", line);
    }
}

pub(crate) fn print_json<T: Serialize>(value: &T) -> AppResult<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
