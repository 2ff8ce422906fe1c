//! Search command handler.
//!
//! Retrieval only: hybrid search plus optional rerank, no model call.

use super::{print_json, print_sources};
use clap::Args;
use finagent_agent::RetrievalTool;
use finagent_core::{config::AppConfig, AppResult};
use finagent_knowledge::{create_retriever, SearchFilters};
use std::sync::Arc;

/// Search the index without calling the model
#[derive(Args, Debug)]
pub struct SearchCommand {
    /// Search query
    pub query: String,

    /// Number of results
    #[arg(short = 'k', long)]
    pub top_k: Option<usize>,

    /// Field filter as key=value (repeatable; comma-separated values match any)
    #[arg(long = "filter")]
    pub filters: Vec<String>,

    /// Skip lexical reranking
    #[arg(long)]
    pub no_rerank: bool,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl SearchCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing search command");

        let mut filters = SearchFilters::new();
        for assignment in &self.filters {
            filters.parse_assignment(assignment)?;
        }
        let filters = (!filters.is_empty()).then_some(filters);

        let tool = RetrievalTool::new(Arc::new(create_retriever(config)?));
        let output = tool
            .search(&self.query, self.top_k, filters.as_ref(), !self.no_rerank)
            .await;

        if self.json {
            return print_json(&output);
        }

        if output.num_results == 0 {
            println!("No results found.");
            return Ok(());
        }

        println!("{}", output.context);
        print_sources(&output.citations);
        Ok(())
    }
}
