//! Index command handler.

use super::print_json;
use clap::{Args, Subcommand};
use finagent_core::{config::AppConfig, AppError, AppResult};
use finagent_knowledge::{create_search_index, SearchIndex};
use std::sync::Arc;

/// Search index maintenance
#[derive(Args, Debug)]
pub struct IndexCommand {
    #[command(subcommand)]
    pub action: IndexAction,
}

#[derive(Subcommand, Debug)]
pub enum IndexAction {
    /// Show index statistics
    Stats {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Remove every indexed chunk
    Reset,
}

impl IndexCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        let index = open_index(config)?;

        match self.action {
            IndexAction::Stats { json } => {
                tracing::info!("Executing index stats for '{}'", index.index_name());
                let stats = index.stats().await?;
                if json {
                    print_json(&stats)?;
                } else {
                    println!("Backend:   {}", stats.backend);
                    println!("Index:     {}", stats.index_name);
                    println!("Documents: {}", stats.documents);
                    println!("Chunks:    {}", stats.chunks);
                    if let Some(bytes) = stats.storage_bytes {
                        println!("Storage:   {} bytes", bytes);
                    }
                }
            }
            IndexAction::Reset => {
                tracing::info!("Executing index reset for '{}'", index.index_name());
                index.reset().await?;
                println!("Index '{}' reset", index.index_name());
            }
        }

        Ok(())
    }
}

fn open_index(config: &AppConfig) -> AppResult<Arc<dyn SearchIndex>> {
    create_search_index(config)?
        .ok_or_else(|| AppError::Search("Search client not initialized".to_string()))
}
