//! Ingest command handler.

use super::print_json;
use clap::Args;
use finagent_core::{config::AppConfig, AppError, AppResult};
use finagent_knowledge::{DocumentProcessor, ProgressEvent, ProgressReporter};
use std::path::PathBuf;
use std::sync::Arc;

/// Parse, chunk, embed and index a directory of documents
#[derive(Args, Debug)]
pub struct IngestCommand {
    /// Directory containing PDF, text or markdown reports
    #[arg(short, long, default_value = "data/sample_pdfs")]
    pub input: PathBuf,

    /// Clear the index before ingesting
    #[arg(long)]
    pub reset: bool,

    /// Output stats and progress as JSON
    #[arg(long)]
    pub json: bool,
}

impl IngestCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing ingest command for {:?}", self.input);

        let input = if self.input.is_absolute() {
            self.input.clone()
        } else {
            config.workspace.join(&self.input)
        };

        let json = self.json;
        let progress = ProgressReporter::new(Arc::new(move |event: ProgressEvent| {
            if json {
                if let Ok(line) = serde_json::to_string(&event) {
                    eprintln!("{}", line);
                }
            } else {
                eprintln!("{}", event.format_simple());
            }
        }));
        let processor = DocumentProcessor::from_config(config)?.with_progress(progress);

        if self.reset {
            let index = processor.index().ok_or_else(|| {
                AppError::Search("Search client not initialized".to_string())
            })?;
            index.reset().await?;
            tracing::info!("Index '{}' reset", index.index_name());
        }

        let stats = processor.process_directory(&input).await?;

        if self.json {
            print_json(&stats)?;
        } else {
            println!(
                "Ingested {} documents ({} failed): {} pages, {} chunks, {} indexed in {:.2}s",
                stats.documents,
                stats.failed,
                stats.pages,
                stats.chunks,
                stats.indexed,
                stats.duration_secs
            );
        }

        Ok(())
    }
}
