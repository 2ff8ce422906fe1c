//! Ask command handler.
//!
//! Runs one agent turn: routing, retrieval, optional vision, tool calls and
//! the cited answer.

use super::{print_json, print_sources};
use clap::Args;
use finagent_agent::FinancialAgent;
use finagent_core::{config::AppConfig, AppError, AppResult};
use std::path::PathBuf;

/// Ask the agent one question
#[derive(Args, Debug)]
pub struct AskCommand {
    /// The question to ask
    pub question: Option<String>,

    /// Read the question from a file
    #[arg(short, long, conflicts_with = "question")]
    pub file: Option<PathBuf>,

    /// Chart or table image to analyze with the question
    #[arg(long)]
    pub image: Option<PathBuf>,

    /// Output the response as JSON
    #[arg(long)]
    pub json: bool,

    /// Print the execution trace after the answer
    #[arg(long)]
    pub trace: bool,
}

impl AskCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing ask command");
        tracing::debug!("Ask command options: {:?}", self);

        let question = self.get_question()?;
        config.validate()?;

        let mut agent = FinancialAgent::from_config(config)?;
        let response = agent.process_query(&question, self.image.as_deref()).await?;

        tracing::debug!(
            "Workflow: {:?}, {} tool calls, {} citations",
            response.workflow,
            response.tool_calls.len(),
            response.citations.len()
        );

        if self.json {
            if self.trace {
                print_json(&serde_json::json!({
                    "response": response,
                    "trace": agent.execution_trace(),
                }))?;
            } else {
                print_json(&response)?;
            }
            return Ok(());
        }

        println!("{}", response.response);
        print_sources(&response.citations);

        if self.trace {
            println!("\nExecution trace:");
            print_json(&agent.execution_trace())?;
        }

        Ok(())
    }

    fn get_question(&self) -> AppResult<String> {
        if let Some(ref question) = self.question {
            return Ok(question.clone());
        }
        match self.file {
            Some(ref path) => std::fs::read_to_string(path)
                .map(|s| s.trim().to_string())
                .map_err(|e| AppError::Config(format!("Failed to read question file: {}", e))),
            None => Err(AppError::Config("No question provided".to_string())),
        }
    }
}
