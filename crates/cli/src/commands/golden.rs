//! Golden set command handler.
//!
//! Writes the template questions. With `--interactive`, every open question
//! is asked against the agent and the curator fills in the expectations.

use clap::Args;
use finagent_agent::FinancialAgent;
use finagent_core::{config::AppConfig, AppError, AppResult};
use finagent_eval::{save_golden_set, template_questions, GoldenQuestion};
use rustyline::DefaultEditor;
use std::path::PathBuf;

/// Write a golden set template
#[derive(Args, Debug)]
pub struct GoldenSetCommand {
    /// Output path (default: .finagent/eval/golden_set.json)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Ask open questions against the agent and record expectations
    #[arg(long)]
    pub interactive: bool,
}

/// Comma-separated keywords, blanks dropped.
fn parse_keywords(line: &str) -> Vec<String> {
    line.split(',')
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .map(str::to_string)
        .collect()
}

impl GoldenSetCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        let output = self
            .output
            .clone()
            .unwrap_or_else(|| config.eval_dir().join("golden_set.json"));
        tracing::info!("Executing golden-set command for {:?}", output);

        let mut questions = template_questions();
        if self.interactive {
            self.curate(config, &mut questions).await?;
        }

        save_golden_set(&output, &questions)?;
        println!(
            "Golden set with {} questions written to {}",
            questions.len(),
            output.display()
        );
        if !self.interactive {
            println!(
                "Edit the placeholder questions, then fill in expected_keywords and expected_answer."
            );
        }
        Ok(())
    }

    async fn curate(&self, config: &AppConfig, questions: &mut [GoldenQuestion]) -> AppResult<()> {
        config.validate()?;
        let mut agent = FinancialAgent::from_config(config)?;
        let mut editor = DefaultEditor::new()
            .map_err(|e| AppError::Other(format!("Failed to start line editor: {}", e)))?;
        let mut prompt = |label: &str| -> AppResult<String> {
            editor
                .readline(label)
                .map_err(|e| AppError::Other(format!("Input error: {}", e)))
        };

        for question in questions.iter_mut().filter(|q| q.is_open()) {
            println!("\n[{}] {} ({})", question.id, question.question, question.category);
            if let Some(ref instructions) = question.instructions {
                println!("    {}", instructions);
            }

            let edited = prompt("Question (enter to keep): ")?;
            if !edited.trim().is_empty() {
                question.question = edited.trim().to_string();
            }

            agent.reset_conversation();
            match agent
                .process_query(&question.question, question.image_path.as_deref())
                .await
            {
                Ok(response) => println!("\nAgent answer:\n{}\n", response.response),
                Err(e) => println!("\nAgent failed: {}\n", e),
            }

            let keywords = parse_keywords(&prompt("Expected keywords (comma-separated): ")?);
            if !keywords.is_empty() {
                question.expected_keywords = keywords;
            }
            let answer = prompt("Expected answer (enter to skip): ")?;
            if !answer.trim().is_empty() {
                question.expected_answer = Some(answer.trim().to_string());
            }
        }

        Ok(())
    }
}
