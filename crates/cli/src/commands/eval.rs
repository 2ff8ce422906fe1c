//! Eval command handler.

use clap::Args;
use finagent_agent::FinancialAgent;
use finagent_core::{config::AppConfig, AppError, AppResult};
use finagent_eval::{load_golden_set, AgentEvaluator};
use std::path::PathBuf;

/// Evaluate the agent against a golden set
#[derive(Args, Debug)]
pub struct EvalCommand {
    /// Golden set JSON (default: .finagent/eval/golden_set.json)
    #[arg(short, long)]
    pub golden: Option<PathBuf>,

    /// Where to save the results (default: .finagent/eval/results/eval_<timestamp>.json)
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

impl EvalCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        let golden = self
            .golden
            .clone()
            .unwrap_or_else(|| config.eval_dir().join("golden_set.json"));
        tracing::info!("Executing eval command with {:?}", golden);

        let questions = load_golden_set(&golden)?;
        if questions.is_empty() {
            return Err(AppError::Evaluation(format!(
                "Golden set {:?} has no questions",
                golden
            )));
        }

        config.validate()?;
        let mut agent = FinancialAgent::from_config(config)?;
        let report = AgentEvaluator::new(&mut agent).run(&questions).await;

        let output = self.output.clone().unwrap_or_else(|| {
            config.eval_dir().join("results").join(format!(
                "eval_{}.json",
                report.timestamp.format("%Y%m%d_%H%M%S")
            ))
        });
        report.save_report(&output)?;

        println!("{}", report.format_summary());
        println!("Results saved to {}", output.display());
        Ok(())
    }
}
