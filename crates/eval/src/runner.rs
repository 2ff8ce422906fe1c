//! Runs a golden set through the agent.

use crate::golden::GoldenQuestion;
use crate::report::EvaluationReport;
use crate::scoring::{evaluate_answer, EvaluationRecord};
use finagent_agent::FinancialAgent;

pub struct AgentEvaluator<'a> {
    agent: &'a mut FinancialAgent,
}

impl<'a> AgentEvaluator<'a> {
    pub fn new(agent: &'a mut FinancialAgent) -> Self {
        Self { agent }
    }

    /// Ask every question on a fresh conversation and score the answers.
    /// A failed query is recorded and the run continues.
    pub async fn run(&mut self, questions: &[GoldenQuestion]) -> EvaluationReport {
        let mut results = Vec::with_capacity(questions.len());

        for (i, question) in questions.iter().enumerate() {
            tracing::info!(
                "[{}/{}] Evaluating {} question {}",
                i + 1,
                questions.len(),
                question.category,
                question.id
            );
            self.agent.reset_conversation();

            let record = match self
                .agent
                .process_query(&question.question, question.image_path.as_deref())
                .await
            {
                Ok(response) => evaluate_answer(question, &response),
                Err(e) => {
                    tracing::warn!("Question {} failed: {}", question.id, e);
                    EvaluationRecord::failed(question, e.to_string())
                }
            };
            tracing::debug!(
                question_id = record.question_id,
                score = record.overall_score,
                "Question scored"
            );
            results.push(record);
        }

        let report = EvaluationReport::new(results);
        tracing::info!(
            success_rate = report.aggregate_metrics.success_rate,
            average_score = report.aggregate_metrics.average_score,
            "Evaluation complete"
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::golden::template_questions;
    use finagent_agent::AgentSettings;
    use finagent_knowledge::embeddings::providers::HashEmbeddings;
    use finagent_knowledge::HybridRetriever;
    use finagent_llm::{LlmClient, ScriptedClient};
    use std::sync::Arc;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_run_scores_and_records_failures() {
        let dir = TempDir::new().unwrap();
        let llm: Arc<dyn LlmClient> = Arc::new(
            ScriptedClient::new().push_text("The profit margin is 25% based on 50 / 200."),
        );
        let retriever = Arc::new(HybridRetriever::new(
            Arc::new(HashEmbeddings::new(16)),
            None,
            5,
        ));
        let settings = AgentSettings {
            chat_model: "gpt-4".to_string(),
            vision_model: "gpt-4o".to_string(),
            workspace: dir.path().to_path_buf(),
        };
        let mut agent = FinancialAgent::new(llm, retriever, settings).unwrap();

        let questions: Vec<GoldenQuestion> = template_questions()[1..3].to_vec();
        let report = AgentEvaluator::new(&mut agent).run(&questions).await;

        assert_eq!(report.total_questions, 2);
        let first = &report.results[0];
        assert!(first.success);
        assert_eq!(first.scores["answer_match"], 1.0);
        assert_eq!(first.scores["tool_calculator"], 0.0);
        assert_eq!(first.overall_score, 0.67);

        let second = &report.results[1];
        assert!(!second.success);
        assert!(second.error.is_some());
        assert_eq!(second.category, "factual_retrieval");

        assert_eq!(report.aggregate_metrics.success_rate, 0.5);
        assert_eq!(report.aggregate_metrics.total_failed, 1);
    }
}
