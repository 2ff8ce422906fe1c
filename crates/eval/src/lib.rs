//! Golden-set evaluation for the financial agent.
//!
//! A golden set is a JSON array of questions with expected keywords or
//! answers and the tools each question needs. Every answer is scored on
//! keyword and answer match, citations, tool usage and completeness, and
//! the scores are aggregated per metric and per category.

pub mod golden;
pub mod report;
pub mod runner;
pub mod scoring;

pub use golden::{load_golden_set, save_golden_set, template_questions, GoldenQuestion};
pub use report::{aggregate, AggregateMetrics, EvaluationReport};
pub use runner::AgentEvaluator;
pub use scoring::{evaluate_answer, EvaluationRecord};
