//! Aggregate metrics and the saved evaluation report.

use crate::scoring::{round2, EvaluationRecord};
use chrono::{DateTime, Utc};
use finagent_core::AppResult;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::Path;

const METRIC_NAMES: [&str; 7] = [
    "keyword_match",
    "answer_match",
    "citation_quality",
    "tool_retrieval",
    "tool_calculator",
    "tool_vision",
    "response_completeness",
];

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AggregateMetrics {
    pub success_rate: f64,
    pub average_score: f64,
    /// Mean of each metric over the questions it applied to
    pub individual_metrics: BTreeMap<String, f64>,
    pub citation_rate: f64,
    pub avg_tools_per_query: f64,
    pub category_performance: BTreeMap<String, f64>,
    pub total_successful: usize,
    pub total_failed: usize,
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        round2(values.iter().sum::<f64>() / values.len() as f64)
    }
}

/// Summarize a run. Averages cover every record; a failed question
/// contributes its zero score and no citations or tool calls.
pub fn aggregate(records: &[EvaluationRecord]) -> AggregateMetrics {
    if records.is_empty() {
        return AggregateMetrics::default();
    }

    let total = records.len() as f64;
    let total_successful = records.iter().filter(|r| r.success).count();

    let mut individual_metrics = BTreeMap::new();
    for name in METRIC_NAMES {
        let values: Vec<f64> = records
            .iter()
            .filter_map(|r| r.scores.get(name).copied())
            .collect();
        if !values.is_empty() {
            individual_metrics.insert(name.to_string(), mean(&values));
        }
    }

    let mut by_category: BTreeMap<String, Vec<f64>> = BTreeMap::new();
    for record in records {
        by_category
            .entry(record.category.clone())
            .or_default()
            .push(record.overall_score);
    }

    let scores: Vec<f64> = records.iter().map(|r| r.overall_score).collect();
    let cited = records.iter().filter(|r| r.num_citations > 0).count();
    let tools: usize = records.iter().map(|r| r.num_tool_calls).sum();

    AggregateMetrics {
        success_rate: round2(total_successful as f64 / total),
        average_score: mean(&scores),
        individual_metrics,
        citation_rate: round2(cited as f64 / total),
        avg_tools_per_query: round2(tools as f64 / total),
        category_performance: by_category
            .into_iter()
            .map(|(category, values)| (category, mean(&values)))
            .collect(),
        total_successful,
        total_failed: records.len() - total_successful,
    }
}

fn title_case(name: &str) -> String {
    name.split('_')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationReport {
    pub timestamp: DateTime<Utc>,
    pub total_questions: usize,
    pub results: Vec<EvaluationRecord>,
    pub aggregate_metrics: AggregateMetrics,
}

impl EvaluationReport {
    pub fn new(results: Vec<EvaluationRecord>) -> Self {
        Self {
            timestamp: Utc::now(),
            total_questions: results.len(),
            aggregate_metrics: aggregate(&results),
            results,
        }
    }

    pub fn save_report(&self, path: &Path) -> AppResult<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        tracing::info!("Evaluation report saved to {:?}", path);
        Ok(())
    }

    /// Plain-text summary for the terminal.
    pub fn format_summary(&self) -> String {
        let metrics = &self.aggregate_metrics;
        let rule = "=".repeat(70);
        let mut out = String::new();

        let _ = writeln!(out, "\n{}", rule);
        let _ = writeln!(out, "FINANCIAL AGENT EVALUATION SUMMARY");
        let _ = writeln!(out, "{}\n", rule);
        let _ = writeln!(out, "Total Questions:     {}", self.total_questions);
        let _ = writeln!(out, "Successful:          {}", metrics.total_successful);
        let _ = writeln!(out, "Failed:              {}", metrics.total_failed);
        let _ = writeln!(out, "Success Rate:        {:.1}%", metrics.success_rate * 100.0);
        let _ = writeln!(out, "Average Score:       {:.2}/1.0", metrics.average_score);
        let _ = writeln!(out, "Citation Rate:       {:.1}%", metrics.citation_rate * 100.0);
        let _ = writeln!(out, "Avg Tools/Query:     {:.1}", metrics.avg_tools_per_query);

        let _ = writeln!(out, "\nCustom Evaluation Metrics:");
        if metrics.individual_metrics.is_empty() {
            let _ = writeln!(out, "  No detailed metrics available");
        } else {
            for (name, score) in &metrics.individual_metrics {
                let _ = writeln!(out, "  {:<30}: {:.2}/1.0", title_case(name), score);
            }
        }

        if !metrics.category_performance.is_empty() {
            let _ = writeln!(out, "\nCategory Performance:");
            for (category, score) in &metrics.category_performance {
                let _ = writeln!(out, "  {:<20}: {:.2}/1.0", category, score);
            }
        }

        let _ = write!(out, "\n{}", rule);
        out
    }
}
