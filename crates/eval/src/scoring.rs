//! Per-answer scoring.

use crate::golden::GoldenQuestion;
use finagent_agent::AgentResponse;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::OnceLock;

/// Characters of the answer kept in a record.
const PREVIEW_CHARS: usize = 200;

/// Scores of one golden question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationRecord {
    pub question_id: u32,
    pub question: String,
    pub category: String,
    pub success: bool,
    #[serde(default)]
    pub has_response: bool,
    /// Only the metrics that apply to the question
    #[serde(default)]
    pub scores: BTreeMap<String, f64>,
    #[serde(default)]
    pub num_citations: usize,
    #[serde(default)]
    pub num_tool_calls: usize,
    pub overall_score: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_preview: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl EvaluationRecord {
    /// Record for a question the agent could not answer.
    pub fn failed(question: &GoldenQuestion, error: impl Into<String>) -> Self {
        Self {
            question_id: question.id,
            question: question.question.clone(),
            category: question.category.clone(),
            success: false,
            has_response: false,
            scores: BTreeMap::new(),
            num_citations: 0,
            num_tool_calls: 0,
            overall_score: 0.0,
            response_preview: None,
            error: Some(error.into()),
        }
    }
}

pub(crate) fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn numbers(text: &str) -> Vec<&str> {
    static NUMBER: OnceLock<Option<Regex>> = OnceLock::new();
    match NUMBER.get_or_init(|| Regex::new(r"\d+\.?\d*").ok()) {
        Some(re) => re.find_iter(text).map(|m| m.as_str()).collect(),
        None => Vec::new(),
    }
}

fn used_tool(response: &AgentResponse, needles: &[&str]) -> f64 {
    let used = response.tool_calls.iter().any(|call| {
        let name = call.tool.to_lowercase();
        needles.iter().any(|needle| name.contains(needle))
    });
    if used {
        1.0
    } else {
        0.0
    }
}

/// Score one agent response against its golden question.
pub fn evaluate_answer(question: &GoldenQuestion, response: &AgentResponse) -> EvaluationRecord {
    let answer = response.response.as_str();
    let answer_lower = answer.to_lowercase();
    let mut scores = BTreeMap::new();

    if !question.expected_keywords.is_empty() {
        let matched = question
            .expected_keywords
            .iter()
            .filter(|kw| answer_lower.contains(&kw.to_lowercase()))
            .count();
        scores.insert(
            "keyword_match".to_string(),
            round2(matched as f64 / question.expected_keywords.len() as f64),
        );
    }

    if let Some(expected) = question.expected_answer.as_deref() {
        let expected = expected.to_lowercase();
        let score = if answer_lower.contains(&expected) {
            1.0
        } else {
            let found = numbers(answer);
            if numbers(&expected).iter().any(|n| found.contains(n)) {
                0.5
            } else {
                0.0
            }
        };
        scores.insert("answer_match".to_string(), score);
    }

    if question.requires_retrieval {
        let cited = if response.citations.is_empty() { 0.0 } else { 1.0 };
        scores.insert("citation_quality".to_string(), cited);
        scores.insert("tool_retrieval".to_string(), used_tool(response, &["search"]));
    }
    if question.requires_calculation {
        scores.insert(
            "tool_calculator".to_string(),
            used_tool(response, &["calculate"]),
        );
    }
    if question.requires_vision {
        scores.insert(
            "tool_vision".to_string(),
            used_tool(response, &["vision", "image"]),
        );
    }

    let completeness = if answer.trim().chars().count() > 20 {
        1.0
    } else if !answer.is_empty() {
        0.5
    } else {
        0.0
    };
    scores.insert("response_completeness".to_string(), completeness);

    let overall_score = if scores.is_empty() {
        0.0
    } else {
        round2(scores.values().sum::<f64>() / scores.len() as f64)
    };

    EvaluationRecord {
        question_id: question.id,
        question: question.question.clone(),
        category: question.category.clone(),
        success: response.success,
        has_response: !answer.is_empty(),
        scores,
        num_citations: response.citations.len(),
        num_tool_calls: response.tool_calls.len(),
        overall_score,
        response_preview: Some(answer.chars().take(PREVIEW_CHARS).collect()),
        error: None,
    }
}
