//! Golden set model and the template question generator.

use finagent_core::{AppError, AppResult};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};

/// A question with what a good answer should contain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GoldenQuestion {
    #[serde(default)]
    pub id: u32,
    pub category: String,
    pub question: String,
    /// Guidance for whoever curates the set
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub expected_keywords: Vec<String>,
    #[serde(
        default,
        deserialize_with = "string_or_number",
        skip_serializing_if = "Option::is_none"
    )]
    pub expected_answer: Option<String>,
    #[serde(default)]
    pub requires_retrieval: bool,
    #[serde(default)]
    pub requires_calculation: bool,
    #[serde(default)]
    pub requires_vision: bool,
    /// Image sent along with the question
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_path: Option<PathBuf>,
}

impl GoldenQuestion {
    fn template(category: &str, question: &str, instructions: &str) -> Self {
        Self {
            id: 0,
            category: category.to_string(),
            question: question.to_string(),
            instructions: Some(instructions.to_string()),
            expected_keywords: Vec::new(),
            expected_answer: None,
            requires_retrieval: false,
            requires_calculation: false,
            requires_vision: false,
            image_path: None,
        }
    }

    fn retrieval(mut self) -> Self {
        self.requires_retrieval = true;
        self
    }

    fn calculation(mut self) -> Self {
        self.requires_calculation = true;
        self
    }

    fn vision(mut self) -> Self {
        self.requires_vision = true;
        self
    }

    fn answer(mut self, expected: &str) -> Self {
        self.expected_answer = Some(expected.to_string());
        self
    }

    /// Open questions need a curator to fill in expectations.
    pub fn is_open(&self) -> bool {
        self.expected_answer.is_none()
    }
}

/// Expected answers may be written as JSON numbers (`1.5`).
fn string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::String(s)) if !s.is_empty() => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

/// The ten starting questions, numbered from 1.
pub fn template_questions() -> Vec<GoldenQuestion> {
    let questions = vec![
        GoldenQuestion::template(
            "factual_retrieval",
            "What was the total revenue for [YOUR ACTUAL QUARTER/YEAR]?",
            "Replace with actual quarter from your documents. After getting the answer, add it to 'expected_answer' or 'expected_keywords'",
        )
        .retrieval(),
        GoldenQuestion::template(
            "calculation",
            "Calculate the profit margin if net income was $50 million and revenue was $200 million.",
            "This is a pure calculation - answer should always be 25%",
        )
        .calculation()
        .answer("25%"),
        GoldenQuestion::template(
            "factual_retrieval",
            "What were the main risk factors mentioned?",
            "After running against your docs, list the actual risk factors as expected_keywords",
        )
        .retrieval(),
        GoldenQuestion::template(
            "comparison",
            "Compare revenue between [PERIOD 1] and [PERIOD 2]",
            "Replace with actual periods from your documents",
        )
        .retrieval()
        .calculation(),
        GoldenQuestion::template(
            "factual_retrieval",
            "What were the operating expenses?",
            "After running, add the actual value to expected_keywords",
        )
        .retrieval(),
        GoldenQuestion::template(
            "calculation",
            "What is the current ratio if current assets are $150M and current liabilities are $100M?",
            "Pure calculation - answer is always 1.5",
        )
        .calculation()
        .answer("1.5"),
        GoldenQuestion::template(
            "factual_retrieval",
            "Which business segments contributed most to revenue?",
            "Add actual segment names from your docs to expected_keywords",
        )
        .retrieval(),
        GoldenQuestion::template(
            "calculation",
            "What is the growth rate from $180M to $220M?",
            "Pure calculation",
        )
        .calculation()
        .answer("22.22%"),
        GoldenQuestion::template(
            "summarization",
            "Summarize the key financial highlights",
            "After running, add key terms that should appear in the summary",
        )
        .retrieval(),
        GoldenQuestion::template(
            "vision",
            "What trends are shown in this revenue chart?",
            "Upload a chart from data/images/ and document the expected trend description",
        )
        .vision(),
    ];

    questions
        .into_iter()
        .enumerate()
        .map(|(i, mut q)| {
            q.id = i as u32 + 1;
            q
        })
        .collect()
}

pub fn load_golden_set(path: &Path) -> AppResult<Vec<GoldenQuestion>> {
    let contents = std::fs::read_to_string(path).map_err(|e| {
        AppError::Evaluation(format!("Failed to read golden set {:?}: {}", path, e))
    })?;
    serde_json::from_str(&contents)
        .map_err(|e| AppError::Evaluation(format!("Invalid golden set {:?}: {}", path, e)))
}

pub fn save_golden_set(path: &Path, questions: &[GoldenQuestion]) -> AppResult<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, serde_json::to_string_pretty(questions)?)?;
    tracing::info!("Golden set saved to {:?} ({} questions)", path, questions.len());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_template_questions() {
        let questions = template_questions();
        assert_eq!(questions.len(), 10);
        assert_eq!(questions[0].id, 1);
        assert_eq!(questions[9].id, 10);

        let answers: Vec<&str> = questions
            .iter()
            .filter_map(|q| q.expected_answer.as_deref())
            .collect();
        assert_eq!(answers, vec!["25%", "1.5", "22.22%"]);
        assert!(questions[9].requires_vision);
        assert!(questions[3].requires_retrieval && questions[3].requires_calculation);
        assert_eq!(questions.iter().filter(|q| q.is_open()).count(), 7);
    }

    #[test]
    fn test_load_accepts_numeric_answers() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("golden_set.json");
        std::fs::write(
            &path,
            r#"[{"id": 6, "category": "calculation", "question": "Current ratio?", "expected_answer": 1.5, "requires_calculation": true}]"#,
        )
        .unwrap();

        let questions = load_golden_set(&path).unwrap();
        assert_eq!(questions[0].expected_answer.as_deref(), Some("1.5"));
        assert!(!questions[0].requires_retrieval);
        assert!(questions[0].expected_keywords.is_empty());
    }

    #[test]
    fn test_save_then_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("eval").join("golden_set.json");

        save_golden_set(&path, &template_questions()).unwrap();
        assert_eq!(load_golden_set(&path).unwrap(), template_questions());
    }

    #[test]
    fn test_load_missing_file() {
        let err = load_golden_set(Path::new("/nonexistent/golden.json")).unwrap_err();
        assert!(matches!(err, AppError::Evaluation(_)));
    }
}
