//! `compare_financial_periods`: one metric, two periods, side by side.

use super::calculator::{parse_number, FinancialCalculator};
use super::retrieval::RetrievalTool;
use super::vision::VisionAnalyzer;
use super::{tool_error, Tool};
use finagent_core::AppResult;
use finagent_knowledge::Citation;
use serde_json::{json, Value};
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::{Arc, RwLock};

/// Concatenate citation lists, dropping repeats of the same document page
/// and section, and number the result from 1.
pub fn merge_citations(citations: impl IntoIterator<Item = Citation>) -> Vec<Citation> {
    let mut seen = HashSet::new();
    citations
        .into_iter()
        .filter(|c| seen.insert((c.document.clone(), c.page, c.section.clone())))
        .enumerate()
        .map(|(i, mut c)| {
            c.id = i + 1;
            c
        })
        .collect()
}

/// Images the user attached to the current query. Model-supplied
/// `image_paths` are only read when they appear here.
#[derive(Debug, Clone, Default)]
pub struct UserImages(Arc<RwLock<Vec<PathBuf>>>);

impl UserImages {
    pub fn set(&self, paths: Vec<PathBuf>) {
        *self.0.write().unwrap_or_else(|e| e.into_inner()) = paths;
    }

    pub fn clear(&self) {
        self.set(Vec::new());
    }

    pub fn allows(&self, path: &PathBuf) -> bool {
        self.0
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .contains(path)
    }
}

pub struct ComparisonTool {
    retrieval: RetrievalTool,
    calculator: FinancialCalculator,
    vision: Arc<VisionAnalyzer>,
    user_images: UserImages,
}

impl ComparisonTool {
    pub fn new(
        retrieval: RetrievalTool,
        vision: Arc<VisionAnalyzer>,
        user_images: UserImages,
    ) -> Self {
        Self {
            retrieval,
            calculator: FinancialCalculator::new(),
            vision,
            user_images,
        }
    }
}

#[async_trait::async_trait]
impl Tool for ComparisonTool {
    fn name(&self) -> &str {
        "compare_financial_periods"
    }

    fn description(&self) -> &str {
        "Retrieve a financial metric for two periods side by side. When both values are \
         supplied the growth from period_a to period_b is computed. Optional image_paths, \
         limited to images the user attached, are compared with vision analysis."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "metric": {"type": "string", "description": "Metric to compare, e.g. total revenue"},
                "period_a": {"type": "string", "description": "Earlier period, e.g. Q3 2024"},
                "period_b": {"type": "string", "description": "Later period, e.g. Q4 2024"},
                "value_a": {"type": "number", "description": "Metric value in period_a"},
                "value_b": {"type": "number", "description": "Metric value in period_b"},
                "image_paths": {
                    "type": "array",
                    "items": {"type": "string"},
                    "description": "Charts to compare",
                },
            },
            "required": ["metric", "period_a", "period_b"],
        })
    }

    async fn execute(&self, args: Value) -> AppResult<Value> {
        let field = |name: &str| args.get(name).and_then(Value::as_str).map(str::trim);
        let (metric, period_a, period_b) =
            match (field("metric"), field("period_a"), field("period_b")) {
                (Some(m), Some(a), Some(b)) if !m.is_empty() => (m, a, b),
                _ => {
                    return Ok(tool_error(
                        "compare_financial_periods requires metric, period_a and period_b",
                    ))
                }
            };

        let first = self
            .retrieval
            .search(&format!("{} {}", metric, period_a), None, None, true)
            .await;
        let second = self
            .retrieval
            .search(&format!("{} {}", metric, period_b), None, None, true)
            .await;

        let mut output = json!({
            "metric": metric,
            "period_a": {
                "period": period_a,
                "context": first.context,
                "num_results": first.num_results,
            },
            "period_b": {
                "period": period_b,
                "context": second.context,
                "num_results": second.num_results,
            },
            "citations": merge_citations(first.citations.into_iter().chain(second.citations)),
            "success": true,
        });

        let value_a = args.get("value_a").and_then(parse_number);
        let value_b = args.get("value_b").and_then(parse_number);
        if let (Some(a), Some(b)) = (value_a, value_b) {
            let change = self.calculator.calculate(
                "growth_rate",
                &json!({"current_value": b, "previous_value": a}),
            );
            output["change"] = change.to_json();
        }

        let (image_paths, refused): (Vec<PathBuf>, Vec<PathBuf>) = args
            .get("image_paths")
            .and_then(Value::as_array)
            .map(|paths| {
                paths
                    .iter()
                    .filter_map(Value::as_str)
                    .map(PathBuf::from)
                    .partition(|p| self.user_images.allows(p))
            })
            .unwrap_or_default();
        if !refused.is_empty() {
            tracing::warn!(count = refused.len(), "Refusing images the user did not attach");
            output["refused_image_paths"] = json!(refused
                .iter()
                .map(|p| p.display().to_string())
                .collect::<Vec<_>>());
        }
        if !image_paths.is_empty() {
            let query = format!("{}: {} vs {}", metric, period_a, period_b);
            output["image_comparison"] = self
                .vision
                .analyze_multiple_images(&image_paths, Some(&query))
                .await;
        }

        Ok(output)
    }
}
