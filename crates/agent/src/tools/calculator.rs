//! Financial ratio and metric calculator.

use super::{tool_error, Tool};
use finagent_core::AppResult;
use serde::Serialize;
use serde_json::{json, Map, Value};

/// Supported calculations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    ProfitMargin,
    GrossMargin,
    OperatingMargin,
    Roe,
    Roa,
    CurrentRatio,
    DebtToEquity,
    PeRatio,
    GrowthRate,
    Eps,
}

impl Operation {
    pub const ALL: [Operation; 10] = [
        Self::ProfitMargin,
        Self::GrossMargin,
        Self::OperatingMargin,
        Self::Roe,
        Self::Roa,
        Self::CurrentRatio,
        Self::DebtToEquity,
        Self::PeRatio,
        Self::GrowthRate,
        Self::Eps,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ProfitMargin => "profit_margin",
            Self::GrossMargin => "gross_margin",
            Self::OperatingMargin => "operating_margin",
            Self::Roe => "roe",
            Self::Roa => "roa",
            Self::CurrentRatio => "current_ratio",
            Self::DebtToEquity => "debt_to_equity",
            Self::PeRatio => "pe_ratio",
            Self::GrowthRate => "growth_rate",
            Self::Eps => "eps",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|op| op.as_str() == s)
    }

    /// Numerator first, then denominator (previous value for growth).
    pub fn params(&self) -> [&'static str; 2] {
        match self {
            Self::ProfitMargin => ["net_income", "revenue"],
            Self::GrossMargin => ["gross_profit", "revenue"],
            Self::OperatingMargin => ["operating_income", "revenue"],
            Self::Roe => ["net_income", "shareholders_equity"],
            Self::Roa => ["net_income", "total_assets"],
            Self::CurrentRatio => ["current_assets", "current_liabilities"],
            Self::DebtToEquity => ["total_debt", "total_equity"],
            Self::PeRatio => ["stock_price", "earnings_per_share"],
            Self::GrowthRate => ["current_value", "previous_value"],
            Self::Eps => ["net_income", "shares_outstanding"],
        }
    }

    fn available() -> String {
        Self::ALL
            .iter()
            .map(Operation::as_str)
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// A successful calculation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Calculation {
    /// Rounded to 2 decimals
    pub value: f64,
    pub formatted: String,
    pub explanation: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interpretation: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CalculationOutcome {
    Success(Calculation),
    Failure(String),
}

impl CalculationOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    pub fn value(&self) -> Option<f64> {
        match self {
            Self::Success(calc) => Some(calc.value),
            Self::Failure(_) => None,
        }
    }

    /// The value handed back to the model.
    pub fn to_json(&self) -> Value {
        match self {
            Self::Success(calc) => {
                let mut value = json!({
                    "value": calc.value,
                    "formatted": calc.formatted,
                    "explanation": calc.explanation,
                    "success": true,
                });
                if let Some(interpretation) = &calc.interpretation {
                    value["interpretation"] = json!(interpretation);
                }
                value
            }
            Self::Failure(error) => tool_error(error.clone()),
        }
    }
}

const DIVISION_ERROR: &str = "Invalid inputs or division by zero";

#[derive(Debug, Clone, Copy, Default)]
pub struct FinancialCalculator;

impl FinancialCalculator {
    pub fn new() -> Self {
        Self
    }

    /// Run `operation` with its parameters taken from the `params` object.
    #[tracing::instrument(name = "calculate_metric", skip(self, params))]
    pub fn calculate(&self, operation: &str, params: &Value) -> CalculationOutcome {
        let Some(op) = Operation::parse(operation) else {
            return CalculationOutcome::Failure(format!(
                "Unknown operation '{}'. Available: {}",
                operation,
                Operation::available()
            ));
        };

        let [first, second] = op.params();
        let (a, b) = match (param(params, first, op), param(params, second, op)) {
            (Ok(a), Ok(b)) => (a, b),
            (Err(message), _) | (_, Err(message)) => return CalculationOutcome::Failure(message),
        };

        let outcome = compute(op, a, b);
        match &outcome {
            CalculationOutcome::Success(calc) => {
                tracing::info!(operation = op.as_str(), result = calc.value, "calculation_completed");
            }
            CalculationOutcome::Failure(error) => {
                tracing::warn!("Calculation error for {}: {}", op.as_str(), error);
            }
        }
        outcome
    }
}

fn param(params: &Value, name: &str, op: Operation) -> Result<f64, String> {
    match params.get(name) {
        None | Some(Value::Null) => Err(format!(
            "Missing required parameter '{}' for {}",
            name,
            op.as_str()
        )),
        Some(value) => {
            parse_number(value).ok_or_else(|| format!("Parameter '{}' must be a number", name))
        }
    }
}

/// Read a number from JSON, accepting strings such as `"1,200"` or `"$50"`.
pub fn parse_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => {
            let cleaned: String = s
                .trim()
                .chars()
                .filter(|c| !matches!(c, '$' | ',' | ' '))
                .collect();
            cleaned.parse::<f64>().ok().filter(|n| n.is_finite())
        }
        _ => None,
    }
}

fn compute(op: Operation, a: f64, b: f64) -> CalculationOutcome {
    if op == Operation::GrowthRate {
        if b == 0.0 {
            return CalculationOutcome::Failure("Previous value cannot be zero".to_string());
        }
        let growth = (a - b) / b * 100.0;
        return success(
            growth,
            format!("{:+.2}%", growth),
            format!(
                "Growth Rate = ((Current - Previous) / Previous) × 100 = (({} - {}) / {}) × 100",
                thousands(a, 2),
                thousands(b, 2),
                thousands(b, 2)
            ),
            None,
        );
    }

    if b == 0.0 {
        return CalculationOutcome::Failure(DIVISION_ERROR.to_string());
    }
    let ratio = a / b;
    let (x, y) = (thousands(a, 2), thousands(b, 2));

    match op {
        Operation::ProfitMargin => percent(
            ratio,
            format!("Profit Margin = (Net Income / Revenue) × 100 = ({} / {}) × 100", x, y),
            Some(interpret_profit_margin(ratio * 100.0)),
        ),
        Operation::GrossMargin => percent(
            ratio,
            format!("Gross Margin = (Gross Profit / Revenue) × 100 = ({} / {}) × 100", x, y),
            None,
        ),
        Operation::OperatingMargin => percent(
            ratio,
            format!(
                "Operating Margin = (Operating Income / Revenue) × 100 = ({} / {}) × 100",
                x, y
            ),
            None,
        ),
        Operation::Roe => percent(
            ratio,
            format!(
                "ROE = (Net Income / Shareholders' Equity) × 100 = ({} / {}) × 100",
                x, y
            ),
            None,
        ),
        Operation::Roa => percent(
            ratio,
            format!("ROA = (Net Income / Total Assets) × 100 = ({} / {}) × 100", x, y),
            None,
        ),
        Operation::CurrentRatio => success(
            ratio,
            format!("{:.2}", ratio),
            format!(
                "Current Ratio = Current Assets / Current Liabilities = {} / {}",
                x, y
            ),
            Some(interpret_current_ratio(ratio)),
        ),
        Operation::DebtToEquity => success(
            ratio,
            format!("{:.2}", ratio),
            format!("Debt-to-Equity = Total Debt / Total Equity = {} / {}", x, y),
            None,
        ),
        Operation::PeRatio => success(
            ratio,
            format!("{:.2}", ratio),
            format!(
                "P/E Ratio = Stock Price / Earnings Per Share = {:.2} / {:.2}",
                a, b
            ),
            None,
        ),
        Operation::Eps => success(
            ratio,
            format!("${:.2}", ratio),
            format!(
                "EPS = Net Income / Shares Outstanding = {} / {}",
                x,
                thousands(b, 0)
            ),
            None,
        ),
        Operation::GrowthRate => CalculationOutcome::Failure(DIVISION_ERROR.to_string()),
    }
}

fn percent(ratio: f64, explanation: String, interpretation: Option<&str>) -> CalculationOutcome {
    let percentage = ratio * 100.0;
    success(
        percentage,
        format!("{:.2}%", percentage),
        explanation,
        interpretation,
    )
}

fn success(
    value: f64,
    formatted: String,
    explanation: String,
    interpretation: Option<&str>,
) -> CalculationOutcome {
    CalculationOutcome::Success(Calculation {
        value: round2(value),
        formatted,
        explanation,
        interpretation: interpretation.map(str::to_string),
    })
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Format with `,` thousands separators and a fixed number of decimals.
pub fn thousands(value: f64, decimals: usize) -> String {
    let formatted = format!("{:.*}", decimals, value.abs());
    let (whole, fraction) = match formatted.split_once('.') {
        Some((whole, fraction)) => (whole, Some(fraction)),
        None => (formatted.as_str(), None),
    };

    let mut out = String::with_capacity(formatted.len() + whole.len() / 3 + 1);
    if value < 0.0 {
        out.push('-');
    }
    for (i, digit) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(digit);
    }
    if let Some(fraction) = fraction {
        out.push('.');
        out.push_str(fraction);
    }
    out
}

fn interpret_profit_margin(margin: f64) -> &'static str {
    if margin < 0.0 {
        "Negative margin indicates losses"
    } else if margin < 5.0 {
        "Low profit margin"
    } else if margin < 10.0 {
        "Moderate profit margin"
    } else if margin < 20.0 {
        "Good profit margin"
    } else {
        "Excellent profit margin"
    }
}

fn interpret_current_ratio(ratio: f64) -> &'static str {
    if ratio < 1.0 {
        "May have liquidity issues (ratio < 1.0)"
    } else if ratio < 1.5 {
        "Acceptable liquidity"
    } else if ratio < 3.0 {
        "Good liquidity"
    } else {
        "Very strong liquidity (may indicate inefficient use of assets)"
    }
}

/// `calculate_financial_metric`: the calculator exposed to the model.
#[derive(Debug, Clone, Default)]
pub struct CalculatorTool {
    calculator: FinancialCalculator,
}

impl CalculatorTool {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl Tool for CalculatorTool {
    fn name(&self) -> &str {
        "calculate_financial_metric"
    }

    fn description(&self) -> &str {
        "Calculate financial metrics and ratios. Supported operations: \
         profit_margin (net_income, revenue), gross_margin (gross_profit, revenue), \
         operating_margin (operating_income, revenue), roe (net_income, shareholders_equity), \
         roa (net_income, total_assets), current_ratio (current_assets, current_liabilities), \
         debt_to_equity (total_debt, total_equity), pe_ratio (stock_price, earnings_per_share), \
         growth_rate (current_value, previous_value), eps (net_income, shares_outstanding). \
         Use this tool when you need to compute financial metrics from extracted data."
    }

    fn parameters_schema(&self) -> Value {
        let mut properties = Map::new();
        properties.insert(
            "operation".to_string(),
            json!({
                "type": "string",
                "enum": Operation::ALL.iter().map(Operation::as_str).collect::<Vec<_>>(),
                "description": "The calculation to perform",
            }),
        );
        for op in Operation::ALL {
            for name in op.params() {
                properties
                    .entry(name.to_string())
                    .or_insert_with(|| json!({"type": "number"}));
            }
        }

        json!({
            "type": "object",
            "properties": properties,
            "required": ["operation"],
        })
    }

    async fn execute(&self, args: Value) -> AppResult<Value> {
        let Some(operation) = args.get("operation").and_then(Value::as_str) else {
            return Ok(tool_error("Missing required parameter 'operation'"));
        };
        Ok(self.calculator.calculate(operation, &args).to_json())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn calc(operation: &str, params: Value) -> CalculationOutcome {
        FinancialCalculator::new().calculate(operation, &params)
    }

    fn expect_success(outcome: CalculationOutcome) -> Calculation {
        match outcome {
            CalculationOutcome::Success(calc) => calc,
            CalculationOutcome::Failure(e) => panic!("calculation failed: {}", e),
        }
    }

    #[test]
    fn test_profit_margin() {
        let result = expect_success(calc(
            "profit_margin",
            json!({"net_income": 1_300_000, "revenue": 5_200_000}),
        ));

        assert_eq!(result.value, 25.0);
        assert_eq!(result.formatted, "25.00%");
        assert_eq!(
            result.explanation,
            "Profit Margin = (Net Income / Revenue) × 100 = (1,300,000.00 / 5,200,000.00) × 100"
        );
        assert_eq!(result.interpretation.as_deref(), Some("Excellent profit margin"));
    }

    #[test]
    fn test_current_ratio() {
        let result = expect_success(calc(
            "current_ratio",
            json!({"current_assets": 150, "current_liabilities": 100}),
        ));
        assert_eq!(result.value, 1.5);
        assert_eq!(result.formatted, "1.50");
        assert_eq!(result.interpretation.as_deref(), Some("Good liquidity"));

        let low = expect_success(calc(
            "current_ratio",
            json!({"current_assets": 80, "current_liabilities": 100}),
        ));
        assert_eq!(
            low.interpretation.as_deref(),
            Some("May have liquidity issues (ratio < 1.0)")
        );
    }

    #[test]
    fn test_growth_rate() {
        let result = expect_success(calc(
            "growth_rate",
            json!({"current_value": 110, "previous_value": 90}),
        ));
        assert_eq!(result.value, 22.22);
        assert_eq!(result.formatted, "+22.22%");

        let decline = expect_success(calc(
            "growth_rate",
            json!({"current_value": 90, "previous_value": 100}),
        ));
        assert_eq!(decline.formatted, "-10.00%");

        assert_eq!(
            calc("growth_rate", json!({"current_value": 5, "previous_value": 0})),
            CalculationOutcome::Failure("Previous value cannot be zero".to_string())
        );
    }

    #[test]
    fn test_eps_formats_shares_without_decimals() {
        let result = expect_success(calc(
            "eps",
            json!({"net_income": 2_000_000, "shares_outstanding": 1_000_000}),
        ));
        assert_eq!(result.formatted, "$2.00");
        assert_eq!(
            result.explanation,
            "EPS = Net Income / Shares Outstanding = 2,000,000.00 / 1,000,000"
        );
    }

    #[test]
    fn test_pe_ratio_explanation_has_no_separators() {
        let result = expect_success(calc(
            "pe_ratio",
            json!({"stock_price": 1500, "earnings_per_share": 50}),
        ));
        assert_eq!(result.value, 30.0);
        assert_eq!(
            result.explanation,
            "P/E Ratio = Stock Price / Earnings Per Share = 1500.00 / 50.00"
        );
    }

    #[test]
    fn test_failures() {
        let outcome = calc("roe", json!({"net_income": 10, "shareholders_equity": 0}));
        assert_eq!(outcome.to_json()["error"], "Invalid inputs or division by zero");
        assert_eq!(outcome.to_json()["success"], false);

        let outcome = calc("ebitda", json!({}));
        match outcome {
            CalculationOutcome::Failure(e) => {
                assert!(e.starts_with("Unknown operation 'ebitda'. Available: profit_margin, "));
                assert!(e.ends_with("growth_rate, eps"));
            }
            _ => panic!("expected failure"),
        }

        assert_eq!(
            calc("roa", json!({"net_income": 10})),
            CalculationOutcome::Failure(
                "Missing required parameter 'total_assets' for roa".to_string()
            )
        );
        assert_eq!(
            calc("roa", json!({"net_income": "lots", "total_assets": 10})),
            CalculationOutcome::Failure("Parameter 'net_income' must be a number".to_string())
        );
    }

    #[test]
    fn test_numeric_strings_are_accepted() {
        let result = expect_success(calc(
            "gross_margin",
            json!({"gross_profit": "$300", "revenue": "1,200"}),
        ));
        assert_eq!(result.value, 25.0);
    }

    #[test]
    fn test_thousands() {
        assert_eq!(thousands(1234567.891, 2), "1,234,567.89");
        assert_eq!(thousands(999.0, 2), "999.00");
        assert_eq!(thousands(-1500.0, 0), "-1,500");
        assert_eq!(thousands(0.5, 2), "0.50");
    }

    #[tokio::test]
    async fn test_tool_execute() {
        let tool = CalculatorTool::new();
        let output = tool
            .execute(json!({"operation": "profit_margin", "net_income": 1.3, "revenue": 5.2}))
            .await
            .unwrap();
        assert_eq!(output["value"], 25.0);
        assert_eq!(output["success"], true);
        assert_eq!(output["interpretation"], "Excellent profit margin");

        let output = tool.execute(json!({"revenue": 5.2})).await.unwrap();
        assert_eq!(output["success"], false);

        let schema = tool.parameters_schema();
        assert_eq!(schema["properties"]["operation"]["enum"][0], "profit_margin");
        assert!(schema["properties"]["shares_outstanding"].is_object());
    }
}
