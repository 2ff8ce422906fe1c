//! Calc command handler.

use super::print_json;
use clap::Args;
use finagent_agent::{CalculationOutcome, FinancialCalculator};
use finagent_core::{AppError, AppResult};
use serde_json::{Map, Value};

/// Run a financial calculation, e.g. `calc profit_margin net_income=50 revenue=200`
#[derive(Args, Debug)]
pub struct CalcCommand {
    /// Operation (profit_margin, gross_margin, operating_margin, roe, roa,
    /// current_ratio, debt_to_equity, pe_ratio, growth_rate, eps)
    pub operation: String,

    /// Parameters as key=value
    pub params: Vec<String>,

    /// Output the result as JSON
    #[arg(long)]
    pub json: bool,
}

fn parse_params(params: &[String]) -> AppResult<Value> {
    let mut map = Map::new();
    for param in params {
        let (key, value) = param.split_once('=').ok_or_else(|| {
            AppError::Config(format!("Invalid parameter '{}', expected key=value", param))
        })?;
        map.insert(key.trim().to_string(), Value::String(value.trim().to_string()));
    }
    Ok(Value::Object(map))
}

impl CalcCommand {
    pub fn execute(&self) -> AppResult<()> {
        tracing::info!("Executing calc command: {}", self.operation);

        let params = parse_params(&self.params)?;
        let outcome = FinancialCalculator::new().calculate(&self.operation, &params);

        if self.json {
            print_json(&outcome.to_json())?;
        }
        match outcome {
            CalculationOutcome::Success(calc) => {
                if !self.json {
                    println!("{}", calc.formatted);
                    println!("{}", calc.explanation);
                    if let Some(interpretation) = calc.interpretation {
                        println!("{}", interpretation);
                    }
                }
                Ok(())
            }
            CalculationOutcome::Failure(error) => Err(AppError::Tool(error)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_params() {
        let params = parse_params(&["net_income=50".to_string(), "revenue = $200".to_string()])
            .unwrap();
        assert_eq!(params["net_income"], "50");
        assert_eq!(params["revenue"], "$200");

        assert!(parse_params(&["revenue".to_string()]).is_err());
    }

    #[test]
    fn test_params_feed_the_calculator() {
        let params = parse_params(&["net_income=50".to_string(), "revenue=200".to_string()])
            .unwrap();
        let outcome = FinancialCalculator::new().calculate("profit_margin", &params);
        assert_eq!(outcome.value(), Some(25.0));
    }
}
