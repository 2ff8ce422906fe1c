//! Tools the agent can call.
//!
//! Every tool answers with a JSON object. Domain failures are reported as
//! `{"success": false, "error": ...}` so the model can read them; `Err` is
//! reserved for failures of the tool machinery itself.

pub mod calculator;
pub mod comparison;
pub mod retrieval;
pub mod vision;

pub use calculator::{CalculationOutcome, CalculatorTool, FinancialCalculator, Operation};
pub use comparison::{merge_citations, ComparisonTool, UserImages};
pub use retrieval::{RetrievalOutput, RetrievalTool};
pub use vision::{AnalysisType, VisionAnalyzer, VisionTool};

use finagent_core::AppResult;
use finagent_llm::{ToolCall, ToolSpec};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::Arc;

/// A callable tool advertised to the model.
#[async_trait::async_trait]
pub trait Tool: Send + Sync {
    /// Function name the model uses to call the tool.
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// JSON Schema of the arguments object.
    fn parameters_schema(&self) -> Value;

    async fn execute(&self, args: Value) -> AppResult<Value>;

    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters_schema(),
        }
    }
}

/// Failure value returned to the model.
pub fn tool_error(message: impl Into<String>) -> Value {
    json!({
        "error": message.into(),
        "success": false,
    })
}

/// Tools keyed by name.
#[derive(Default, Clone)]
pub struct ToolRegistry {
    tools: BTreeMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        self.tools.insert(tool.name().to_string(), tool);
    }

    pub fn with(mut self, tool: Arc<dyn Tool>) -> Self {
        self.register(tool);
        self
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        self.tools.get(name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.tools.keys().map(String::as_str).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Specs of every registered tool.
    pub fn specs(&self) -> Vec<ToolSpec> {
        self.tools.values().map(|tool| tool.spec()).collect()
    }

    /// Specs of the named tools, skipping names that are not registered.
    pub fn specs_for(&self, names: &[&str]) -> Vec<ToolSpec> {
        names
            .iter()
            .filter_map(|name| self.tools.get(*name))
            .map(|tool| tool.spec())
            .collect()
    }

    /// Run a tool call. Never fails: errors become failure values.
    pub async fn dispatch(&self, call: &ToolCall) -> Value {
        let Some(tool) = self.tools.get(&call.name) else {
            return tool_error(format!("Unknown tool '{}'", call.name));
        };

        tracing::info!(tool = %call.name, "Dispatching tool call");
        match tool.execute(call.arguments.clone()).await {
            Ok(output) => output,
            Err(e) => {
                tracing::error!(tool = %call.name, "Tool failed: {}", e);
                tool_error(e.to_string())
            }
        }
    }

    /// Run a tool call only if the tool is enabled for this turn.
    pub async fn dispatch_allowed(&self, call: &ToolCall, allowed: &[&str]) -> Value {
        if !allowed.contains(&call.name.as_str()) {
            let mut allowed: Vec<&str> = allowed.to_vec();
            allowed.sort_unstable();
            return json!({
                "error": format!("Tool '{}' is not allowed for this query.", call.name),
                "allowed_tools": allowed,
                "success": false,
            });
        }
        self.dispatch(call).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use finagent_core::AppError;

    struct Echo;

    #[async_trait::async_trait]
    impl Tool for Echo {
        fn name(&self) -> &str {
            "echo"
        }

        fn description(&self) -> &str {
            "Echo the arguments"
        }

        fn parameters_schema(&self) -> Value {
            json!({"type": "object"})
        }

        async fn execute(&self, args: Value) -> AppResult<Value> {
            if args.get("fail").is_some() {
                return Err(AppError::Tool("boom".to_string()));
            }
            Ok(args)
        }
    }

    fn call(name: &str, arguments: Value) -> ToolCall {
        ToolCall {
            id: "call_0".to_string(),
            name: name.to_string(),
            arguments,
        }
    }

    #[tokio::test]
    async fn test_dispatch() {
        let registry = ToolRegistry::new().with(Arc::new(Echo));

        let output = registry.dispatch(&call("echo", json!({"x": 1}))).await;
        assert_eq!(output["x"], 1);

        let output = registry.dispatch(&call("missing", json!({}))).await;
        assert_eq!(output["success"], false);
        assert_eq!(output["error"], "Unknown tool 'missing'");

        let output = registry.dispatch(&call("echo", json!({"fail": true}))).await;
        assert_eq!(output["success"], false);
        assert_eq!(output["error"], "Tool error: boom");
    }

    #[tokio::test]
    async fn test_dispatch_allowed_denies_disabled_tools() {
        let registry = ToolRegistry::new().with(Arc::new(Echo));
        let output = registry.dispatch_allowed(&call("echo", json!({})), &[]).await;
        assert_eq!(output["success"], false);
        assert_eq!(output["error"], "Tool 'echo' is not allowed for this query.");
    }

    #[test]
    fn test_specs_for() {
        let registry = ToolRegistry::new().with(Arc::new(Echo));
        assert_eq!(registry.specs().len(), 1);
        assert_eq!(registry.specs_for(&["echo", "other"])[0].name, "echo");
        assert!(registry.specs_for(&["other"]).is_empty());
    }
}
