//! The financial analysis agent: plan, gather, answer.

use crate::state::{ConversationMessage, ConversationState, RetrievalRecord, ToolCallRecord};
use crate::tools::{
    merge_citations, AnalysisType, CalculatorTool, ComparisonTool, RetrievalOutput, RetrievalTool,
    ToolRegistry, UserImages, VisionAnalyzer, VisionTool,
};
use finagent_core::{AppConfig, AppResult};
use finagent_knowledge::{create_retriever, Citation, HybridRetriever};
use finagent_llm::{create_client_from_config, ChatMessage, LlmClient, LlmRequest, Role};
use finagent_prompt::{build_prompt, load_prompt};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::Instrument;

const ANSWER_TEMPERATURE: f32 = 0.1;
const ANSWER_MAX_TOKENS: u32 = 1000;
/// Tool-calling rounds before the model must answer in text.
const MAX_TOOL_ROUNDS: usize = 5;

const VISION_KEYWORDS: &[&str] = &["chart", "image", "graph", "picture", "visual"];
const COMPARISON_KEYWORDS: &[&str] = &[
    "compare",
    "comparison",
    "versus",
    " vs",
    "difference between",
];
const CALCULATION_KEYWORDS: &[&str] = &[
    "calculate",
    "compute",
    "margin",
    "ratio",
    "growth",
    "percentage",
    "profit margin",
    "gross margin",
    "operating margin",
    "roe",
    "roa",
    "current ratio",
    "debt to equity",
    "p/e",
    "eps",
    "growth rate",
];
const RETRIEVAL_KEYWORDS: &[&str] = &[
    "what",
    "find",
    "show",
    "document",
    "report",
    "where",
    "when",
    "summarize",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStep {
    Vision,
    Retrieval,
    Calculator,
    Comparison,
}

impl WorkflowStep {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Vision => "vision",
            Self::Retrieval => "retrieval",
            Self::Calculator => "calculator",
            Self::Comparison => "comparison",
        }
    }
}

impl fmt::Display for WorkflowStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Choose the steps for a query by keyword routing.
pub fn plan_workflow(query: &str, image_path: Option<&Path>) -> Vec<WorkflowStep> {
    let query = query.to_lowercase();
    let mentions = |keywords: &[&str]| keywords.iter().any(|k| query.contains(k));

    let mut workflow = Vec::new();
    if image_path.is_some() || mentions(VISION_KEYWORDS) {
        workflow.push(WorkflowStep::Vision);
    }

    if mentions(COMPARISON_KEYWORDS) {
        workflow.extend([WorkflowStep::Retrieval, WorkflowStep::Comparison]);
    } else if mentions(CALCULATION_KEYWORDS) {
        workflow.extend([WorkflowStep::Retrieval, WorkflowStep::Calculator]);
    } else if mentions(RETRIEVAL_KEYWORDS) {
        workflow.push(WorkflowStep::Retrieval);
    }

    if workflow.is_empty() {
        workflow.push(WorkflowStep::Retrieval);
    }
    workflow
}

/// What the up-front steps gathered.
#[derive(Debug, Clone, Default)]
pub struct WorkflowResults {
    pub retrieval: Option<RetrievalOutput>,
    pub vision: Option<Value>,
    pub use_calculator: bool,
    pub use_comparison: bool,
}

impl WorkflowResults {
    /// Context block for the answer prompt.
    pub fn context(&self) -> String {
        let mut parts = Vec::new();
        if let Some(retrieval) = &self.retrieval {
            parts.push("Retrieved Information:".to_string());
            parts.push(retrieval.context.clone());
        }
        if let Some(vision) = &self.vision {
            parts.push("\nImage Analysis:".to_string());
            let analysis = match vision["analysis"].as_str() {
                Some(analysis) => analysis.to_string(),
                None => format!(
                    "Image analysis failed: {}",
                    vision["error"].as_str().unwrap_or("unknown error")
                ),
            };
            parts.push(analysis);
        }

        if parts.is_empty() {
            "No additional context available.".to_string()
        } else {
            parts.join("\n\n")
        }
    }

    /// Tools the model may call while answering.
    pub fn enabled_tools(&self) -> Vec<&'static str> {
        let mut tools = Vec::new();
        if self.use_calculator {
            tools.push("calculate_financial_metric");
        }
        if self.use_comparison {
            tools.push("compare_financial_periods");
        }
        tools
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentResponse {
    pub response: String,
    pub citations: Vec<Citation>,
    /// Tool calls made during this turn
    pub tool_calls: Vec<ToolCallRecord>,
    pub workflow: Vec<WorkflowStep>,
    /// False when the model returned no answer text
    pub success: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionTrace {
    pub conversation_history: Vec<ConversationMessage>,
    pub retrievals: Vec<RetrievalRecord>,
    pub tool_calls: Vec<ToolCallRecord>,
}

/// Model and prompt settings for the agent.
#[derive(Debug, Clone)]
pub struct AgentSettings {
    pub chat_model: String,
    pub vision_model: String,
    /// Workspace holding `.finagent/prompts` overrides
    pub workspace: PathBuf,
}

impl AgentSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            chat_model: config.chat_model(),
            vision_model: config.vision_model(),
            workspace: config.workspace.clone(),
        }
    }
}

pub struct FinancialAgent {
    llm: Arc<dyn LlmClient>,
    settings: AgentSettings,
    retrieval: RetrievalTool,
    vision: Arc<VisionAnalyzer>,
    registry: ToolRegistry,
    user_images: UserImages,
    system_prompt: String,
    state: ConversationState,
}

impl FinancialAgent {
    /// Build the agent with the configured chat provider and search backend.
    pub fn from_config(config: &AppConfig) -> AppResult<Self> {
        let llm = create_client_from_config(config)?;
        let retriever = Arc::new(create_retriever(config)?);
        Self::new(llm, retriever, AgentSettings::from_config(config))
    }

    pub fn new(
        llm: Arc<dyn LlmClient>,
        retriever: Arc<HybridRetriever>,
        settings: AgentSettings,
    ) -> AppResult<Self> {
        let retrieval = RetrievalTool::new(retriever);
        let vision = Arc::new(VisionAnalyzer::new(
            llm.clone(),
            settings.vision_model.clone(),
            settings.chat_model.clone(),
            settings.workspace.clone(),
        ));
        let user_images = UserImages::default();
        let registry = ToolRegistry::new()
            .with(Arc::new(retrieval.clone()))
            .with(Arc::new(CalculatorTool::new()))
            .with(Arc::new(VisionTool::new(vision.clone())))
            .with(Arc::new(ComparisonTool::new(
                retrieval.clone(),
                vision.clone(),
                user_images.clone(),
            )));

        let definition = load_prompt(&settings.workspace, "agent.system")?;
        let system_prompt = build_prompt(&definition, HashMap::new())?.user;

        let mut state = ConversationState::default();
        state.add_message(Role::System, system_prompt.clone());

        tracing::info!(
            provider = llm.provider_name(),
            model = %settings.chat_model,
            "Financial agent initialized"
        );

        Ok(Self {
            llm,
            settings,
            retrieval,
            vision,
            registry,
            user_images,
            system_prompt,
            state,
        })
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    pub fn state(&self) -> &ConversationState {
        &self.state
    }

    /// Answer one user query.
    #[tracing::instrument(name = "agent_process_query", skip_all, fields(query = %preview(query)))]
    pub async fn process_query(
        &mut self,
        query: &str,
        image_path: Option<&Path>,
    ) -> AppResult<AgentResponse> {
        let first_call = self.state.tool_calls().len();
        self.state.add_message(Role::User, query);

        let workflow = plan_workflow(query, image_path);
        tracing::info!(
            "Planned workflow: {}",
            workflow
                .iter()
                .map(WorkflowStep::as_str)
                .collect::<Vec<_>>()
                .join(" -> ")
        );

        self.user_images
            .set(image_path.map(Path::to_path_buf).into_iter().collect());
        let results = self.execute_workflow(&workflow, query, image_path).await;
        let answered = self.generate_response(query, &results).await;
        self.user_images.clear();
        let (response, citations) = answered?;

        self.state.add_message(Role::Assistant, response.clone());

        Ok(AgentResponse {
            success: !response.is_empty(),
            response,
            citations,
            tool_calls: self.state.tool_calls()[first_call..].to_vec(),
            workflow,
        })
    }

    /// Run vision and retrieval up front; mark the tools the model may call.
    #[tracing::instrument(name = "execute_workflow", skip_all, fields(steps = workflow.len()))]
    pub async fn execute_workflow(
        &mut self,
        workflow: &[WorkflowStep],
        query: &str,
        image_path: Option<&Path>,
    ) -> WorkflowResults {
        let mut results = WorkflowResults::default();

        if let (true, Some(path)) = (workflow.contains(&WorkflowStep::Vision), image_path) {
            let analysis = self
                .vision
                .analyze_image(path, Some(query), AnalysisType::General)
                .await;
            self.state.add_tool_call(
                "analyze_financial_image",
                json!({"image_path": path.display().to_string()}),
                analysis.clone(),
            );
            results.vision = Some(analysis);
        }

        if workflow.contains(&WorkflowStep::Retrieval) {
            let output = self.retrieval.search(query, None, None, true).await;
            self.state.add_retrieval(query, output.citations.clone());
            self.state.add_tool_call(
                "search_financial_documents",
                json!({"query": query}),
                trace_value(&output),
            );
            results.retrieval = Some(output);
        }

        results.use_calculator = workflow.contains(&WorkflowStep::Calculator);
        results.use_comparison = workflow.contains(&WorkflowStep::Comparison);
        results
    }

    /// Ask the model for the final answer, serving its tool calls.
    #[tracing::instrument(name = "generate_response", skip_all)]
    pub async fn generate_response(
        &mut self,
        query: &str,
        results: &WorkflowResults,
    ) -> AppResult<(String, Vec<Citation>)> {
        let mut variables = HashMap::new();
        variables.insert("query".to_string(), query.to_string());
        variables.insert("context".to_string(), results.context());
        if results.use_calculator {
            variables.insert("calculation_guidance".to_string(), "true".to_string());
        }
        if results.use_comparison {
            variables.insert("comparison_guidance".to_string(), "true".to_string());
        }
        let definition = load_prompt(&self.settings.workspace, "agent.answer")?;
        let prompt = build_prompt(&definition, variables)?;

        let mut messages = vec![
            ChatMessage::system(self.system_prompt.clone()),
            ChatMessage::user(prompt.user),
        ];

        let enabled = results.enabled_tools();
        let specs = self.registry.specs_for(&enabled);
        let mut citations = results
            .retrieval
            .as_ref()
            .map(|r| r.citations.clone())
            .unwrap_or_default();
        let mut tool_citations = Vec::new();

        let mut round = 0;
        let answer = loop {
            let tools_open = !specs.is_empty() && round < MAX_TOOL_ROUNDS;
            let mut request =
                LlmRequest::from_messages(messages.clone(), self.settings.chat_model.clone())
                    .with_temperature(ANSWER_TEMPERATURE)
                    .with_max_tokens(ANSWER_MAX_TOKENS);
            if tools_open {
                request = request.with_tools(specs.clone());
            }

            let span = tracing::info_span!("llm_call", round, model = %request.model);
            let response = self.llm.complete(&request).instrument(span).await?;

            if !tools_open || response.tool_calls.is_empty() {
                break response.content;
            }
            round += 1;

            messages.push(ChatMessage::assistant_tool_calls(
                response.content.clone(),
                response.tool_calls.clone(),
            ));
            for call in &response.tool_calls {
                let output = self.registry.dispatch_allowed(call, &enabled).await;
                if let Some(found) = output
                    .get("citations")
                    .and_then(|c| serde_json::from_value::<Vec<Citation>>(c.clone()).ok())
                {
                    tool_citations.extend(found);
                }
                messages.push(ChatMessage::tool_result(call.id.clone(), output.to_string()));
                self.state
                    .add_tool_call(call.name.clone(), call.arguments.clone(), output);
            }
        };

        if !tool_citations.is_empty() {
            citations = merge_citations(citations.into_iter().chain(tool_citations));
        }

        Ok((clean_answer(&answer), citations))
    }

    /// Clear history and records, keeping the system prompt.
    pub fn reset_conversation(&mut self) {
        self.state.clear();
        self.state.add_message(Role::System, self.system_prompt.clone());
        tracing::info!("Conversation reset");
    }

    pub fn execution_trace(&self) -> ExecutionTrace {
        ExecutionTrace {
            conversation_history: self.state.messages().to_vec(),
            retrievals: self.state.retrievals().to_vec(),
            tool_calls: self.state.tool_calls().to_vec(),
        }
    }
}

/// Serialize a tool result for the trace, keeping the failure visible.
fn trace_value<T: Serialize>(output: &T) -> Value {
    serde_json::to_value(output).unwrap_or_else(|e| {
        tracing::warn!("Failed to record tool output: {}", e);
        json!({"error": format!("Unrecordable output: {}", e), "success": false})
    })
}

/// Strip zero-width spaces and byte order marks.
fn clean_answer(answer: &str) -> String {
    answer
        .replace(['\u{200b}', '\u{feff}'], "")
        .trim()
        .to_string()
}

fn preview(query: &str) -> String {
    query.chars().take(100).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::retrieval::tests::seeded_retriever;
    use finagent_llm::{ScriptedClient, ToolCall};
    use tempfile::TempDir;

    async fn agent(dir: &TempDir, client: &Arc<ScriptedClient>) -> FinancialAgent {
        let llm: Arc<dyn LlmClient> = client.clone();
        let settings = AgentSettings {
            chat_model: "gpt-4".to_string(),
            vision_model: "gpt-4o".to_string(),
            workspace: dir.path().to_path_buf(),
        };
        FinancialAgent::new(llm, seeded_retriever(dir).await, settings).unwrap()
    }

    fn tool_call(id: &str, name: &str, arguments: Value) -> ToolCall {
        ToolCall {
            id: id.to_string(),
            name: name.to_string(),
            arguments,
        }
    }

    #[test]
    fn test_plan_workflow() {
        use WorkflowStep::*;

        assert_eq!(
            plan_workflow("What was total revenue in Q3?", None),
            vec![Retrieval]
        );
        assert_eq!(
            plan_workflow("Calculate the profit margin", None),
            vec![Retrieval, Calculator]
        );
        assert_eq!(
            plan_workflow("Compare Q3 vs Q4 revenue", None),
            vec![Retrieval, Comparison]
        );
        assert_eq!(plan_workflow("Describe the chart", None), vec![Vision]);
        assert_eq!(
            plan_workflow("Hello", Some(Path::new("chart.png"))),
            vec![Vision]
        );
        assert_eq!(
            plan_workflow("What does this GRAPH say about margin?", None),
            vec![Vision, Retrieval, Calculator]
        );
        assert_eq!(plan_workflow("hello there", None), vec![Retrieval]);
    }

    #[test]
    fn test_trace_value_reports_serialization_failure() {
        let output = RetrievalOutput {
            context: "Revenue was 5.2M".to_string(),
            citations: Vec::new(),
            num_results: 1,
        };
        assert_eq!(trace_value(&output)["num_results"], 1);

        let unkeyed: HashMap<(u8, u8), u8> = HashMap::from([((1, 2), 3)]);
        let recorded = trace_value(&unkeyed);
        assert_eq!(recorded["success"], false);
        assert!(recorded["error"]
            .as_str()
            .unwrap()
            .starts_with("Unrecordable output"));
    }

    #[test]
    fn test_clean_answer() {
        assert_eq!(clean_answer("\u{feff} Revenue\u{200b} grew \n"), "Revenue grew");
    }

    #[tokio::test]
    async fn test_retrieval_query() {
        let dir = TempDir::new().unwrap();
        let client = Arc::new(
            ScriptedClient::new()
                .push_text("\u{feff}Q3 revenue was $5.2 million [q3_report, Page 1].\u{200b} "),
        );
        let mut agent = agent(&dir, &client).await;

        let response = agent
            .process_query("What was total revenue in Q3 2024?", None)
            .await
            .unwrap();

        assert!(response.success);
        assert_eq!(
            response.response,
            "Q3 revenue was $5.2 million [q3_report, Page 1]."
        );
        assert_eq!(response.workflow, vec![WorkflowStep::Retrieval]);
        assert_eq!(response.tool_calls.len(), 1);
        assert_eq!(response.tool_calls[0].tool, "search_financial_documents");
        assert!(!response.citations.is_empty());

        let request = &client.requests()[0];
        assert_eq!(request.messages[0].role, Role::System);
        assert_eq!(request.temperature, Some(0.1));
        assert_eq!(request.max_tokens, Some(1000));
        assert!(request.tools.is_empty());
        let user = &request.messages[1].content;
        assert!(user.contains("User Query: What was total revenue in Q3 2024?"));
        assert!(user.contains("Retrieved Information:"));
        assert!(!user.contains("IMPORTANT"));

        assert_eq!(agent.state().messages().len(), 3);
        assert_eq!(agent.state().retrievals().len(), 1);
    }

    #[tokio::test]
    async fn test_calculator_tool_loop() {
        let dir = TempDir::new().unwrap();
        let client = Arc::new(
            ScriptedClient::new()
                .push_tool_calls(vec![tool_call(
                    "call_1",
                    "calculate_financial_metric",
                    json!({"operation": "profit_margin", "net_income": 1.3, "revenue": 5.2}),
                )])
                .push_text("The profit margin is 25.00%."),
        );
        let mut agent = agent(&dir, &client).await;

        let response = agent
            .process_query("Calculate the profit margin for Q3 2024", None)
            .await
            .unwrap();

        assert_eq!(response.response, "The profit margin is 25.00%.");
        assert_eq!(
            response.workflow,
            vec![WorkflowStep::Retrieval, WorkflowStep::Calculator]
        );
        assert_eq!(response.tool_calls.len(), 2);
        assert_eq!(response.tool_calls[1].tool, "calculate_financial_metric");
        assert_eq!(response.tool_calls[1].output["formatted"], "25.00%");

        let requests = client.requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].tools.len(), 1);
        assert_eq!(requests[0].tools[0].name, "calculate_financial_metric");
        assert!(requests[0].messages[1].content.contains("IMPORTANT"));

        let followup = &requests[1].messages;
        assert_eq!(followup[2].tool_calls[0].id, "call_1");
        assert_eq!(followup[3].role, Role::Tool);
        assert_eq!(followup[3].tool_call_id.as_deref(), Some("call_1"));
        assert!(followup[3].content.contains("\"success\":true"));
    }

    #[tokio::test]
    async fn test_tool_rounds_are_capped() {
        let dir = TempDir::new().unwrap();
        let call = tool_call(
            "call_x",
            "calculate_financial_metric",
            json!({"operation": "roa", "net_income": 1, "total_assets": 10}),
        );
        let mut client = ScriptedClient::new();
        for _ in 0..MAX_TOOL_ROUNDS {
            client = client.push_tool_calls(vec![call.clone()]);
        }
        let client = Arc::new(client.push_text("ROA is 10%"));
        let mut agent = agent(&dir, &client).await;

        let response = agent
            .process_query("Compute ROA", None)
            .await
            .unwrap();

        assert_eq!(response.response, "ROA is 10%");
        assert_eq!(response.tool_calls.len(), 1 + MAX_TOOL_ROUNDS);
        let requests = client.requests();
        assert_eq!(requests.len(), MAX_TOOL_ROUNDS + 1);
        assert!(requests[MAX_TOOL_ROUNDS].tools.is_empty());
    }

    #[tokio::test]
    async fn test_vision_step_without_image_has_no_context() {
        let dir = TempDir::new().unwrap();
        let client = Arc::new(ScriptedClient::new().push_text("Please attach the chart."));
        let mut agent = agent(&dir, &client).await;

        let response = agent.process_query("Describe the chart", None).await.unwrap();

        assert_eq!(response.workflow, vec![WorkflowStep::Vision]);
        assert!(response.tool_calls.is_empty());
        assert!(response.citations.is_empty());
        assert!(client.requests()[0].messages[1]
            .content
            .contains("No additional context available."));
    }

    #[tokio::test]
    async fn test_image_query_runs_vision_then_retrieval() {
        let dir = TempDir::new().unwrap();
        let image = dir.path().join("revenue.png");
        std::fs::write(&image, b"PNG").unwrap();
        let client = Arc::new(
            ScriptedClient::new()
                .push_text("Chart shows growth")
                .push_text("Revenue grew through 2024."),
        );
        let mut agent = agent(&dir, &client).await;

        let response = agent
            .process_query("Summarize this", Some(&image))
            .await
            .unwrap();

        assert_eq!(
            response.workflow,
            vec![WorkflowStep::Vision, WorkflowStep::Retrieval]
        );
        assert_eq!(response.tool_calls[0].tool, "analyze_financial_image");
        assert_eq!(response.tool_calls[1].tool, "search_financial_documents");

        let requests = client.requests();
        assert_eq!(requests[0].model, "gpt-4o");
        assert!(requests[1].messages[1]
            .content
            .contains("Image Analysis:\n\nChart shows growth"));
    }

    #[tokio::test]
    async fn test_comparison_citations_are_merged() {
        let dir = TempDir::new().unwrap();
        let client = Arc::new(
            ScriptedClient::new()
                .push_tool_calls(vec![tool_call(
                    "call_1",
                    "compare_financial_periods",
                    json!({"metric": "total revenue", "period_a": "Q3 2024", "period_b": "Q4 2024"}),
                )])
                .push_text("Revenue rose from $5.2M to $6.1M."),
        );
        let mut agent = agent(&dir, &client).await;

        let response = agent
            .process_query("Compare total revenue Q3 2024 vs Q4 2024", None)
            .await
            .unwrap();

        assert_eq!(
            response.workflow,
            vec![WorkflowStep::Retrieval, WorkflowStep::Comparison]
        );
        assert_eq!(response.tool_calls[1].tool, "compare_financial_periods");
        let ids: Vec<usize> = response.citations.iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_comparison_cannot_read_unattached_images() {
        let dir = TempDir::new().unwrap();
        let secret = dir.path().join("secret.png");
        std::fs::write(&secret, b"S").unwrap();
        let client = Arc::new(
            ScriptedClient::new()
                .push_tool_calls(vec![tool_call(
                    "call_1",
                    "compare_financial_periods",
                    json!({
                        "metric": "total revenue",
                        "period_a": "Q3 2024",
                        "period_b": "Q4 2024",
                        "image_paths": [secret.display().to_string()],
                    }),
                )])
                .push_text("Revenue rose."),
        );
        let mut agent = agent(&dir, &client).await;

        let response = agent
            .process_query("Compare total revenue Q3 2024 vs Q4 2024", None)
            .await
            .unwrap();

        let output = &response.tool_calls[1].output;
        assert!(output.get("image_comparison").is_none());
        assert_eq!(
            output["refused_image_paths"],
            json!([secret.display().to_string()])
        );
    }

    #[tokio::test]
    async fn test_llm_failure_is_an_error() {
        let dir = TempDir::new().unwrap();
        let client = Arc::new(ScriptedClient::new());
        let mut agent = agent(&dir, &client).await;

        assert!(agent.process_query("What was revenue?", None).await.is_err());
    }

    #[tokio::test]
    async fn test_reset_and_trace() {
        let dir = TempDir::new().unwrap();
        let client = Arc::new(ScriptedClient::with_fallback("Revenue was $5.2 million."));
        let mut agent = agent(&dir, &client).await;

        agent.process_query("What was revenue?", None).await.unwrap();
        let trace = agent.execution_trace();
        assert_eq!(trace.conversation_history.len(), 3);
        assert_eq!(trace.retrievals.len(), 1);
        assert_eq!(trace.tool_calls.len(), 1);

        agent.reset_conversation();
        let trace = agent.execution_trace();
        assert_eq!(trace.conversation_history.len(), 1);
        assert_eq!(trace.conversation_history[0].role, Role::System);
        assert!(trace.tool_calls.is_empty());
    }
}
