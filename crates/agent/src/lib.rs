//! Financial analysis agent.
//!
//! The agent plans a workflow for each query with keyword routing, runs
//! retrieval and image analysis up front, then asks the chat model for a
//! cited answer. The calculator and period comparison tools are offered to
//! the model through tool calling.

pub mod agent;
pub mod state;
pub mod tools;

pub use agent::{
    plan_workflow, AgentResponse, AgentSettings, ExecutionTrace, FinancialAgent, WorkflowResults,
    WorkflowStep,
};
pub use state::{ConversationMessage, ConversationState, RetrievalRecord, ToolCallRecord};
pub use tools::{
    AnalysisType, CalculationOutcome, CalculatorTool, ComparisonTool, FinancialCalculator,
    RetrievalOutput, RetrievalTool, Tool, ToolRegistry, VisionAnalyzer, VisionTool,
};
