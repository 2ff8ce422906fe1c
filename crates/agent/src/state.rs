//! Conversation history and per-session tool bookkeeping.

use chrono::{DateTime, Utc};
use finagent_knowledge::Citation;
use finagent_llm::{ChatMessage, Role};
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const DEFAULT_MAX_HISTORY: usize = 10;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationMessage {
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallRecord {
    pub tool: String,
    pub inputs: Value,
    pub output: Value,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalRecord {
    pub query: String,
    pub results: Vec<Citation>,
    pub timestamp: DateTime<Utc>,
}

/// Messages, retrievals and tool calls of one conversation.
#[derive(Debug, Clone)]
pub struct ConversationState {
    messages: Vec<ConversationMessage>,
    max_history: usize,
    retrievals: Vec<RetrievalRecord>,
    tool_calls: Vec<ToolCallRecord>,
}

impl Default for ConversationState {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_HISTORY)
    }
}

impl ConversationState {
    pub fn new(max_history: usize) -> Self {
        Self {
            messages: Vec::new(),
            max_history,
            retrievals: Vec::new(),
            tool_calls: Vec::new(),
        }
    }

    /// Append a message. Past `max_history` messages, all system messages
    /// are kept followed by the most recent `max_history` others.
    pub fn add_message(&mut self, role: Role, content: impl Into<String>) {
        self.messages.push(ConversationMessage {
            role,
            content: content.into(),
            timestamp: Utc::now(),
        });

        if self.messages.len() > self.max_history {
            let (system, rest): (Vec<_>, Vec<_>) = self
                .messages
                .drain(..)
                .partition(|m| m.role == Role::System);
            let skip = rest.len().saturating_sub(self.max_history);
            self.messages = system;
            self.messages.extend(rest.into_iter().skip(skip));
        }
    }

    pub fn add_retrieval(&mut self, query: impl Into<String>, results: Vec<Citation>) {
        self.retrievals.push(RetrievalRecord {
            query: query.into(),
            results,
            timestamp: Utc::now(),
        });
    }

    pub fn add_tool_call(&mut self, tool: impl Into<String>, inputs: Value, output: Value) {
        self.tool_calls.push(ToolCallRecord {
            tool: tool.into(),
            inputs,
            output,
            timestamp: Utc::now(),
        });
    }

    /// History in the shape the chat client expects.
    pub fn chat_history(&self) -> Vec<ChatMessage> {
        self.messages
            .iter()
            .map(|m| match m.role {
                Role::System => ChatMessage::system(m.content.clone()),
                Role::Assistant => ChatMessage::assistant(m.content.clone()),
                _ => ChatMessage::user(m.content.clone()),
            })
            .collect()
    }

    pub fn messages(&self) -> &[ConversationMessage] {
        &self.messages
    }

    pub fn retrievals(&self) -> &[RetrievalRecord] {
        &self.retrievals
    }

    pub fn tool_calls(&self) -> &[ToolCallRecord] {
        &self.tool_calls
    }

    pub fn clear(&mut self) {
        self.messages.clear();
        self.retrievals.clear();
        self.tool_calls.clear();
    }
}
