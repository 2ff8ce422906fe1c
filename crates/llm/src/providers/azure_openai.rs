//! Azure OpenAI chat completions provider.
//!
//! Requests go to `{endpoint}/openai/deployments/{deployment}/chat/completions`
//! with the `api-key` header; `LlmRequest::model` names the deployment.

use crate::client::{LlmClient, LlmRequest, LlmResponse, LlmUsage};
use crate::types::{ChatMessage, Role, ToolCall, ToolSpec};
use finagent_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Default API version when none is configured.
pub const DEFAULT_API_VERSION: &str = "2024-02-15-preview";

#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    messages: Vec<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    model: String,
    #[serde(default)]
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Vec<ResponseToolCall>,
}

#[derive(Debug, Deserialize)]
struct ResponseToolCall {
    id: String,
    function: ResponseFunction,
}

#[derive(Debug, Deserialize)]
struct ResponseFunction {
    name: String,
    /// JSON-encoded arguments string
    #[serde(default)]
    arguments: String,
}

#[derive(Debug, Deserialize)]
struct Usage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    code: Option<String>,
    message: String,
}

/// Azure OpenAI LLM client.
pub struct AzureOpenAiClient {
    /// Resource endpoint, e.g. `https://my-resource.openai.azure.com`
    endpoint: String,

    api_key: String,

    api_version: String,

    /// HTTP client
    client: reqwest::Client,
}

impl AzureOpenAiClient {
    /// Create a new client for an Azure OpenAI resource.
    pub fn new(
        endpoint: impl Into<String>,
        api_key: impl Into<String>,
        api_version: impl Into<String>,
    ) -> Self {
        Self {
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            api_version: api_version.into(),
            client: reqwest::Client::new(),
        }
    }

    /// Chat completions URL for a deployment.
    fn completions_url(&self, deployment: &str) -> String {
        format!(
            "{}/openai/deployments/{}/chat/completions?api-version={}",
            self.endpoint, deployment, self.api_version
        )
    }

    /// Convert LlmRequest to the Azure wire format.
    fn to_azure_request(&self, request: &LlmRequest) -> ChatCompletionRequest {
        let tools = if request.tools.is_empty() {
            None
        } else {
            Some(request.tools.iter().map(tool_to_wire).collect())
        };
        let tool_choice = tools.as_ref().map(|_| "auto".to_string());

        ChatCompletionRequest {
            messages: request.messages.iter().map(message_to_wire).collect(),
            max_tokens: request.max_tokens,
            temperature: request.temperature,
            tools,
            tool_choice,
        }
    }

    /// Convert an Azure response to LlmResponse.
    fn convert_response(&self, response: ChatCompletionResponse) -> AppResult<LlmResponse> {
        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| AppError::Llm("Azure OpenAI returned no choices".to_string()))?;

        let tool_calls = choice
            .message
            .tool_calls
            .into_iter()
            .map(|call| ToolCall {
                id: call.id,
                name: call.function.name,
                arguments: parse_arguments(&call.function.arguments),
            })
            .collect();

        let usage = response
            .usage
            .map(|u| LlmUsage::new(u.prompt_tokens, u.completion_tokens))
            .unwrap_or_default();

        Ok(LlmResponse {
            content: choice.message.content.unwrap_or_default(),
            model: response.model,
            usage,
            done: choice.finish_reason.as_deref() != Some("length"),
            tool_calls,
        })
    }

    async fn post(&self, request: &LlmRequest) -> AppResult<reqwest::Response> {
        let body = self.to_azure_request(request);
        let url = self.completions_url(&request.model);

        let response = self
            .client
            .post(&url)
            .header("api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::Llm(format!("Failed to send request to Azure OpenAI: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(AppError::Llm(format!(
                "Azure OpenAI API error ({}): {}",
                status,
                parse_error_message(&error_text)
            )));
        }

        Ok(response)
    }
}

#[async_trait::async_trait]
impl LlmClient for AzureOpenAiClient {
    fn provider_name(&self) -> &str {
        "azure-openai"
    }

    async fn complete(&self, request: &LlmRequest) -> AppResult<LlmResponse> {
        tracing::debug!(
            deployment = %request.model,
            messages = request.messages.len(),
            tools = request.tools.len(),
            "Sending chat completion to Azure OpenAI"
        );

        let response = self.post(request).await?;
        let parsed: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| AppError::Llm(format!("Failed to parse Azure OpenAI response: {}", e)))?;

        let converted = self.convert_response(parsed)?;
        tracing::debug!(
            prompt_tokens = converted.usage.prompt_tokens,
            completion_tokens = converted.usage.completion_tokens,
            tool_calls = converted.tool_calls.len(),
            "Received completion from Azure OpenAI"
        );

        Ok(converted)
    }
}

fn message_to_wire(message: &ChatMessage) -> Value {
    match message.role {
        Role::User if !message.images.is_empty() => {
            let mut parts = vec![json!({"type": "text", "text": message.content})];
            parts.extend(message.images.iter().map(|url| {
                json!({"type": "image_url", "image_url": {"url": url}})
            }));
            json!({"role": "user", "content": parts})
        }
        Role::Assistant if !message.tool_calls.is_empty() => {
            let calls: Vec<Value> = message
                .tool_calls
                .iter()
                .map(|call| {
                    json!({
                        "id": call.id,
                        "type": "function",
                        "function": {
                            "name": call.name,
                            "arguments": call.arguments.to_string(),
                        }
                    })
                })
                .collect();
            let content = if message.content.is_empty() {
                Value::Null
            } else {
                Value::String(message.content.clone())
            };
            json!({"role": "assistant", "content": content, "tool_calls": calls})
        }
        Role::Tool => json!({
            "role": "tool",
            "tool_call_id": message.tool_call_id.clone().unwrap_or_default(),
            "content": message.content,
        }),
        role => json!({"role": role.as_str(), "content": message.content}),
    }
}

fn tool_to_wire(tool: &ToolSpec) -> Value {
    json!({
        "type": "function",
        "function": {
            "name": tool.name,
            "description": tool.description,
            "parameters": tool.parameters,
        }
    })
}

/// Tool arguments arrive as a JSON string; malformed JSON is kept as a string.
fn parse_arguments(raw: &str) -> Value {
    if raw.trim().is_empty() {
        return json!({});
    }
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

fn parse_error_message(body: &str) -> String {
    match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(envelope) => match envelope.error.code {
            Some(code) => format!("{}: {}", code, envelope.error.message),
            None => envelope.error.message,
        },
        Err(_) => body.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> AzureOpenAiClient {
        AzureOpenAiClient::new("https://res.openai.azure.com/", "key", DEFAULT_API_VERSION)
    }

    #[test]
    fn test_completions_url() {
        assert_eq!(
            client().completions_url("gpt-4"),
            "https://res.openai.azure.com/openai/deployments/gpt-4/chat/completions?api-version=2024-02-15-preview"
        );
    }

    #[test]
    fn test_request_with_image_and_tools() {
        let request = LlmRequest::from_messages(
            vec![
                ChatMessage::system("You analyze charts."),
                ChatMessage::user("Describe").with_image("data:image/png;base64,AAAA"),
            ],
            "gpt-4",
        )
        .with_max_tokens(1000)
        .with_tools(vec![ToolSpec {
            name: "calculate_financial_metric".to_string(),
            description: "calc".to_string(),
            parameters: json!({"type": "object"}),
        }]);

        let wire = serde_json::to_value(client().to_azure_request(&request)).unwrap();
        assert_eq!(wire["messages"][0]["role"], "system");
        assert_eq!(wire["messages"][1]["content"][1]["type"], "image_url");
        assert_eq!(
            wire["messages"][1]["content"][1]["image_url"]["url"],
            "data:image/png;base64,AAAA"
        );
        assert_eq!(wire["tools"][0]["function"]["name"], "calculate_financial_metric");
        assert_eq!(wire["tool_choice"], "auto");
        assert_eq!(wire["max_tokens"], 1000);
    }

    #[test]
    fn test_tool_messages_round_trip_to_wire() {
        let call = ToolCall {
            id: "call_1".to_string(),
            name: "calculate_financial_metric".to_string(),
            arguments: json!({"operation": "roe"}),
        };
        let assistant = message_to_wire(&ChatMessage::assistant_tool_calls("", vec![call]));
        assert!(assistant["content"].is_null());
        assert_eq!(
            assistant["tool_calls"][0]["function"]["arguments"],
            "{\"operation\":\"roe\"}"
        );

        let tool = message_to_wire(&ChatMessage::tool_result("call_1", "{}"));
        assert_eq!(tool["tool_call_id"], "call_1");
    }

    #[test]
    fn test_convert_response_with_tool_calls() {
        let body = r#"{
            "model": "gpt-4",
            "choices": [{
                "message": {
                    "role": "assistant",
                    "content": null,
                    "tool_calls": [{
                        "id": "call_9",
                        "type": "function",
                        "function": {"name": "calculate_financial_metric", "arguments": "{\"operation\":\"eps\"}"}
                    }]
                },
                "finish_reason": "tool_calls"
            }],
            "usage": {"prompt_tokens": 12, "completion_tokens": 3, "total_tokens": 15}
        }"#;
        let parsed: ChatCompletionResponse = serde_json::from_str(body).unwrap();
        let response = client().convert_response(parsed).unwrap();

        assert_eq!(response.content, "");
        assert_eq!(response.tool_calls.len(), 1);
        assert_eq!(response.tool_calls[0].arguments["operation"], "eps");
        assert_eq!(response.usage.total_tokens, 15);
    }

    #[test]
    fn test_parse_error_message() {
        let body = r#"{"error": {"code": "DeploymentNotFound", "message": "missing"}}"#;
        assert_eq!(parse_error_message(body), "DeploymentNotFound: missing");
        assert_eq!(parse_error_message("plain"), "plain");
    }
}
