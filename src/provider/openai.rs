//! OpenAI Chat Completions API provider.
//!
//! Also serves OpenAI-compatible servers (Ollama, LM Studio, gateways) through
//! base URL overrides.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use crate::config::QuarryConfig;
use crate::error::QuarryError;
use crate::types::{AgentToolCall, ContentPart, ModelMessage, Role, Usage};

use super::http::{bearer_headers, shared_client, status_to_error};
use super::{FinishReason, ModelProvider, ProviderFactory, ProviderRequest, ProviderResponse};

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const OLLAMA_BASE_URL: &str = "http://localhost:11434/v1";
const LMSTUDIO_BASE_URL: &str = "http://localhost:1234/v1";

pub struct OpenAiProvider {
    provider_key: String,
    model_id: String,
    api_key: Option<String>,
    base_url: String,
}

impl OpenAiProvider {
    pub fn new(
        provider_key: impl Into<String>,
        model_id: impl Into<String>,
        api_key: Option<String>,
        base_url: Option<String>,
    ) -> Self {
        Self {
            provider_key: provider_key.into(),
            model_id: model_id.into(),
            api_key,
            base_url: base_url
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
        }
    }

    fn build_request_body(&self, request: &ProviderRequest) -> Value {
        let messages = request
            .messages
            .iter()
            .map(message_to_openai)
            .collect::<Vec<_>>();

        let mut body = serde_json::Map::new();
        body.insert("model".into(), json!(self.model_id));
        body.insert("messages".into(), Value::Array(messages));

        if !request.tools.is_empty() {
            let tool_defs: Vec<Value> = request
                .tools
                .iter()
                .map(|t| {
                    json!({
                        "type": "function",
                        "function": {
                            "name": t.name,
                            "description": t.description,
                            "parameters": t.parameters,
                        }
                    })
                })
                .collect();
            body.insert("tools".into(), Value::Array(tool_defs));
            body.insert("parallel_tool_calls".into(), Value::Bool(false));
        }

        Value::Object(body)
    }
}

#[async_trait]
impl ModelProvider for OpenAiProvider {
    fn provider_name(&self) -> &str {
        &self.provider_key
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }

    async fn propose(&self, request: &ProviderRequest) -> Result<ProviderResponse, QuarryError> {
        let body = self.build_request_body(request);
        let url = format!("{}/chat/completions", self.base_url);

        debug!(
            provider = %self.provider_key,
            model = %self.model_id,
            messages = request.messages.len(),
            "chat completion request"
        );

        let resp = shared_client()
            .post(&url)
            .headers(bearer_headers(self.api_key.as_deref()))
            .json(&body)
            .send()
            .await?;

        let status = resp.status().as_u16();
        if !(200..300).contains(&status) {
            let body_text = resp.text().await.unwrap_or_default();
            return Err(status_to_error(status, &body_text));
        }

        let data: OpenAiChatResponse = resp.json().await?;
        let choice = data
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| QuarryError::api(status, "No choices in chat completion response"))?;

        let tool_calls = choice
            .message
            .tool_calls
            .unwrap_or_default()
            .into_iter()
            .map(|tc| AgentToolCall {
                id: tc.id,
                name: tc.function.name,
                arguments: serde_json::from_str(&tc.function.arguments)
                    .unwrap_or(Value::String(tc.function.arguments)),
            })
            .collect();

        Ok(ProviderResponse {
            text: choice.message.content.unwrap_or_default(),
            usage: data
                .usage
                .map(|u| Usage {
                    input_tokens: u.prompt_tokens,
                    output_tokens: u.completion_tokens,
                    total_tokens: u.total_tokens,
                })
                .unwrap_or_default(),
            tool_calls,
            finish_reason: choice.finish_reason.as_deref().and_then(parse_finish_reason),
        })
    }
}

/// Factory for the chat-completions wire format.
pub struct OpenAiFactory;

impl ProviderFactory for OpenAiFactory {
    fn provider_keys(&self) -> &[&str] {
        &["openai", "openai-compatible", "ollama", "lmstudio"]
    }

    fn create(
        &self,
        config: &QuarryConfig,
        provider_key: &str,
        model_id: &str,
    ) -> Result<Box<dyn ModelProvider>, QuarryError> {
        let api_key = config.get_api_key(provider_key);
        let base_url = config.get_base_url(provider_key);
        let base_url = match provider_key {
            "openai" => {
                if api_key.is_none() {
                    return Err(QuarryError::Authentication(
                        "Missing OPENAI_API_KEY".into(),
                    ));
                }
                base_url
            }
            "ollama" => base_url.or_else(|| Some(OLLAMA_BASE_URL.to_string())),
            "lmstudio" => base_url.or_else(|| Some(LMSTUDIO_BASE_URL.to_string())),
            _ => Some(base_url.ok_or_else(|| {
                QuarryError::Configuration(format!("Missing base URL for '{provider_key}'"))
            })?),
        };
        Ok(Box::new(OpenAiProvider::new(
            provider_key,
            model_id,
            api_key,
            base_url,
        )))
    }
}

fn parse_finish_reason(s: &str) -> Option<FinishReason> {
    match s {
        "stop" => Some(FinishReason::Stop),
        "length" => Some(FinishReason::Length),
        "tool_calls" => Some(FinishReason::ToolCalls),
        "content_filter" => Some(FinishReason::ContentFilter),
        _ => None,
    }
}

fn message_to_openai(msg: &ModelMessage) -> Value {
    let role = match msg.role {
        Role::System => "system",
        Role::User => "user",
        Role::Assistant => "assistant",
        Role::Tool => "tool",
    };

    if let Some(ContentPart::ToolResult(tr)) = msg.content.first() {
        let content = match &tr.result {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        return json!({
            "role": "tool",
            "tool_call_id": tr.tool_call_id,
            "content": content,
        });
    }

    let tool_calls = msg.tool_calls();
    if !tool_calls.is_empty() {
        let tc_json: Vec<Value> = tool_calls
            .iter()
            .map(|tc| {
                json!({
                    "id": tc.id,
                    "type": "function",
                    "function": {
                        "name": tc.name,
                        "arguments": tc.arguments.to_string(),
                    }
                })
            })
            .collect();
        let text = msg.text();
        return json!({
            "role": role,
            "content": if text.is_empty() { Value::Null } else { Value::String(text) },
            "tool_calls": tc_json,
        });
    }

    json!({ "role": role, "content": msg.text() })
}

// Chat completions response types (internal)

#[derive(Deserialize)]
struct OpenAiChatResponse {
    choices: Vec<OpenAiChoice>,
    usage: Option<OpenAiUsage>,
}

#[derive(Deserialize)]
struct OpenAiChoice {
    message: OpenAiMessage,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct OpenAiMessage {
    content: Option<String>,
    tool_calls: Option<Vec<OpenAiToolCall>>,
}

#[derive(Deserialize)]
struct OpenAiToolCall {
    id: String,
    function: OpenAiFunction,
}

#[derive(Deserialize)]
struct OpenAiFunction {
    name: String,
    arguments: String,
}

#[derive(Deserialize)]
struct OpenAiUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::ToolDefinition;

    #[test]
    fn request_body_carries_tools_and_disables_parallel_calls() {
        let provider = OpenAiProvider::new("openai", "gpt-4o", Some("sk".into()), None);
        let request = ProviderRequest {
            messages: vec![ModelMessage::system("rules"), ModelMessage::user("q")],
            tools: vec![ToolDefinition {
                name: "discover".into(),
                description: "List sources".into(),
                parameters: json!({"type": "object", "properties": {}}),
            }],
        };
        let body = provider.build_request_body(&request);
        assert_eq!(body["model"], "gpt-4o");
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["tools"][0]["function"]["name"], "discover");
        assert_eq!(body["parallel_tool_calls"], false);
        assert!(body.get("response_format").is_none());
        assert!(body.get("temperature").is_none());
    }

    #[test]
    fn tool_call_and_result_messages_use_wire_shape() {
        let call = ModelMessage::assistant_tool_call(AgentToolCall {
            id: "call_1".into(),
            name: "inspect".into(),
            arguments: json!({"source": "A", "table": "public.orders"}),
        });
        let rendered = message_to_openai(&call);
        assert_eq!(rendered["content"], Value::Null);
        assert_eq!(rendered["tool_calls"][0]["id"], "call_1");

        let result = ModelMessage::tool_result("call_1", json!({"columns": []}), false);
        let rendered = message_to_openai(&result);
        assert_eq!(rendered["role"], "tool");
        assert_eq!(rendered["tool_call_id"], "call_1");
        assert_eq!(rendered["content"], r#"{"columns":[]}"#);
    }

    #[test]
    fn factory_requires_openai_key_but_not_local_servers() {
        let config = QuarryConfig::new();
        assert!(matches!(
            OpenAiFactory.create(&config, "openai", "gpt-4o"),
            Err(QuarryError::Authentication(_))
        ));
        assert!(OpenAiFactory.create(&config, "ollama", "llama3.3").is_ok());
        assert!(matches!(
            OpenAiFactory.create(&config, "openai-compatible", "m"),
            Err(QuarryError::Configuration(_))
        ));
    }
}
