//! Wire types for the completion, agent and tokenize endpoints

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

use crate::error::{Error, Result};

/// Message role as sent on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

// --- Requests ---

/// One message in a completion request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionMessage {
    pub role: Role,
    pub text: String,
}

impl CompletionMessage {
    pub fn new(role: Role, text: impl Into<String>) -> Self {
        Self {
            role,
            text: text.into(),
        }
    }
}

/// Sampling options for the completion endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionOptions {
    pub stream: bool,
    pub temperature: f64,
    pub max_tokens: u32,
}

impl Default for CompletionOptions {
    fn default() -> Self {
        Self {
            stream: false,
            temperature: 0.6,
            max_tokens: 2000,
        }
    }
}

/// Request body for `foundationModels/v1/completion`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionRequest {
    pub model_uri: String,
    pub completion_options: CompletionOptions,
    pub messages: Vec<CompletionMessage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub json_object_mode: Option<bool>,
}

/// Prompt reference for the agent endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptRef {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variables: Option<HashMap<String, String>>,
}

/// Request body for the agent `responses` endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentRequest {
    pub prompt: PromptRef,
    pub input: String,
    pub stream: bool,
}

impl AgentRequest {
    pub fn new(agent_id: impl Into<String>, input: impl Into<String>) -> Self {
        Self {
            prompt: PromptRef {
                id: agent_id.into(),
                variables: None,
            },
            input: input.into(),
            stream: false,
        }
    }
}

/// Request body for `foundationModels/v1/tokenize`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenizeRequest {
    pub model_uri: String,
    pub text: String,
}

/// Response of the tokenize endpoint; only the token count matters
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenizeResponse {
    #[serde(default)]
    pub tokens: Vec<Value>,
    #[serde(default)]
    pub model_version: Option<String>,
}

impl TokenizeResponse {
    pub fn count(&self) -> u32 {
        self.tokens.len() as u32
    }
}

// --- Responses ---

/// Explicit error object carried by a 2xx agent response
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProviderErrorBody {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub code: Option<Value>,
}

impl ProviderErrorBody {
    /// Error code as text; numeric codes are rendered as digits
    pub fn code_string(&self) -> String {
        match &self.code {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Null) | None => String::new(),
            Some(other) => other.to_string(),
        }
    }

    pub fn message_string(&self) -> String {
        self.message
            .clone()
            .unwrap_or_else(|| "unknown error".to_string())
    }

    pub fn to_error(&self) -> Error {
        Error::api(self.code_string(), self.message_string())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AgentContent {
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default, rename = "type")]
    pub content_type: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AgentOutput {
    #[serde(default)]
    pub content: Option<Vec<AgentContent>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AlternativeMessage {
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Alternative {
    #[serde(default)]
    pub message: Option<AlternativeMessage>,
    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionResult {
    #[serde(default, deserialize_with = "null_as_default")]
    pub alternatives: Vec<Alternative>,
    #[serde(default)]
    pub usage: Option<Value>,
    #[serde(default)]
    pub model_version: Option<String>,
}

impl CompletionResult {
    fn first_text(&self) -> Option<&str> {
        self.alternatives
            .first()
            .and_then(|a| a.message.as_ref())
            .and_then(|m| m.text.as_deref())
    }
}

/// Treat an explicit `null` like a missing field
fn null_as_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// The "agent" response shape: `output[0].content[0].text`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AgentShape {
    #[serde(default, deserialize_with = "null_as_default")]
    pub output: Vec<AgentOutput>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub error: Option<ProviderErrorBody>,
    #[serde(default)]
    pub usage: Option<Value>,
    /// Some deployments also echo a completion-style result
    #[serde(default)]
    pub result: Option<CompletionResult>,
}

impl AgentShape {
    fn first_text(&self) -> Option<&str> {
        self.output
            .first()
            .and_then(|o| o.content.as_ref())
            .and_then(|c| c.first())
            .and_then(|c| c.text.as_deref())
    }
}

/// The "completion" response shape: `result.alternatives[0].message.text`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CompletionShape {
    pub result: CompletionResult,
}

/// A decoded provider response in one of the two supported shapes
#[derive(Debug, Clone)]
pub enum ProviderReply {
    Agent(AgentShape),
    Completion(CompletionShape),
}

impl ProviderReply {
    /// Decode a raw response body, trying the agent shape first
    pub fn decode(body: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(body)?;
        Self::from_value(value)
    }

    /// Decode from an already-parsed JSON value
    pub fn from_value(value: Value) -> Result<Self> {
        let Some(obj) = value.as_object() else {
            return Err(Error::UnexpectedResponse(
                "response body is not a JSON object".to_string(),
            ));
        };

        let has = |key: &str| obj.get(key).is_some_and(|v| !v.is_null());

        if has("output") || has("error") {
            return Ok(ProviderReply::Agent(serde_json::from_value(value)?));
        }
        if has("result") {
            return Ok(ProviderReply::Completion(serde_json::from_value(value)?));
        }

        Err(Error::UnexpectedResponse(
            "neither `output` nor `result` present".to_string(),
        ))
    }

    /// Provider-reported error; takes precedence over any partial output
    pub fn error(&self) -> Option<&ProviderErrorBody> {
        match self {
            ProviderReply::Agent(a) => a.error.as_ref(),
            ProviderReply::Completion(_) => None,
        }
    }

    /// Normalized reply text. The agent output wins when both are populated.
    pub fn text(&self) -> Option<&str> {
        match self {
            ProviderReply::Agent(a) => a
                .first_text()
                .filter(|t| !t.is_empty())
                .or_else(|| a.result.as_ref().and_then(|r| r.first_text())),
            ProviderReply::Completion(c) => c.result.first_text(),
        }
    }

    /// Usage counts reported by the provider, if any
    pub fn usage(&self) -> Option<TokenUsage> {
        match self {
            ProviderReply::Agent(a) => a
                .usage
                .as_ref()
                .and_then(TokenUsage::from_value)
                .or_else(|| {
                    a.result
                        .as_ref()
                        .and_then(|r| r.usage.as_ref())
                        .and_then(TokenUsage::from_value)
                }),
            ProviderReply::Completion(c) => {
                c.result.usage.as_ref().and_then(TokenUsage::from_value)
            }
        }
    }
}

// --- Usage ---

const INPUT_ALIASES: &[&str] = &[
    "input_tokens",
    "inputTokens",
    "inputTextTokens",
    "input_text_tokens",
    "prompt_tokens",
    "promptTokens",
];

const OUTPUT_ALIASES: &[&str] = &[
    "output_tokens",
    "outputTokens",
    "completionTokens",
    "completion_tokens",
];

const TOTAL_ALIASES: &[&str] = &["total_tokens", "totalTokens"];

/// Token counts reported by a provider
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input: u32,
    pub output: u32,
    pub total: u32,
}

impl TokenUsage {
    /// Read a usage object, accepting snake_case and camelCase spellings
    /// and numbers encoded as strings. Returns None if no known field is present.
    pub fn from_value(value: &Value) -> Option<Self> {
        let obj = value.as_object()?;
        let lookup = |aliases: &[&str]| -> Option<u32> {
            aliases
                .iter()
                .find_map(|k| obj.get(*k).and_then(lenient_u32))
        };

        let input = lookup(INPUT_ALIASES);
        let output = lookup(OUTPUT_ALIASES);
        let total = lookup(TOTAL_ALIASES);

        if input.is_none() && output.is_none() && total.is_none() {
            return None;
        }

        let input = input.unwrap_or(0);
        let output = output.unwrap_or(0);
        Some(Self {
            input,
            output,
            total: total.unwrap_or(input.saturating_add(output)),
        })
    }

    /// All-zero usage is a known quirk of the agent endpoint
    pub fn is_zero(&self) -> bool {
        self.input == 0 && self.output == 0 && self.total == 0
    }
}

fn lenient_u32(value: &Value) -> Option<u32> {
    match value {
        Value::Number(n) => n.as_u64().map(|v| v.min(u32::MAX as u64) as u32),
        Value::String(s) => s.trim().parse::<u32>().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_completion_request_wire_names() {
        let req = CompletionRequest {
            model_uri: "gpt://folder/yandexgpt-lite/latest".into(),
            completion_options: CompletionOptions {
                stream: false,
                temperature: 0.3,
                max_tokens: 500,
            },
            messages: vec![CompletionMessage::new(Role::User, "hi")],
            json_object_mode: None,
        };
        let v = serde_json::to_value(&req).unwrap();
        assert_eq!(v["modelUri"], "gpt://folder/yandexgpt-lite/latest");
        assert_eq!(v["completionOptions"]["maxTokens"], 500);
        assert_eq!(v["messages"][0]["role"], "user");
        assert!(v.get("jsonObjectMode").is_none());
    }

    #[test]
    fn test_json_object_mode_serialized_when_set() {
        let req = CompletionRequest {
            model_uri: "m".into(),
            completion_options: CompletionOptions::default(),
            messages: vec![],
            json_object_mode: Some(true),
        };
        let v = serde_json::to_value(&req).unwrap();
        assert_eq!(v["jsonObjectMode"], true);
    }

    #[test]
    fn test_agent_request_shape() {
        let v = serde_json::to_value(AgentRequest::new("agent-1", "Hello")).unwrap();
        assert_eq!(v, json!({"prompt": {"id": "agent-1"}, "input": "Hello", "stream": false}));
    }

    #[test]
    fn test_decode_agent_shape() {
        let reply =
            ProviderReply::decode(r#"{"output":[{"content":[{"text":"Hi there","type":"output_text"}]}]}"#)
                .unwrap();
        assert!(matches!(reply, ProviderReply::Agent(_)));
        assert_eq!(reply.text(), Some("Hi there"));
        assert!(reply.usage().is_none());
        assert!(reply.error().is_none());
    }

    #[test]
    fn test_decode_completion_shape() {
        let body = json!({
            "result": {
                "alternatives": [{"message": {"role": "assistant", "text": "Hello"}, "status": "ALTERNATIVE_STATUS_FINAL"}],
                "usage": {"inputTextTokens": "12", "completionTokens": "3", "totalTokens": "15"},
                "modelVersion": "23.10.2024"
            }
        });
        let reply = ProviderReply::from_value(body).unwrap();
        assert!(matches!(reply, ProviderReply::Completion(_)));
        assert_eq!(reply.text(), Some("Hello"));
        assert_eq!(
            reply.usage(),
            Some(TokenUsage {
                input: 12,
                output: 3,
                total: 15
            })
        );
    }

    #[test]
    fn test_agent_shape_preferred_over_echoed_result() {
        let body = json!({
            "output": [{"content": [{"text": "agent text"}]}],
            "result": {"alternatives": [{"message": {"text": "completion text"}}]}
        });
        let reply = ProviderReply::from_value(body).unwrap();
        assert_eq!(reply.text(), Some("agent text"));
    }

    #[test]
    fn test_agent_shape_falls_back_to_result_text() {
        let body = json!({
            "output": [],
            "result": {"alternatives": [{"message": {"text": "completion text"}}]}
        });
        let reply = ProviderReply::from_value(body).unwrap();
        assert_eq!(reply.text(), Some("completion text"));
    }

    #[test]
    fn test_error_field_decodes_as_agent() {
        let body = json!({"error": {"message": "quota exceeded", "code": 429}});
        let reply = ProviderReply::from_value(body).unwrap();
        let err = reply.error().unwrap();
        assert_eq!(err.code_string(), "429");
        assert_eq!(err.message_string(), "quota exceeded");
    }

    #[test]
    fn test_null_output_with_error_decodes_as_agent() {
        let body = json!({
            "output": null,
            "status": "failed",
            "error": {"message": "quota exceeded", "code": "429"}
        });
        let reply = ProviderReply::from_value(body).unwrap();
        assert_eq!(reply.error().unwrap().message_string(), "quota exceeded");
        assert_eq!(reply.text(), None);
    }

    #[test]
    fn test_null_alternatives_decode_empty() {
        let reply = ProviderReply::from_value(json!({"result": {"alternatives": null}})).unwrap();
        assert_eq!(reply.text(), None);
    }

    #[test]
    fn test_usage_total_saturates() {
        let usage =
            TokenUsage::from_value(&json!({"input_tokens": 4294967295u64, "output_tokens": 1}))
                .unwrap();
        assert_eq!(usage.total, u32::MAX);
    }

    #[test]
    fn test_unknown_shape_rejected() {
        assert!(matches!(
            ProviderReply::decode(r#"{"foo": 1}"#),
            Err(Error::UnexpectedResponse(_))
        ));
        assert!(matches!(
            ProviderReply::decode("[1,2]"),
            Err(Error::UnexpectedResponse(_))
        ));
        assert!(matches!(ProviderReply::decode("not json"), Err(Error::Json(_))));
    }

    #[test]
    fn test_usage_aliases() {
        let snake = json!({"input_tokens": 10, "output_tokens": 5, "total_tokens": 15});
        let camel = json!({"inputTokens": 10, "outputTokens": 5});
        let prompt = json!({"prompt_tokens": "10", "completion_tokens": "5"});
        for v in [snake, camel, prompt] {
            let u = TokenUsage::from_value(&v).unwrap();
            assert_eq!((u.input, u.output, u.total), (10, 5, 15));
        }
    }

    #[test]
    fn test_usage_without_known_fields_is_none() {
        assert!(TokenUsage::from_value(&json!({"foo": 1})).is_none());
        assert!(TokenUsage::from_value(&json!("12")).is_none());
    }

    #[test]
    fn test_usage_all_zero() {
        let u = TokenUsage::from_value(&json!({"input_tokens": 0, "output_tokens": 0})).unwrap();
        assert!(u.is_zero());
    }

    #[test]
    fn test_tokenize_count() {
        let r: TokenizeResponse =
            serde_json::from_value(json!({"tokens": [{"id": "1"}, {"id": "2"}, {"id": "3"}]})).unwrap();
        assert_eq!(r.count(), 3);
    }
}
