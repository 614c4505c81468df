//! Shared setup for the end-to-end chat tests: a real client pointed at a mock server.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use danya_agent::{
    AgentDescriptor, ChatSession, CompressionConfig, ContextMode, Endpoint, MemoryStore,
    OrchestrationMode, OrchestratorConfig, ProviderTransport, Roster, SessionConfig,
};
use danya_ai::{ClientConfig, Credentials, YandexClient};
use serde_json::{Value, json};
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const AGENT_PATH: &str = "/responses";
pub const COMPLETION_PATH: &str = "/foundationModels/v1/completion";
pub const TOKENIZE_PATH: &str = "/foundationModels/v1/tokenize";

pub fn transport(server: &MockServer) -> Arc<ProviderTransport> {
    let config = ClientConfig::new(Credentials::ApiKey("test-key".into()), "folder-1")
        .with_base_url(server.uri())
        .with_timeout(Duration::from_secs(5));
    Arc::new(ProviderTransport::new(YandexClient::new(config).unwrap()))
}

pub fn agent_output(text: &str) -> Value {
    json!({"output": [{"content": [{"text": text, "type": "output_text"}]}], "status": "completed"})
}

pub fn completion_output(text: &str) -> Value {
    json!({
        "result": {
            "alternatives": [{"message": {"role": "assistant", "text": text}, "status": "ALTERNATIVE_STATUS_FINAL"}],
            "usage": {"inputTextTokens": "40", "completionTokens": "3", "totalTokens": "43"},
            "modelVersion": "23.10.2024"
        }
    })
}

/// Every agent call answers `text`
pub async fn mount_agent_reply(server: &MockServer, text: &str) {
    Mock::given(method("POST"))
        .and(path(AGENT_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(agent_output(text)))
        .mount(server)
        .await;
}

/// Agent calls for one prompt id answer with `response`
pub async fn mount_agent_for(server: &MockServer, prompt_id: &str, response: ResponseTemplate) {
    Mock::given(method("POST"))
        .and(path(AGENT_PATH))
        .and(body_partial_json(json!({"prompt": {"id": prompt_id}})))
        .respond_with(response)
        .mount(server)
        .await;
}

pub async fn mount_summary(server: &MockServer, summary: &str) {
    Mock::given(method("POST"))
        .and(path(COMPLETION_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion_output(summary)))
        .mount(server)
        .await;
}

pub async fn mount_tokenizer(server: &MockServer, count: usize) {
    let tokens: Vec<Value> = (0..count)
        .map(|i| json!({"id": i.to_string(), "text": "t", "special": false}))
        .collect();
    Mock::given(method("POST"))
        .and(path(TOKENIZE_PATH))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"tokens": tokens, "modelVersion": "x"})),
        )
        .mount(server)
        .await;
}

pub fn single_agent_config() -> SessionConfig {
    SessionConfig {
        orchestrator: OrchestratorConfig {
            mode: OrchestrationMode::Single {
                endpoint: Endpoint::Agent,
                context: ContextMode::Full,
            },
            ..Default::default()
        },
        compression: CompressionConfig::default()
            .with_model_uri("gpt://folder-1/yandexgpt-lite/latest"),
        ..Default::default()
    }
}

pub fn single_agent_session(server: &MockServer, config: SessionConfig) -> ChatSession {
    let roster = Roster::new(vec![AgentDescriptor::new(
        "GigaDanya",
        "agent-main",
        "yandexgpt-lite",
    )])
    .unwrap();
    ChatSession::new(config, roster, transport(server), Arc::new(MemoryStore::new()))
}

pub fn fan_out_session(server: &MockServer, prompt_ids: &[&str]) -> ChatSession {
    let roster = Roster::new(
        prompt_ids
            .iter()
            .map(|id| AgentDescriptor::new(format!("Agent {id}"), *id, "yandexgpt"))
            .collect(),
    )
    .unwrap();
    let config = SessionConfig {
        orchestrator: OrchestratorConfig {
            mode: OrchestrationMode::FanOut,
            ..Default::default()
        },
        ..Default::default()
    };
    ChatSession::new(config, roster, transport(server), Arc::new(MemoryStore::new()))
}
