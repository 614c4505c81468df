mod common;

use common::*;
use danya_agent::{ChatEvent, SUMMARY_MARKER, TurnOutcome, TurnResult};
use danya_ai::Role;
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn completed(outcome: TurnOutcome) -> TurnResult {
    match outcome {
        TurnOutcome::Completed(result) => result,
        other => panic!("expected completed turn, got {other:?}"),
    }
}

#[tokio::test]
async fn single_agent_plain_reply() {
    let server = MockServer::start().await;
    mount_agent_reply(&server, "Hi there").await;
    mount_tokenizer(&server, 3).await;

    let mut config = single_agent_config();
    config.tokenizer_model_uri = Some("gpt://folder-1/yandexgpt-lite/latest".into());
    let session = single_agent_session(&server, config);

    let result = completed(session.send_message("Hello").await);

    assert_eq!(result.error, None);
    assert_eq!(result.replies.len(), 1);
    assert_eq!(result.replies[0].text.as_deref(), Some("Hi there"));
    assert_eq!(result.replies[0].image_url, None);

    // No usage block: both sides counted by the tokenizer
    let usage = session.usage().await;
    assert_eq!(usage.total_input_tokens, 3);
    assert_eq!(usage.total_output_tokens, 3);
    assert_eq!(usage.compression_count, 0);
}

#[tokio::test]
async fn single_agent_tokenizer_down_uses_estimate() {
    let server = MockServer::start().await;
    mount_agent_reply(&server, "Hi there").await;
    Mock::given(method("POST"))
        .and(path(TOKENIZE_PATH))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let mut config = single_agent_config();
    config.tokenizer_model_uri = Some("gpt://folder-1/yandexgpt-lite/latest".into());
    let session = single_agent_session(&server, config);
    completed(session.send_message("Hello").await);

    let usage = session.usage().await;
    assert_eq!(usage.total_input_tokens, u64::from(danya_agent::estimate_tokens("User: Hello")));
    assert_eq!(usage.total_output_tokens, u64::from(danya_agent::estimate_tokens("Hi there")));
}

#[tokio::test]
async fn reply_with_embedded_image() {
    let server = MockServer::start().await;
    mount_agent_reply(&server, "Look at this https://example.com/pic.png right here").await;
    let session = single_agent_session(&server, single_agent_config());

    let result = completed(session.send_message("Show me a picture").await);

    assert_eq!(result.replies.len(), 2);
    assert_eq!(result.replies[0].text.as_deref(), Some("Look at this  right here"));
    assert_eq!(result.replies[1].image_url.as_deref(), Some("https://example.com/pic.png"));

    let messages = session.messages().await;
    assert_eq!(messages.len(), 3);
    assert!(messages[0].is_from_user);
    assert_eq!(messages[2].image_url.as_deref(), Some("https://example.com/pic.png"));
    assert_eq!(messages[2].agent_name.as_deref(), Some("GigaDanya"));
}

#[tokio::test]
async fn history_compresses_after_tenth_turn() {
    let server = MockServer::start().await;
    mount_agent_reply(
        &server,
        "This is a fairly long assistant answer that repeats the question in detail",
    )
    .await;
    mount_summary(&server, "Short summary").await;
    let session = single_agent_session(&server, single_agent_config());
    let mut events = session.subscribe();

    for i in 0..4 {
        let result = completed(
            session
                .send_message(&format!("Question {i}: tell me something long and interesting"))
                .await,
        );
        assert!(!result.compressed);
    }
    assert_eq!(session.history().await.len(), 8);

    let result = completed(session.send_message("Question 4: one more please").await);
    assert!(result.compressed);

    let history = session.history().await;
    assert_eq!(history.len(), 5);
    assert_eq!(history[0].role(), Role::System);
    assert!(history[0].text().starts_with(SUMMARY_MARKER));
    assert!(history[0].text().ends_with("Short summary"));
    assert_eq!(history[3].text(), "Question 4: one more please");
    assert_eq!(history[4].role(), Role::Assistant);

    let usage = session.usage().await;
    assert_eq!(usage.compression_count, 1);
    assert!(usage.saved_tokens > 0);

    let mut started = false;
    let mut finished = false;
    while let Ok(event) = events.try_recv() {
        match event {
            ChatEvent::CompressionStart { turns } => {
                assert_eq!(turns, 6);
                started = true;
            }
            ChatEvent::CompressionEnd { compressed, .. } => finished = compressed,
            _ => {}
        }
    }
    assert!(started && finished);

    // The next full context starts with the summary
    completed(session.send_message("And now?").await);
    let requests = server.received_requests().await.unwrap();
    let last_agent_call = requests
        .iter()
        .rev()
        .find(|r| r.url.path() == AGENT_PATH)
        .unwrap();
    let body: serde_json::Value = serde_json::from_slice(&last_agent_call.body).unwrap();
    assert!(body["input"].as_str().unwrap().starts_with(SUMMARY_MARKER));
}

#[tokio::test]
async fn failed_summary_keeps_history() {
    let server = MockServer::start().await;
    mount_agent_reply(&server, "ok").await;
    Mock::given(method("POST"))
        .and(path(COMPLETION_PATH))
        .respond_with(ResponseTemplate::new(503).set_body_string("unavailable"))
        .mount(&server)
        .await;
    let session = single_agent_session(&server, single_agent_config());

    for i in 0..5 {
        let result = completed(session.send_message(&format!("message {i}")).await);
        assert_eq!(result.error, None);
        assert!(!result.compressed);
    }

    assert_eq!(session.history().await.len(), 10);
    assert_eq!(session.usage().await.compression_count, 0);
}

#[tokio::test]
async fn provider_error_field_surfaces() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(AGENT_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "error": {"message": "quota exceeded", "code": "429"}
        })))
        .mount(&server)
        .await;
    let session = single_agent_session(&server, single_agent_config());

    let result = completed(session.send_message("Hello").await);

    assert!(result.replies.is_empty());
    let error = result.error.unwrap();
    assert!(error.contains("quota exceeded"));
    // Only the user message was added
    assert_eq!(session.messages().await.len(), 1);
    assert!(!session.handle().is_loading());
}

#[tokio::test]
async fn unauthorized_maps_to_auth_message() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(AGENT_PATH))
        .respond_with(ResponseTemplate::new(401).set_body_string("bad key"))
        .mount(&server)
        .await;
    let session = single_agent_session(&server, single_agent_config());

    let result = completed(session.send_message("Hello").await);
    assert_eq!(
        result.error.as_deref(),
        Some("Authorization error. Check your API key and folder id.")
    );
}

#[tokio::test]
async fn fan_out_isolates_failing_agent() {
    let server = MockServer::start().await;
    mount_agent_for(
        &server,
        "agent-a",
        ResponseTemplate::new(200).set_body_json(json!({
            "output": [{"content": [{"text": "from a"}]}],
            "usage": {"input_tokens": 10, "output_tokens": 2, "total_tokens": 12}
        })),
    )
    .await;
    mount_agent_for(&server, "agent-b", ResponseTemplate::new(500).set_body_string("boom")).await;
    mount_agent_for(
        &server,
        "agent-c",
        ResponseTemplate::new(200).set_body_json(json!({
            "output": [{"content": [{"text": "from c"}]}],
            "usage": {"inputTokens": 20, "outputTokens": 4, "totalTokens": 24}
        })),
    )
    .await;
    let session = fan_out_session(&server, &["agent-a", "agent-b", "agent-c"]);

    let result = completed(session.send_message("Hello everyone").await);

    assert_eq!(result.replies.len(), 3);
    assert_eq!(result.replies[0].text.as_deref(), Some("from a"));
    assert_eq!(result.replies[2].text.as_deref(), Some("from c"));
    assert_eq!(
        result.replies[1].agent.as_ref().unwrap().remote_id,
        "agent-b"
    );

    let report = result.report.unwrap();
    assert_eq!(report.rows.len(), 3);
    assert!(!report.rows[0].is_error());
    assert!(report.rows[1].is_error());
    assert!(!report.rows[2].is_error());
    assert_eq!(report.total_input_tokens, 30);
    assert_eq!(report.total_output_tokens, 6);

    // Fan-out keeps its own report and leaves history and usage alone
    assert!(session.history().await.is_empty());
    assert_eq!(session.usage().await.total_input_tokens, 0);

    // Every agent got only the latest user text
    for request in server.received_requests().await.unwrap() {
        let body: serde_json::Value = serde_json::from_slice(&request.body).unwrap();
        assert_eq!(body["input"], "Hello everyone");
    }
}
