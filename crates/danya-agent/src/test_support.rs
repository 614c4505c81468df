//! Scripted transport shared by the unit tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use danya_ai::{Error, ProviderReply, Result, TokenizeRequest};
use parking_lot::Mutex;
use serde_json::{Value, json};

use crate::transport::{ProviderRequest, Transport};

/// A failure the scripted transport should raise
#[derive(Debug, Clone)]
pub enum Failure {
    Connect,
    Timeout,
    Status(u16),
}

impl Failure {
    fn to_error(&self) -> Error {
        match self {
            Failure::Connect => Error::Connect("connection refused".into()),
            Failure::Timeout => Error::Timeout("deadline elapsed".into()),
            Failure::Status(code) => Error::from_status(*code, "scripted failure"),
        }
    }
}

#[derive(Debug, Clone)]
pub enum Step {
    Body(Value),
    Fail(Failure),
}

pub fn agent_body(text: &str) -> Value {
    json!({"output": [{"content": [{"text": text, "type": "output_text"}]}]})
}

pub fn agent_body_with_usage(text: &str, input: u32, output: u32) -> Value {
    json!({
        "output": [{"content": [{"text": text}]}],
        "usage": {"input_tokens": input, "output_tokens": output, "total_tokens": input + output}
    })
}

pub fn completion_body(text: &str, input: u32, output: u32) -> Value {
    json!({
        "result": {
            "alternatives": [{"message": {"role": "assistant", "text": text}, "status": "ALTERNATIVE_STATUS_FINAL"}],
            "usage": {"inputTextTokens": input.to_string(), "completionTokens": output.to_string(), "totalTokens": (input + output).to_string()},
            "modelVersion": "test"
        }
    })
}

/// Transport that replays scripted steps in order and records requests
pub struct ScriptedTransport {
    steps: Mutex<VecDeque<Step>>,
    requests: Mutex<Vec<ProviderRequest>>,
    tokenize_count: Option<u32>,
    tokenize_calls: AtomicUsize,
    delay: Option<Duration>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self {
            steps: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
            tokenize_count: None,
            tokenize_calls: AtomicUsize::new(0),
            delay: None,
        }
    }

    pub fn with_steps(steps: Vec<Step>) -> Self {
        let t = Self::new();
        t.steps.lock().extend(steps);
        t
    }

    pub fn with_tokenize_count(mut self, count: u32) -> Self {
        self.tokenize_count = Some(count);
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn push(&self, step: Step) {
        self.steps.lock().push_back(step);
    }

    pub fn requests(&self) -> Vec<ProviderRequest> {
        self.requests.lock().clone()
    }

    pub fn tokenize_calls(&self) -> usize {
        self.tokenize_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, request: ProviderRequest) -> Result<ProviderReply> {
        self.requests.lock().push(request);
        let step = self
            .steps
            .lock()
            .pop_front()
            .unwrap_or_else(|| Step::Body(agent_body("done")));
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        match step {
            Step::Body(value) => ProviderReply::from_value(value),
            Step::Fail(failure) => Err(failure.to_error()),
        }
    }

    async fn tokenize(&self, _request: TokenizeRequest) -> Result<u32> {
        self.tokenize_calls.fetch_add(1, Ordering::SeqCst);
        self.tokenize_count
            .ok_or_else(|| Error::Unsupported("tokenize".into()))
    }
}
