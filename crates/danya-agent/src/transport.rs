//! Transport abstraction between the engine and the provider endpoints

use async_trait::async_trait;
use danya_ai::{
    AgentRequest, CompletionRequest, Error, ProviderReply, Result, TokenizeRequest, YandexClient,
};

/// An outbound call in one of the two supported request shapes
#[derive(Debug, Clone)]
pub enum ProviderRequest {
    Completion(CompletionRequest),
    Agent(AgentRequest),
}

impl ProviderRequest {
    /// Short label for logs
    pub fn kind(&self) -> &'static str {
        match self {
            ProviderRequest::Completion(_) => "completion",
            ProviderRequest::Agent(_) => "agent",
        }
    }
}

/// Sends provider requests. Implementations surface HTTP and network
/// failures as typed errors and never panic on bad input.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send a request and decode the response into one of the known shapes
    async fn send(&self, request: ProviderRequest) -> Result<ProviderReply>;

    /// Count tokens with the remote tokenizer
    async fn tokenize(&self, _request: TokenizeRequest) -> Result<u32> {
        Err(Error::Unsupported("tokenize".to_string()))
    }
}

/// Transport backed by the HTTP client
pub struct ProviderTransport {
    client: YandexClient,
}

impl ProviderTransport {
    pub fn new(client: YandexClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Transport for ProviderTransport {
    async fn send(&self, request: ProviderRequest) -> Result<ProviderReply> {
        tracing::debug!(kind = request.kind(), "sending provider request");
        match request {
            ProviderRequest::Completion(req) => self.client.complete(&req).await,
            ProviderRequest::Agent(req) => self.client.respond(&req).await,
        }
    }

    async fn tokenize(&self, request: TokenizeRequest) -> Result<u32> {
        self.client.tokenize(&request).await
    }
}
