//! Yandex Foundation Models and AI Studio Agent API client

use std::time::Duration;

use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use serde::Serialize;

use crate::{
    error::{Error, Result},
    types::{AgentRequest, CompletionRequest, ProviderReply, TokenizeRequest, TokenizeResponse},
};

/// Base URL of the Foundation Models API (completion, tokenize)
pub const DEFAULT_LLM_BASE_URL: &str = "https://llm.api.cloud.yandex.net";
/// Base URL of the AI Studio Agent API (responses)
pub const DEFAULT_AGENT_BASE_URL: &str = "https://rest-assistant.api.cloud.yandex.net/v1";

const COMPLETION_PATH: &str = "/foundationModels/v1/completion";
const TOKENIZE_PATH: &str = "/foundationModels/v1/tokenize";
const RESPONSES_PATH: &str = "/responses";

/// How the client authenticates
#[derive(Clone)]
pub enum Credentials {
    /// Service account API key, sent as `Api-Key <key>`
    ApiKey(String),
    /// Short-lived IAM token, sent as `Bearer <token>`
    IamToken(String),
}

impl Credentials {
    fn header_value(&self) -> String {
        match self {
            Credentials::ApiKey(key) => format!("Api-Key {}", key),
            Credentials::IamToken(token) => format!("Bearer {}", token),
        }
    }

    fn is_blank(&self) -> bool {
        match self {
            Credentials::ApiKey(s) | Credentials::IamToken(s) => s.trim().is_empty(),
        }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Credentials::ApiKey(_) => f.write_str("ApiKey(***)"),
            Credentials::IamToken(_) => f.write_str("IamToken(***)"),
        }
    }
}

/// Client options
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub credentials: Credentials,
    pub folder_id: String,
    pub llm_base_url: String,
    pub agent_base_url: String,
    pub timeout: Duration,
}

impl ClientConfig {
    pub fn new(credentials: Credentials, folder_id: impl Into<String>) -> Self {
        Self {
            credentials,
            folder_id: folder_id.into(),
            llm_base_url: DEFAULT_LLM_BASE_URL.to_string(),
            agent_base_url: DEFAULT_AGENT_BASE_URL.to_string(),
            timeout: Duration::from_secs(60),
        }
    }

    /// Point both endpoints at one base URL (used against mock servers)
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        let base = base_url.into();
        self.llm_base_url = base.clone();
        self.agent_base_url = base;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// HTTP client for the three endpoints
pub struct YandexClient {
    client: reqwest::Client,
    config: ClientConfig,
}

impl YandexClient {
    pub fn new(config: ClientConfig) -> Result<Self> {
        if config.credentials.is_blank() {
            return Err(Error::InvalidApiKey);
        }
        if config.folder_id.trim().is_empty() {
            return Err(Error::InvalidConfig("folder id is empty".to_string()));
        }

        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.timeout)
            .build()?;

        Ok(Self { client, config })
    }

    pub fn folder_id(&self) -> &str {
        &self.config.folder_id
    }

    /// Call the completion endpoint
    pub async fn complete(&self, request: &CompletionRequest) -> Result<ProviderReply> {
        let url = format!("{}{}", self.config.llm_base_url, COMPLETION_PATH);
        let body = self.post(&url, request).await?;
        ProviderReply::decode(&body)
    }

    /// Call the agent responses endpoint
    pub async fn respond(&self, request: &AgentRequest) -> Result<ProviderReply> {
        let url = format!("{}{}", self.config.agent_base_url, RESPONSES_PATH);
        let body = self.post(&url, request).await?;
        ProviderReply::decode(&body)
    }

    /// Count tokens for a text
    pub async fn tokenize(&self, request: &TokenizeRequest) -> Result<u32> {
        let url = format!("{}{}", self.config.llm_base_url, TOKENIZE_PATH);
        let body = self.post(&url, request).await?;
        let parsed: TokenizeResponse = serde_json::from_str(&body)?;
        Ok(parsed.count())
    }

    fn headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let auth = HeaderValue::from_str(&self.config.credentials.header_value())
            .map_err(|_| Error::InvalidApiKey)?;
        headers.insert(AUTHORIZATION, auth);
        let folder = HeaderValue::from_str(&self.config.folder_id)
            .map_err(|e| Error::InvalidConfig(format!("folder id: {}", e)))?;
        headers.insert("x-folder-id", folder);
        Ok(headers)
    }

    async fn post<T: Serialize + ?Sized>(&self, url: &str, body: &T) -> Result<String> {
        tracing::debug!(url, "POST");

        let response = self
            .client
            .post(url)
            .headers(self.headers()?)
            .json(body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;
        tracing::debug!(url, status = status.as_u16(), bytes = text.len(), "response");

        if !status.is_success() {
            return Err(Error::from_status(status.as_u16(), text));
        }
        Ok(text)
    }
}
