//! Configuration file support

use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, bail};
use danya_agent::{
    AgentDescriptor, CompressionConfig, ContextMode, Endpoint, OrchestrationMode, ResponseFormat,
};
use danya_ai::{ClientConfig, Credentials};
use serde::{Deserialize, Serialize};

/// Display name of the agent built from `YANDEX_AGENT_ID`
const DEFAULT_AGENT_NAME: &str = "GigaDanya";

/// Configuration for danya
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// `single` or `fan-out`
    pub mode: Option<String>,
    /// Single-agent endpoint
    pub endpoint: Option<Endpoint>,
    /// Single-agent context
    pub context: Option<ContextMode>,
    /// Response format
    pub format: Option<ResponseFormat>,
    /// Model for the tokenize fallback
    pub tokenizer_model_uri: Option<String>,
    /// Where chat data is kept
    pub data_dir: Option<String>,
    pub greeting: Option<String>,
    pub cleared_greeting: Option<String>,
    /// Credentials (alternative to environment variables)
    pub auth: AuthSettings,
    pub network: NetworkSettings,
    pub compression: CompressionSettings,
    pub agents: Vec<AgentDescriptor>,
}

/// Credential configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthSettings {
    pub api_key: Option<String>,
    pub iam_token: Option<String>,
    pub folder_id: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkSettings {
    pub llm_base_url: Option<String>,
    pub agent_base_url: Option<String>,
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CompressionSettings {
    pub enabled: Option<bool>,
    pub threshold: Option<usize>,
    pub retention: Option<usize>,
    pub temperature: Option<f64>,
    pub max_tokens: Option<u32>,
    pub model_uri: Option<String>,
}

impl Config {
    /// Get the config directory
    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("danya")
    }

    /// Get the config file path
    pub fn config_path() -> PathBuf {
        // Check for DANYA_CONFIG_PATH env var first
        if let Ok(path) = std::env::var("DANYA_CONFIG_PATH") {
            return PathBuf::from(path);
        }
        Self::config_dir().join("config.toml")
    }

    /// Load config from file
    pub fn load() -> Self {
        let path = Self::config_path();
        if !path.exists() {
            return Self::default();
        }

        match fs::read_to_string(&path) {
            Ok(content) => match toml::from_str(&content) {
                Ok(config) => config,
                Err(e) => {
                    eprintln!("Warning: Failed to parse config file: {}", e);
                    Self::default()
                }
            },
            Err(e) => {
                eprintln!("Warning: Failed to read config file: {}", e);
                Self::default()
            }
        }
    }

    /// Create a config file with the example content if it doesn't exist
    pub fn init() -> std::io::Result<PathBuf> {
        let path = Self::config_path();
        if path.exists() {
            return Ok(path);
        }
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }
        fs::write(&path, example_config())?;
        Ok(path)
    }

    /// Directory for messages, history and usage
    pub fn data_dir(&self) -> PathBuf {
        match &self.data_dir {
            Some(dir) => PathBuf::from(dir),
            None => dirs::data_local_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("danya"),
        }
    }

    /// Credentials from config, then env. An API key wins over an IAM token.
    pub fn credentials(&self) -> Option<Credentials> {
        let pick = |configured: &Option<String>, var: &str| {
            configured
                .clone()
                .or_else(|| std::env::var(var).ok())
                .filter(|v| !v.trim().is_empty())
        };

        if let Some(key) = pick(&self.auth.api_key, "YANDEX_API_KEY") {
            return Some(Credentials::ApiKey(key));
        }
        pick(&self.auth.iam_token, "YANDEX_IAM_TOKEN").map(Credentials::IamToken)
    }

    pub fn folder_id(&self) -> Option<String> {
        self.auth
            .folder_id
            .clone()
            .or_else(|| std::env::var("YANDEX_FOLDER_ID").ok())
            .filter(|v| !v.trim().is_empty())
    }

    pub fn client_config(&self) -> anyhow::Result<ClientConfig> {
        let credentials = self
            .credentials()
            .context("no credentials: set YANDEX_API_KEY or YANDEX_IAM_TOKEN, or [auth] in the config")?;
        let folder_id = self
            .folder_id()
            .context("no folder id: set YANDEX_FOLDER_ID or auth.folder_id in the config")?;

        let mut config = ClientConfig::new(credentials, folder_id);
        if let Some(url) = &self.network.llm_base_url {
            config.llm_base_url = url.clone();
        }
        if let Some(url) = &self.network.agent_base_url {
            config.agent_base_url = url.clone();
        }
        if let Some(secs) = self.network.timeout_secs {
            config = config.with_timeout(Duration::from_secs(secs));
        }
        Ok(config)
    }

    /// Orchestration mode; `cli_mode` takes precedence over the file
    pub fn orchestration_mode(&self, cli_mode: Option<&str>) -> anyhow::Result<OrchestrationMode> {
        let mode = cli_mode.or(self.mode.as_deref()).unwrap_or("single");
        match parse_mode(mode)? {
            ModeKind::Single => Ok(OrchestrationMode::Single {
                endpoint: self.endpoint.unwrap_or_default(),
                context: self.context.unwrap_or_default(),
            }),
            ModeKind::FanOut => Ok(OrchestrationMode::FanOut),
        }
    }

    pub fn compression_config(&self, folder_id: &str) -> CompressionConfig {
        let defaults = CompressionConfig::default();
        let s = &self.compression;
        CompressionConfig {
            enabled: s.enabled.unwrap_or(defaults.enabled),
            threshold: s.threshold.unwrap_or(defaults.threshold),
            retention: s.retention.unwrap_or(defaults.retention),
            temperature: s.temperature.unwrap_or(defaults.temperature),
            max_tokens: s.max_tokens.unwrap_or(defaults.max_tokens),
            model_uri: s
                .model_uri
                .clone()
                .unwrap_or_else(|| CompressionConfig::default_model_uri(folder_id)),
        }
    }

    /// Configured agents, or a single agent built from the environment
    pub fn agents(&self, folder_id: &str, endpoint: Endpoint) -> anyhow::Result<Vec<AgentDescriptor>> {
        if !self.agents.is_empty() {
            return Ok(self.agents.clone());
        }

        let remote_id = match endpoint {
            Endpoint::Completion => format!("gpt://{}/yandexgpt-lite/latest", folder_id),
            Endpoint::Agent => match std::env::var("YANDEX_AGENT_ID") {
                Ok(id) if !id.trim().is_empty() => id,
                _ => bail!("no agents configured: add [[agents]] to the config or set YANDEX_AGENT_ID"),
            },
        };
        Ok(vec![AgentDescriptor::new(
            DEFAULT_AGENT_NAME,
            remote_id,
            "yandexgpt-lite",
        )])
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeKind {
    Single,
    FanOut,
}

pub fn parse_mode(s: &str) -> anyhow::Result<ModeKind> {
    match s.to_lowercase().as_str() {
        "single" => Ok(ModeKind::Single),
        "fan-out" | "fanout" | "multi" => Ok(ModeKind::FanOut),
        other => bail!("unknown mode '{}': expected single or fan-out", other),
    }
}

pub fn parse_format(s: &str) -> anyhow::Result<ResponseFormat> {
    match s.to_lowercase().as_str() {
        "text" => Ok(ResponseFormat::Text),
        "json" => Ok(ResponseFormat::Json),
        other => bail!("unknown format '{}': expected text or json", other),
    }
}

/// Generate example config content
pub fn example_config() -> &'static str {
    r#"# danya configuration file
# Place at ~/.config/danya/config.toml (Linux) or set DANYA_CONFIG_PATH

# Orchestration mode: "single" or "fan-out"
mode = "single"

# Single-agent endpoint: "agent" or "completion"
endpoint = "agent"

# Single-agent context: "full" (whole history) or "latest" (last message only)
context = "full"

# Response format: "text" or "json"
format = "text"

# Model used to count tokens when the provider reports none (optional)
# tokenizer_model_uri = "gpt://<folder>/yandexgpt-lite/latest"

# Where messages, history and usage are stored (optional)
# data_dir = "~/.local/share/danya"

# greeting = "Привет! Чем могу помочь?"
# cleared_greeting = "Чат очищен. Чем могу помочь?"

# Credentials (optional - YANDEX_API_KEY / YANDEX_IAM_TOKEN / YANDEX_FOLDER_ID work too)
[auth]
# api_key = "..."
# iam_token = "..."
# folder_id = "b1g..."

[network]
# llm_base_url = "https://llm.api.cloud.yandex.net"
# agent_base_url = "https://rest-assistant.api.cloud.yandex.net/v1"
timeout_secs = 60

[compression]
enabled = true
threshold = 10
retention = 4
temperature = 0.3
max_tokens = 500
# model_uri = "gpt://<folder>/yandexgpt-lite/latest"

# Agents. Single mode uses the first one; fan-out calls all of them in order.
# Prices are per 1000 tokens and override the built-in table.
# [[agents]]
# display_name = "GigaDanya"
# remote_id = "fvt..."
# model_type = "yandexgpt-lite"
# price_per_1k_input = 0.2
# price_per_1k_output = 0.2
"#
}
