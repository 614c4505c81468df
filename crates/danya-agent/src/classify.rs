//! Response classification: plain text, embedded image URL, or JSON payload.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};
use crate::roster::AgentDescriptor;

/// First http(s) URL ending in an image extension, no embedded whitespace
static IMAGE_URL_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)https?://\S+\.(?:jpg|jpeg|png|gif|webp)").unwrap());

/// How the model was asked to answer
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseFormat {
    #[default]
    Text,
    Json,
}

/// A normalized piece of a bot answer, rendered as one chat message
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BotReply {
    pub text: Option<String>,
    pub image_url: Option<String>,
    pub structured_payload: Option<String>,
    pub agent: Option<AgentDescriptor>,
}

impl BotReply {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Default::default()
        }
    }

    pub fn image(url: impl Into<String>) -> Self {
        Self {
            image_url: Some(url.into()),
            ..Default::default()
        }
    }

    pub fn payload(pretty_json: impl Into<String>) -> Self {
        Self {
            structured_payload: Some(pretty_json.into()),
            ..Default::default()
        }
    }

    pub fn with_agent(mut self, agent: &AgentDescriptor) -> Self {
        self.agent = Some(agent.clone());
        self
    }
}

/// An image URL found in a reply, plus the text with that URL removed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageMatch {
    pub url: String,
    pub remainder: String,
}

/// Find the first embedded image URL. Only one URL is extracted per text.
pub fn extract_image_url(text: &str) -> Option<ImageMatch> {
    let url = IMAGE_URL_PATTERN.find(text)?.as_str().to_string();
    let remainder = text.replace(&url, "").trim().to_string();
    Some(ImageMatch { url, remainder })
}

/// Turn a raw reply body into bot replies.
///
/// Returns `Error::EmptyResponse` when there is nothing to show. In JSON mode a
/// body that fails to parse is treated as plain text.
pub fn classify(body: &str, format: ResponseFormat) -> Result<Vec<BotReply>> {
    if body.trim().is_empty() {
        return Err(Error::EmptyResponse);
    }

    if format == ResponseFormat::Json {
        if let Some(value) = parse_structured(body) {
            let pretty = serde_json::to_string_pretty(&value).unwrap_or_else(|_| body.to_string());
            return Ok(vec![BotReply::text(render_outline(&value)), BotReply::payload(pretty)]);
        }
        tracing::debug!("Structured reply did not parse as JSON, treating as text");
    }

    match extract_image_url(body) {
        Some(found) => {
            let mut replies = Vec::with_capacity(2);
            if !found.remainder.is_empty() {
                replies.push(BotReply::text(found.remainder));
            }
            replies.push(BotReply::image(found.url));
            Ok(replies)
        }
        None => Ok(vec![BotReply::text(body)]),
    }
}

/// Parse an object or array, unwrapping a ```json fence if the model added one
fn parse_structured(body: &str) -> Option<Value> {
    let trimmed = body.trim();
    let candidate = strip_code_fence(trimmed).unwrap_or(trimmed);
    match serde_json::from_str::<Value>(candidate) {
        Ok(v @ (Value::Object(_) | Value::Array(_))) => Some(v),
        _ => None,
    }
}

fn strip_code_fence(text: &str) -> Option<&str> {
    let rest = text.strip_prefix("```")?;
    let rest = rest.strip_suffix("```")?;
    // drop the info string ("json") on the opening line
    let start = rest.find('\n').map(|i| i + 1).unwrap_or(0);
    Some(rest[start..].trim())
}

/// Human-readable walk: object keys become bullets, array items are numbered,
/// nested containers are indented one level deeper.
pub fn render_outline(value: &Value) -> String {
    let mut out = String::new();
    match value {
        Value::Object(_) | Value::Array(_) => write_outline(value, 0, &mut out),
        scalar => out.push_str(&scalar_text(scalar)),
    }
    out.trim_end().to_string()
}

fn write_outline(value: &Value, depth: usize, out: &mut String) {
    let pad = "  ".repeat(depth);
    match value {
        Value::Object(map) => {
            for (key, v) in map {
                if is_nested(v) {
                    out.push_str(&format!("{pad}• {key}:\n"));
                    write_outline(v, depth + 1, out);
                } else {
                    out.push_str(&format!("{pad}• {key}: {}\n", scalar_text(v)));
                }
            }
        }
        Value::Array(items) => {
            for (i, v) in items.iter().enumerate() {
                if is_nested(v) {
                    out.push_str(&format!("{pad}{}.\n", i + 1));
                    write_outline(v, depth + 1, out);
                } else {
                    out.push_str(&format!("{pad}{}. {}\n", i + 1, scalar_text(v)));
                }
            }
        }
        scalar => {
            out.push_str(&format!("{pad}{}\n", scalar_text(scalar)));
        }
    }
}

fn is_nested(value: &Value) -> bool {
    match value {
        Value::Object(m) => !m.is_empty(),
        Value::Array(a) => !a.is_empty(),
        _ => false,
    }
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "null".to_string(),
        Value::Object(_) => "{}".to_string(),
        Value::Array(_) => "[]".to_string(),
        other => other.to_string(),
    }
}
