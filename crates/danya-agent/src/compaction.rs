//! History compression for long conversations
//!
//! Once the history grows past a threshold, older turns are summarized by the
//! completion endpoint and replaced with a single system turn carrying the
//! summary. The most recent turns are kept verbatim.

use std::sync::Arc;

use danya_ai::{CompletionMessage, CompletionOptions, CompletionRequest, Role};

use crate::error::{Error, Result};
use crate::history::{ConversationHistory, ConversationTurn, render_turns};
use crate::tokens::{TokenCount, TokenResolver, estimate_tokens};
use crate::transport::{ProviderRequest, Transport};
use crate::usage::UsageAccount;

/// Prefix of every synthetic summary turn
pub const SUMMARY_MARKER: &str = "Резюме предыдущего разговора";

const SUMMARIZATION_INSTRUCTION: &str = "\
Кратко перескажи приведённый диалог пользователя и ассистента. \
Сохрани факты, имена, числа, договорённости и открытые вопросы, \
которые понадобятся для продолжения разговора. Не добавляй ничего от себя.";

/// Configuration for history compression
#[derive(Debug, Clone, PartialEq)]
pub struct CompressionConfig {
    /// Whether compression is enabled
    pub enabled: bool,
    /// Compress once the history holds this many turns
    pub threshold: usize,
    /// Number of most recent turns kept verbatim
    pub retention: usize,
    pub temperature: f64,
    pub max_tokens: u32,
    /// Completion model used for the summary call
    pub model_uri: String,
}

impl Default for CompressionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            threshold: 10,
            retention: 4,
            temperature: 0.3,
            max_tokens: 500,
            model_uri: String::new(),
        }
    }
}

impl CompressionConfig {
    /// Summarization model for a folder when none is configured
    pub fn default_model_uri(folder_id: &str) -> String {
        format!("gpt://{}/yandexgpt-lite/latest", folder_id)
    }

    pub fn with_model_uri(mut self, model_uri: impl Into<String>) -> Self {
        self.model_uri = model_uri.into();
        self
    }
}

/// A compression the compressor has decided to attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompressionPlan {
    /// Number of leading turns to summarize
    pub to_compress: usize,
    /// History length the plan was made for
    pub history_len: usize,
}

/// Result of a successful compression
#[derive(Debug, Clone, PartialEq)]
pub struct CompressionOutcome {
    pub summary: String,
    pub compressed_turns: usize,
    pub saved_tokens: i64,
    /// Tokens spent on the summary call itself
    pub usage: TokenCount,
}

/// Text of the synthetic system turn that replaces a summarized prefix
pub fn summary_turn_text(summary: &str) -> String {
    format!("{}: {}", SUMMARY_MARKER, summary)
}

fn is_summary_turn(turn: &ConversationTurn) -> bool {
    turn.role() == Role::System && turn.text().starts_with(SUMMARY_MARKER)
}

pub struct HistoryCompressor {
    config: CompressionConfig,
    transport: Arc<dyn Transport>,
}

impl HistoryCompressor {
    pub fn new(config: CompressionConfig, transport: Arc<dyn Transport>) -> Self {
        Self { config, transport }
    }

    pub fn config(&self) -> &CompressionConfig {
        &self.config
    }

    /// Trigger check: enough turns, and the last one is an assistant reply
    pub fn should_compress(&self, history: &ConversationHistory) -> bool {
        self.config.enabled
            && history.len() >= self.config.threshold
            && history.last_role() == Some(Role::Assistant)
    }

    /// Decide whether and how much to compress. `None` means leave the history alone.
    pub fn plan(&self, history: &ConversationHistory) -> Option<CompressionPlan> {
        if !self.should_compress(history) {
            return None;
        }

        let retention = self.config.retention;
        let to_compress = history.len().saturating_sub(retention);
        if to_compress < retention {
            tracing::debug!(to_compress, retention, "Too few turns to compress");
            return None;
        }

        let prefix = &history.turns()[..to_compress];
        if prefix.iter().any(is_summary_turn) && prefix.len() < 2 * retention {
            tracing::debug!("Prefix is mostly an earlier summary, skipping");
            return None;
        }

        Some(CompressionPlan {
            to_compress,
            history_len: history.len(),
        })
    }

    /// Summarize the planned prefix and swap it for a summary turn.
    ///
    /// On error the history and the account are left untouched.
    pub async fn run(
        &self,
        plan: CompressionPlan,
        history: &mut ConversationHistory,
        account: &mut UsageAccount,
        resolver: &TokenResolver,
    ) -> Result<CompressionOutcome> {
        if history.len() != plan.history_len {
            return Err(Error::Compression(
                "history changed since the plan was made".into(),
            ));
        }
        if self.config.model_uri.trim().is_empty() {
            return Err(Error::Compression("no summarization model configured".into()));
        }

        let prefix_text = render_turns(&history.turns()[..plan.to_compress]);
        let request = CompletionRequest {
            model_uri: self.config.model_uri.clone(),
            completion_options: CompletionOptions {
                stream: false,
                temperature: self.config.temperature,
                max_tokens: self.config.max_tokens,
            },
            messages: vec![
                CompletionMessage::new(Role::System, SUMMARIZATION_INSTRUCTION),
                CompletionMessage::new(Role::User, prefix_text.clone()),
            ],
            json_object_mode: None,
        };

        let reply = self
            .transport
            .send(ProviderRequest::Completion(request))
            .await?;
        if let Some(err) = reply.error() {
            return Err(err.to_error().into());
        }
        let summary = reply.text().map(str::trim).unwrap_or_default().to_string();
        if summary.is_empty() {
            return Err(Error::Compression("summary was empty".into()));
        }

        let usage = resolver
            .resolve(reply.usage(), &prefix_text, &summary)
            .await;
        let saved_tokens = i64::from(estimate_tokens(&prefix_text)) - i64::from(estimate_tokens(&summary));

        let retention = history.len() - plan.to_compress;
        history.replace_prefix(
            vec![ConversationTurn::system(summary_turn_text(&summary))],
            retention,
        );
        account.record_call(usage.input, usage.output);
        account.record_compression(saved_tokens);

        tracing::info!(
            compressed_turns = plan.to_compress,
            saved_tokens,
            "Compressed conversation history"
        );

        Ok(CompressionOutcome {
            summary,
            compressed_turns: plan.to_compress,
            saved_tokens,
            usage,
        })
    }
}
