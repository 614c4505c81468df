//! Agent orchestration: one call per turn, or a sequential fan-out across the roster

use std::sync::Arc;
use std::time::Instant;

use danya_ai::{AgentRequest, CompletionMessage, CompletionOptions, CompletionRequest, Role};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::classify::{BotReply, ResponseFormat, classify};
use crate::error::{Error, Result};
use crate::history::ConversationHistory;
use crate::pricing::PriceTable;
use crate::roster::{AgentDescriptor, Roster};
use crate::tokens::{TokenResolver, TokenSource};
use crate::transport::{ProviderRequest, Transport};

/// Which endpoint a single-agent session talks to
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Endpoint {
    /// Agent `responses` endpoint; `remote_id` is the prompt id
    #[default]
    Agent,
    /// Completion endpoint; `remote_id` is the model URI
    Completion,
}

/// What a single-agent call sends as input
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContextMode {
    /// Whole rendered history. Needed whenever compression is on.
    #[default]
    Full,
    /// Latest user turn only
    Latest,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "kebab-case")]
pub enum OrchestrationMode {
    /// One call per turn to the primary agent
    Single {
        endpoint: Endpoint,
        context: ContextMode,
    },
    /// One call per roster agent, in order, with the latest user turn only
    FanOut,
}

impl Default for OrchestrationMode {
    fn default() -> Self {
        OrchestrationMode::Single {
            endpoint: Endpoint::Agent,
            context: ContextMode::Full,
        }
    }
}

/// Statistics for one remote call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentCallResult {
    pub agent: AgentDescriptor,
    pub elapsed_millis: u64,
    pub input_tokens: u32,
    pub output_tokens: u32,
    pub cost: f64,
    pub token_source: Option<TokenSource>,
    /// User-facing failure text when the call did not produce a reply
    pub error: Option<String>,
}

impl AgentCallResult {
    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    fn failed(agent: &AgentDescriptor, elapsed_millis: u64, error: &Error) -> Self {
        Self {
            agent: agent.clone(),
            elapsed_millis,
            input_tokens: 0,
            output_tokens: 0,
            cost: 0.0,
            token_source: None,
            error: Some(error.user_message()),
        }
    }
}

/// Replies and statistics of one successful call
#[derive(Debug, Clone, PartialEq)]
pub struct AgentCall {
    pub replies: Vec<BotReply>,
    pub result: AgentCallResult,
    /// Raw reply text, appended to history as the assistant turn
    pub reply_text: String,
}

/// Replies for one roster agent in a fan-out turn
#[derive(Debug, Clone, PartialEq)]
pub struct AgentReplySet {
    pub replies: Vec<BotReply>,
    pub result: AgentCallResult,
}

impl AgentReplySet {
    pub fn is_error(&self) -> bool {
        self.result.is_error()
    }
}

/// Per-turn fan-out statistics. Never merged into the session usage account.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TurnReport {
    pub rows: Vec<AgentCallResult>,
    pub total_input_tokens: u64,
    pub total_output_tokens: u64,
    pub total_cost: f64,
    pub total_elapsed_millis: u64,
}

impl TurnReport {
    pub fn from_results(rows: Vec<AgentCallResult>) -> Self {
        let mut report = TurnReport::default();
        for row in &rows {
            report.total_input_tokens += u64::from(row.input_tokens);
            report.total_output_tokens += u64::from(row.output_tokens);
            report.total_cost += row.cost;
            report.total_elapsed_millis += row.elapsed_millis;
        }
        report.rows = rows;
        report
    }

    pub fn total_tokens(&self) -> u64 {
        self.total_input_tokens + self.total_output_tokens
    }

    pub fn failed_agents(&self) -> usize {
        self.rows.iter().filter(|r| r.is_error()).count()
    }
}

/// Everything a fan-out turn produced, in roster order
#[derive(Debug, Clone, PartialEq)]
pub struct FanOutOutcome {
    pub replies: Vec<AgentReplySet>,
    pub report: TurnReport,
}

#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    pub mode: OrchestrationMode,
    /// Sampling options for completion-endpoint turns
    pub completion_options: CompletionOptions,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            mode: OrchestrationMode::default(),
            completion_options: CompletionOptions::default(),
        }
    }
}

pub struct AgentOrchestrator {
    config: OrchestratorConfig,
    roster: Roster,
    prices: PriceTable,
    transport: Arc<dyn Transport>,
    resolver: Arc<TokenResolver>,
}

impl AgentOrchestrator {
    pub fn new(
        config: OrchestratorConfig,
        roster: Roster,
        prices: PriceTable,
        transport: Arc<dyn Transport>,
        resolver: Arc<TokenResolver>,
    ) -> Self {
        Self {
            config,
            roster,
            prices,
            transport,
            resolver,
        }
    }

    pub fn mode(&self) -> OrchestrationMode {
        self.config.mode
    }

    pub fn roster(&self) -> &Roster {
        &self.roster
    }

    /// Single-agent turn against the primary agent.
    ///
    /// `history` must already end with the pending user turn.
    pub async fn run_single(
        &self,
        history: &ConversationHistory,
        format: ResponseFormat,
        cancel: &CancellationToken,
    ) -> Result<AgentCall> {
        let (endpoint, context) = match self.config.mode {
            OrchestrationMode::Single { endpoint, context } => (endpoint, context),
            OrchestrationMode::FanOut => (Endpoint::Agent, ContextMode::Latest),
        };
        let agent = self.roster.primary();
        let latest = history.latest_user_text().unwrap_or_default();

        let (request, input_text) = match endpoint {
            Endpoint::Agent => {
                let input = match context {
                    ContextMode::Full => history.render(),
                    ContextMode::Latest => latest.to_string(),
                };
                (
                    ProviderRequest::Agent(AgentRequest::new(&agent.remote_id, input.clone())),
                    input,
                )
            }
            Endpoint::Completion => {
                let (messages, input) = match context {
                    ContextMode::Full => (history.to_wire(), history.render()),
                    ContextMode::Latest => (
                        vec![CompletionMessage::new(Role::User, latest)],
                        latest.to_string(),
                    ),
                };
                let request = CompletionRequest {
                    model_uri: agent.remote_id.clone(),
                    completion_options: self.config.completion_options.clone(),
                    messages,
                    json_object_mode: (format == ResponseFormat::Json).then_some(true),
                };
                (ProviderRequest::Completion(request), input)
            }
        };

        self.call(agent, request, &input_text, format, cancel).await
    }

    /// Fan-out turn: every roster agent in order, each with `input` only.
    ///
    /// A failing agent becomes an error reply and does not stop the rest. Only
    /// cancellation ends the turn early.
    pub async fn run_fan_out(
        &self,
        input: &str,
        format: ResponseFormat,
        cancel: &CancellationToken,
    ) -> Result<FanOutOutcome> {
        let mut replies = Vec::with_capacity(self.roster.len());

        for agent in self.roster.iter() {
            let started = Instant::now();
            let request = ProviderRequest::Agent(AgentRequest::new(&agent.remote_id, input));
            match self.call(agent, request, input, format, cancel).await {
                Ok(call) => replies.push(AgentReplySet {
                    replies: call.replies,
                    result: call.result,
                }),
                Err(Error::Cancelled) => return Err(Error::Cancelled),
                Err(e) => {
                    tracing::warn!(agent = %agent.display_name, "Agent call failed: {}", e);
                    let result = AgentCallResult::failed(agent, elapsed_millis(started), &e);
                    let reply = BotReply::text(e.user_message()).with_agent(agent);
                    replies.push(AgentReplySet {
                        replies: vec![reply],
                        result,
                    });
                }
            }
        }

        let report = TurnReport::from_results(replies.iter().map(|r| r.result.clone()).collect());
        Ok(FanOutOutcome { replies, report })
    }

    async fn call(
        &self,
        agent: &AgentDescriptor,
        request: ProviderRequest,
        input_text: &str,
        format: ResponseFormat,
        cancel: &CancellationToken,
    ) -> Result<AgentCall> {
        let started = Instant::now();
        tracing::debug!(agent = %agent.display_name, kind = request.kind(), "Calling agent");

        let reply = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(Error::Cancelled),
            reply = self.transport.send(request) => reply?,
        };

        // An error object wins over any partial output
        if let Some(err) = reply.error() {
            return Err(err.to_error().into());
        }

        let reply_text = reply.text().unwrap_or_default().trim().to_string();
        let replies = classify(&reply_text, format)?
            .into_iter()
            .map(|r| r.with_agent(agent))
            .collect();
        let elapsed = elapsed_millis(started);

        let tokens = self
            .resolver
            .resolve(reply.usage(), input_text, &reply_text)
            .await;
        let cost = self
            .prices
            .cost(&agent.model_type, tokens.input, tokens.output);

        Ok(AgentCall {
            replies,
            result: AgentCallResult {
                agent: agent.clone(),
                elapsed_millis: elapsed,
                input_tokens: tokens.input,
                output_tokens: tokens.output,
                cost,
                token_source: Some(tokens.source),
                error: None,
            },
            reply_text,
        })
    }
}

fn elapsed_millis(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}
