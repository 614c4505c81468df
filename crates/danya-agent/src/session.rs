//! Chat session: owns the history, usage account and message log for one chat

use std::sync::Arc;

use tokio::sync::{Mutex, broadcast};

use crate::classify::{BotReply, ResponseFormat};
use crate::compaction::{CompressionConfig, HistoryCompressor};
use crate::error::{Error, Result};
use crate::events::ChatEvent;
use crate::handle::SessionHandle;
use crate::history::{ConversationHistory, ConversationTurn};
use crate::orchestrator::{
    AgentCallResult, AgentOrchestrator, OrchestrationMode, OrchestratorConfig, TurnReport,
};
use crate::pricing::PriceTable;
use crate::roster::Roster;
use crate::store::{ChatMessage, ChatStore};
use crate::tokens::TokenResolver;
use crate::transport::Transport;
use crate::usage::{UsageAccount, UsageStats};

pub const DEFAULT_GREETING: &str =
    "Привет! Я GigaDanya, твой личный бешеный мопед. Чем могу помочь?";
pub const DEFAULT_CLEARED_GREETING: &str = "Чат очищен. Чем могу помочь?";

/// Configuration for a chat session
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub orchestrator: OrchestratorConfig,
    pub format: ResponseFormat,
    pub compression: CompressionConfig,
    /// Model for the tokenize fallback; `None` goes straight to the estimate
    pub tokenizer_model_uri: Option<String>,
    pub prices: PriceTable,
    /// First message of a new chat
    pub greeting: String,
    /// First message after the chat is cleared
    pub cleared_greeting: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            orchestrator: OrchestratorConfig::default(),
            format: ResponseFormat::Text,
            compression: CompressionConfig::default(),
            tokenizer_model_uri: None,
            prices: PriceTable::builtin(),
            greeting: DEFAULT_GREETING.to_string(),
            cleared_greeting: DEFAULT_CLEARED_GREETING.to_string(),
        }
    }
}

/// What became of a `send_message` call
#[derive(Debug, Clone, PartialEq)]
pub enum TurnOutcome {
    /// Blank input, nothing sent
    Ignored,
    /// Another turn was in flight; this one was dropped
    Busy,
    Completed(TurnResult),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TurnResult {
    /// Replies in display order
    pub replies: Vec<BotReply>,
    /// Single-agent call statistics
    pub call: Option<AgentCallResult>,
    /// Fan-out statistics
    pub report: Option<TurnReport>,
    /// User-facing error for a failed single-agent turn
    pub error: Option<String>,
    /// Whether the history was compressed after this turn
    pub compressed: bool,
}

struct SessionState {
    history: ConversationHistory,
    usage: UsageAccount,
    messages: Vec<ChatMessage>,
    format: ResponseFormat,
}

/// One chat. At most one turn is processed at a time.
///
/// Store writes are awaited in mutation order so the history mirror matches
/// memory after every change. A failed write is logged and never rolls back
/// or aborts the turn.
pub struct ChatSession {
    state: Mutex<SessionState>,
    orchestrator: AgentOrchestrator,
    compressor: HistoryCompressor,
    resolver: Arc<TokenResolver>,
    store: Arc<dyn ChatStore>,
    handle: SessionHandle,
    event_tx: broadcast::Sender<ChatEvent>,
    greeting: String,
    cleared_greeting: String,
}

impl ChatSession {
    pub fn new(
        config: SessionConfig,
        roster: Roster,
        transport: Arc<dyn Transport>,
        store: Arc<dyn ChatStore>,
    ) -> Self {
        let (event_tx, _) = broadcast::channel(256);
        let resolver = Arc::new(TokenResolver::new(
            Arc::clone(&transport),
            config.tokenizer_model_uri.clone(),
        ));
        let prices = config.prices.with_roster(roster.agents());

        Self {
            state: Mutex::new(SessionState {
                history: ConversationHistory::new(),
                usage: UsageAccount::new(),
                messages: Vec::new(),
                format: config.format,
            }),
            orchestrator: AgentOrchestrator::new(
                config.orchestrator,
                roster,
                prices,
                Arc::clone(&transport),
                Arc::clone(&resolver),
            ),
            compressor: HistoryCompressor::new(config.compression, transport),
            resolver,
            store,
            handle: SessionHandle::new(),
            event_tx,
            greeting: config.greeting,
            cleared_greeting: config.cleared_greeting,
        }
    }

    /// Subscribe to session events
    pub fn subscribe(&self) -> broadcast::Receiver<ChatEvent> {
        self.event_tx.subscribe()
    }

    /// Get a cloneable handle for the loading flag and abort
    pub fn handle(&self) -> SessionHandle {
        self.handle.clone()
    }

    pub fn mode(&self) -> OrchestrationMode {
        self.orchestrator.mode()
    }

    pub fn roster(&self) -> &Roster {
        self.orchestrator.roster()
    }

    pub async fn messages(&self) -> Vec<ChatMessage> {
        self.state.lock().await.messages.clone()
    }

    pub async fn history(&self) -> Vec<ConversationTurn> {
        self.state.lock().await.history.snapshot()
    }

    pub async fn usage(&self) -> UsageStats {
        self.state.lock().await.usage.stats()
    }

    pub async fn format(&self) -> ResponseFormat {
        self.state.lock().await.format
    }

    pub async fn set_format(&self, format: ResponseFormat) {
        self.state.lock().await.format = format;
    }

    /// Load messages, history and usage from the store. Seeds the greeting
    /// when the store holds no messages.
    pub async fn restore(&self) -> Result<()> {
        let messages = self.store.load_messages().await?;
        let history = self.store.load_history().await?;
        let usage = self.store.load_usage().await?.unwrap_or_default();

        let mut state = self.state.lock().await;
        tracing::debug!(
            messages = messages.len(),
            turns = history.len(),
            "Restored chat session"
        );
        state.messages = messages;
        state.history = ConversationHistory::from_turns(history);
        state.usage = UsageAccount::from_stats(usage);

        if state.messages.is_empty() {
            let greeting = ChatMessage::bot(self.greeting.clone());
            self.add_message(&mut state, greeting).await;
        }
        Ok(())
    }

    /// Process one user message.
    ///
    /// Dropped when blank or when another turn is in flight. Failures never
    /// escape: they come back as `TurnResult::error` and an `Error` event.
    pub async fn send_message(&self, text: &str) -> TurnOutcome {
        let text = text.trim();
        if text.is_empty() {
            return TurnOutcome::Ignored;
        }
        let Some(guard) = self.handle.try_begin(&self.event_tx) else {
            tracing::debug!("Turn in flight, dropping message");
            return TurnOutcome::Busy;
        };
        let cancel = guard.token().clone();

        let mut state = self.state.lock().await;
        self.add_message(&mut state, ChatMessage::user(text)).await;

        let result = match self.orchestrator.mode() {
            OrchestrationMode::Single { .. } => self.single_turn(&mut state, text, &cancel).await,
            OrchestrationMode::FanOut => self.fan_out_turn(&mut state, text, &cancel).await,
        };

        if let Some(message) = &result.error {
            let _ = self.event_tx.send(ChatEvent::Error {
                message: message.clone(),
            });
        }
        drop(state);
        drop(guard);
        TurnOutcome::Completed(result)
    }

    async fn single_turn(
        &self,
        state: &mut SessionState,
        text: &str,
        cancel: &tokio_util::sync::CancellationToken,
    ) -> TurnResult {
        state.history.append(ConversationTurn::user(text));
        self.persist_history(state).await;

        let call = match self
            .orchestrator
            .run_single(&state.history, state.format, cancel)
            .await
        {
            Ok(call) => call,
            Err(e) => {
                tracing::warn!("Turn failed: {}", e);
                return TurnResult {
                    error: Some(e.user_message()),
                    ..Default::default()
                };
            }
        };

        state
            .history
            .append(ConversationTurn::assistant(call.reply_text.clone()));
        state
            .usage
            .record_call(call.result.input_tokens, call.result.output_tokens);
        self.persist_history(state).await;
        self.persist_usage(state).await;

        for reply in &call.replies {
            self.add_message(state, ChatMessage::from_reply(reply)).await;
        }

        let compressed = self.compress(state).await;

        TurnResult {
            replies: call.replies,
            call: Some(call.result),
            compressed,
            ..Default::default()
        }
    }

    async fn fan_out_turn(
        &self,
        state: &mut SessionState,
        text: &str,
        cancel: &tokio_util::sync::CancellationToken,
    ) -> TurnResult {
        let outcome = match self.orchestrator.run_fan_out(text, state.format, cancel).await {
            Ok(outcome) => outcome,
            Err(e) => {
                return TurnResult {
                    error: Some(e.user_message()),
                    ..Default::default()
                };
            }
        };

        let mut replies = Vec::new();
        for set in outcome.replies {
            for reply in set.replies {
                self.add_message(state, ChatMessage::from_reply(&reply)).await;
                replies.push(reply);
            }
        }

        let _ = self.event_tx.send(ChatEvent::TurnReport {
            report: outcome.report.clone(),
        });

        TurnResult {
            replies,
            report: Some(outcome.report),
            ..Default::default()
        }
    }

    /// Compress the history if it qualifies. Failures are logged and leave
    /// the history as it was.
    async fn compress(&self, state: &mut SessionState) -> bool {
        let Some(plan) = self.compressor.plan(&state.history) else {
            return false;
        };
        let _ = self.event_tx.send(ChatEvent::CompressionStart {
            turns: plan.to_compress,
        });

        let SessionState { history, usage, .. } = &mut *state;
        match self.compressor.run(plan, history, usage, &self.resolver).await {
            Ok(outcome) => {
                self.persist_history(state).await;
                self.persist_usage(state).await;
                let _ = self.event_tx.send(ChatEvent::CompressionEnd {
                    compressed: true,
                    saved_tokens: outcome.saved_tokens,
                });
                true
            }
            Err(e) => {
                tracing::warn!("History compression failed, keeping full history: {}", e);
                let _ = self.event_tx.send(ChatEvent::CompressionEnd {
                    compressed: false,
                    saved_tokens: 0,
                });
                false
            }
        }
    }

    /// Delete everything and start over with the cleared-chat greeting.
    /// Waits for an in-flight turn to finish.
    pub async fn clear_chat(&self) -> Result<()> {
        let mut state = self.state.lock().await;
        state.history.clear();
        state.usage.reset();
        state.messages.clear();

        let cleared = self.store.clear_all().await;
        let _ = self.event_tx.send(ChatEvent::Cleared);
        self.persist_usage(&state).await;

        let greeting = ChatMessage::bot(self.cleared_greeting.clone());
        self.add_message(&mut state, greeting).await;

        cleared.map_err(|e| Error::Store(format!("failed to clear chat: {}", e)))
    }

    async fn add_message(&self, state: &mut SessionState, message: ChatMessage) {
        if let Err(e) = self.store.append_message(&message).await {
            tracing::warn!("Failed to persist message: {}", e);
        }
        state.messages.push(message.clone());
        let _ = self.event_tx.send(ChatEvent::MessageAdded { message });
    }

    async fn persist_history(&self, state: &SessionState) {
        if let Err(e) = self.store.save_history(state.history.turns()).await {
            tracing::warn!("Failed to persist history: {}", e);
        }
    }

    async fn persist_usage(&self, state: &SessionState) {
        let stats = state.usage.stats();
        if let Err(e) = self.store.save_usage(&stats).await {
            tracing::warn!("Failed to persist usage: {}", e);
        }
        let _ = self.event_tx.send(ChatEvent::UsageUpdated { stats });
    }
}
