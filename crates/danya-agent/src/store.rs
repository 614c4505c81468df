//! Chat persistence: the message log, the history mirror, and the usage record

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::classify::BotReply;
use crate::error::Result;
use crate::history::ConversationTurn;
use crate::usage::UsageStats;

/// One rendered chat message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    /// Pretty-printed JSON payload of a structured reply
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_json: Option<String>,
    pub is_from_user: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_name: Option<String>,
    /// Unix epoch milliseconds
    pub timestamp: i64,
}

impl ChatMessage {
    fn blank(is_from_user: bool) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            text: None,
            image_url: None,
            raw_json: None,
            is_from_user,
            agent_name: None,
            timestamp: chrono::Utc::now().timestamp_millis(),
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Self::blank(true)
        }
    }

    pub fn bot(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Self::blank(false)
        }
    }

    pub fn from_reply(reply: &BotReply) -> Self {
        Self {
            text: reply.text.clone(),
            image_url: reply.image_url.clone(),
            raw_json: reply.structured_payload.clone(),
            agent_name: reply.agent.as_ref().map(|a| a.display_name.clone()),
            ..Self::blank(false)
        }
    }
}

/// One row of the history mirror
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub id: u64,
    #[serde(flatten)]
    pub turn: ConversationTurn,
    pub timestamp: i64,
}

impl HistoryRecord {
    /// Number turns from 1 in order, stamped with the current time
    pub fn from_turns(turns: &[ConversationTurn]) -> Vec<HistoryRecord> {
        Self::merge(&[], turns)
    }

    /// Renumber `turns` from 1, keeping the timestamp of every turn already
    /// present in `previous`. Matching walks both lists forward, so turns kept
    /// after a compressed prefix keep their time. New turns get the current time.
    pub fn merge(previous: &[HistoryRecord], turns: &[ConversationTurn]) -> Vec<HistoryRecord> {
        let now = chrono::Utc::now().timestamp_millis();
        let mut cursor = 0;
        turns
            .iter()
            .enumerate()
            .map(|(i, turn)| {
                let timestamp = match previous[cursor..].iter().position(|r| &r.turn == turn) {
                    Some(offset) => {
                        let ts = previous[cursor + offset].timestamp;
                        cursor += offset + 1;
                        ts
                    }
                    None => now,
                };
                HistoryRecord {
                    id: i as u64 + 1,
                    turn: turn.clone(),
                    timestamp,
                }
            })
            .collect()
    }
}

/// Durable storage for a chat session.
///
/// Failures are reported but never roll back the in-memory session state.
#[async_trait]
pub trait ChatStore: Send + Sync {
    /// Append one message to the ordered message log
    async fn append_message(&self, message: &ChatMessage) -> Result<()>;

    /// All messages in insertion order
    async fn load_messages(&self) -> Result<Vec<ChatMessage>>;

    /// Replace the history mirror with exactly these turns
    async fn save_history(&self, turns: &[ConversationTurn]) -> Result<()>;

    async fn load_history(&self) -> Result<Vec<ConversationTurn>>;

    async fn save_usage(&self, stats: &UsageStats) -> Result<()>;

    async fn load_usage(&self) -> Result<Option<UsageStats>>;

    /// Delete messages, history and usage
    async fn clear_all(&self) -> Result<()>;
}

#[derive(Default)]
struct MemoryState {
    messages: Vec<ChatMessage>,
    history: Vec<HistoryRecord>,
    usage: Option<UsageStats>,
}

/// In-process store; used when persistence is off and in tests
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ChatStore for MemoryStore {
    async fn append_message(&self, message: &ChatMessage) -> Result<()> {
        self.state.lock().messages.push(message.clone());
        Ok(())
    }

    async fn load_messages(&self) -> Result<Vec<ChatMessage>> {
        Ok(self.state.lock().messages.clone())
    }

    async fn save_history(&self, turns: &[ConversationTurn]) -> Result<()> {
        let mut state = self.state.lock();
        state.history = HistoryRecord::merge(&state.history, turns);
        Ok(())
    }

    async fn load_history(&self) -> Result<Vec<ConversationTurn>> {
        Ok(self
            .state
            .lock()
            .history
            .iter()
            .map(|r| r.turn.clone())
            .collect())
    }

    async fn save_usage(&self, stats: &UsageStats) -> Result<()> {
        self.state.lock().usage = Some(*stats);
        Ok(())
    }

    async fn load_usage(&self) -> Result<Option<UsageStats>> {
        Ok(self.state.lock().usage)
    }

    async fn clear_all(&self) -> Result<()> {
        *self.state.lock() = MemoryState::default();
        Ok(())
    }
}
