//! Chat event types

use serde::{Deserialize, Serialize};

use crate::orchestrator::TurnReport;
use crate::store::ChatMessage;
use crate::usage::UsageStats;

/// Events emitted by a chat session for the UI
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChatEvent {
    /// Turn processing started or finished
    LoadingChanged { loading: bool },

    /// A message was added to the chat
    MessageAdded { message: ChatMessage },

    /// Fan-out statistics for the finished turn
    TurnReport { report: TurnReport },

    /// Cumulative usage changed
    UsageUpdated { stats: UsageStats },

    /// History compression started
    CompressionStart { turns: usize },

    /// History compression finished
    CompressionEnd { compressed: bool, saved_tokens: i64 },

    /// A turn failed; `message` is user-facing
    Error { message: String },

    /// The chat was cleared
    Cleared,
}

impl ChatEvent {
    /// Check if this event ends a turn
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ChatEvent::LoadingChanged { loading: false } | ChatEvent::Error { .. }
        )
    }
}
