//! Conversation history: the role-tagged turns sent to the model as context.

use danya_ai::{CompletionMessage, Role};
use serde::{Deserialize, Serialize};

/// One role-tagged message unit. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationTurn {
    role: Role,
    text: String,
}

impl ConversationTurn {
    pub fn new(role: Role, text: impl Into<String>) -> Self {
        Self {
            role,
            text: text.into(),
        }
    }

    pub fn system(text: impl Into<String>) -> Self {
        Self::new(Role::System, text)
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self::new(Role::User, text)
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self::new(Role::Assistant, text)
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Context line for this turn. System turns contribute verbatim.
    pub fn render_line(&self) -> String {
        match self.role {
            Role::User => format!("User: {}", self.text),
            Role::Assistant => format!("Assistant: {}", self.text),
            Role::System => self.text.clone(),
        }
    }

    pub fn to_wire(&self) -> CompletionMessage {
        CompletionMessage::new(self.role, self.text.clone())
    }
}

/// Render turns to the role-prefixed text blob used as model context
pub fn render_turns(turns: &[ConversationTurn]) -> String {
    turns
        .iter()
        .map(ConversationTurn::render_line)
        .collect::<Vec<_>>()
        .join("\n")
}

/// Ordered buffer of turns; insertion order is conversational order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConversationHistory {
    turns: Vec<ConversationTurn>,
}

impl ConversationHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_turns(turns: Vec<ConversationTurn>) -> Self {
        Self { turns }
    }

    pub fn append(&mut self, turn: ConversationTurn) {
        self.turns.push(turn);
    }

    /// Owned copy of the current turns
    pub fn snapshot(&self) -> Vec<ConversationTurn> {
        self.turns.clone()
    }

    pub fn turns(&self) -> &[ConversationTurn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn last_role(&self) -> Option<Role> {
        self.turns.last().map(|t| t.role)
    }

    /// Text of the most recent user turn
    pub fn latest_user_text(&self) -> Option<&str> {
        self.turns
            .iter()
            .rev()
            .find(|t| t.role == Role::User)
            .map(|t| t.text.as_str())
    }

    /// Replace everything but the last `keep_suffix` turns with `new_prefix`.
    /// Done in one step so no reader ever sees a partially replaced buffer.
    pub fn replace_prefix(&mut self, new_prefix: Vec<ConversationTurn>, keep_suffix: usize) {
        let keep_from = self.turns.len().saturating_sub(keep_suffix);
        let suffix = self.turns.split_off(keep_from);
        self.turns = new_prefix;
        self.turns.extend(suffix);
    }

    pub fn clear(&mut self) {
        self.turns.clear();
    }

    /// Full context as text. Pure projection; does not touch the buffer.
    pub fn render(&self) -> String {
        render_turns(&self.turns)
    }

    /// Turns as completion-endpoint messages
    pub fn to_wire(&self) -> Vec<CompletionMessage> {
        self.turns.iter().map(ConversationTurn::to_wire).collect()
    }
}
