//! danya-agent: conversation engine for the Danya chat client
//!
//! This crate owns the rolling conversation history, history compression,
//! single-agent and fan-out orchestration, response classification, and
//! token/cost accounting for a chat session.

pub mod classify;
pub mod compaction;
pub mod error;
pub mod events;
pub mod handle;
pub mod history;
pub mod orchestrator;
pub mod pricing;
pub mod roster;
pub mod session;
pub mod store;
pub mod tokens;
pub mod transport;
pub mod usage;

#[cfg(test)]
mod test_support;

pub use classify::{BotReply, ImageMatch, ResponseFormat, classify, extract_image_url};
pub use compaction::{CompressionConfig, HistoryCompressor, SUMMARY_MARKER};
pub use error::{Error, Result};
pub use events::ChatEvent;
pub use handle::SessionHandle;
pub use history::{ConversationHistory, ConversationTurn};
pub use orchestrator::{
    AgentCallResult, AgentOrchestrator, ContextMode, Endpoint, OrchestrationMode,
    OrchestratorConfig, TurnReport,
};
pub use pricing::{PriceTable, Pricing};
pub use roster::{AgentDescriptor, Roster};
pub use session::{ChatSession, SessionConfig, TurnOutcome, TurnResult};
pub use store::{ChatMessage, ChatStore, MemoryStore};
pub use tokens::{TokenResolver, estimate_tokens};
pub use transport::{ProviderRequest, ProviderTransport, Transport};
pub use usage::{UsageAccount, UsageStats};
