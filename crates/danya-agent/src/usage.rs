//! Cumulative token usage for a chat session

use serde::{Deserialize, Serialize};

/// Snapshot of session-wide usage. Mirrored to the store after every change.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageStats {
    pub total_input_tokens: u64,
    pub total_output_tokens: u64,
    pub compression_count: u32,
    /// Estimated tokens removed from context by compression; may go negative
    pub saved_tokens: i64,
}

impl UsageStats {
    pub fn total_tokens(&self) -> u64 {
        self.total_input_tokens + self.total_output_tokens
    }
}

/// Mutable aggregate owned by the session
#[derive(Debug, Clone, Default)]
pub struct UsageAccount {
    stats: UsageStats,
}

impl UsageAccount {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_stats(stats: UsageStats) -> Self {
        Self { stats }
    }

    /// Add the tokens of one successful call
    pub fn record_call(&mut self, input_tokens: u32, output_tokens: u32) {
        self.stats.total_input_tokens += u64::from(input_tokens);
        self.stats.total_output_tokens += u64::from(output_tokens);
    }

    pub fn record_compression(&mut self, saved_tokens: i64) {
        self.stats.compression_count += 1;
        self.stats.saved_tokens += saved_tokens;
    }

    pub fn stats(&self) -> UsageStats {
        self.stats
    }

    pub fn reset(&mut self) {
        self.stats = UsageStats::default();
    }
}
