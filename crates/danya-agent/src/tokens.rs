//! Token accounting: provider usage first, then the tokenizer, then a heuristic.

use std::sync::Arc;

use danya_ai::{TokenUsage, TokenizeRequest};
use serde::{Deserialize, Serialize};

use crate::transport::Transport;

/// Approximate token count without touching the network.
///
/// `max(1, round(non_whitespace_chars / 3.5 * 1.1))` for non-blank text, `0` otherwise.
pub fn estimate_tokens(text: &str) -> u32 {
    let chars = text.chars().filter(|c| !c.is_whitespace()).count();
    if chars == 0 {
        return 0;
    }
    let estimate = (chars as f64 / 3.5 * 1.1).round() as u32;
    estimate.max(1)
}

/// Where a token count came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenSource {
    /// Usage block of the provider response
    Provider,
    /// Remote tokenize endpoint
    Tokenizer,
    /// Character-count heuristic (used if any side fell back to it)
    Estimate,
}

/// Resolved input/output token counts for one call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenCount {
    pub input: u32,
    pub output: u32,
    pub source: TokenSource,
}

impl TokenCount {
    pub fn total(&self) -> u32 {
        self.input.saturating_add(self.output)
    }
}

/// Resolves token counts for a call, falling back when the provider
/// reports nothing or all zeros.
pub struct TokenResolver {
    transport: Arc<dyn Transport>,
    /// Model used by the tokenize endpoint; `None` skips straight to the heuristic
    tokenizer_model_uri: Option<String>,
}

impl TokenResolver {
    pub fn new(transport: Arc<dyn Transport>, tokenizer_model_uri: Option<String>) -> Self {
        Self {
            transport,
            tokenizer_model_uri,
        }
    }

    pub async fn resolve(&self, usage: Option<TokenUsage>, input: &str, output: &str) -> TokenCount {
        if let Some(usage) = usage.filter(|u| !u.is_zero()) {
            return TokenCount {
                input: usage.input,
                output: usage.output,
                source: TokenSource::Provider,
            };
        }

        let (input_tokens, input_exact) = self.count(input).await;
        let (output_tokens, output_exact) = self.count(output).await;

        TokenCount {
            input: input_tokens,
            output: output_tokens,
            source: if input_exact && output_exact {
                TokenSource::Tokenizer
            } else {
                TokenSource::Estimate
            },
        }
    }

    /// Count one text; the flag is true when the tokenizer answered
    async fn count(&self, text: &str) -> (u32, bool) {
        if text.trim().is_empty() {
            return (0, true);
        }
        let Some(model_uri) = self.tokenizer_model_uri.as_ref() else {
            return (estimate_tokens(text), false);
        };

        let request = TokenizeRequest {
            model_uri: model_uri.clone(),
            text: text.to_string(),
        };
        match self.transport.tokenize(request).await {
            Ok(count) => (count, true),
            Err(e) => {
                tracing::warn!("Tokenize failed, using estimate: {}", e);
                (estimate_tokens(text), false)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::ScriptedTransport;

    #[test]
    fn test_estimate_empty_and_blank() {
        assert_eq!(estimate_tokens(""), 0);
        assert_eq!(estimate_tokens("   \n\t "), 0);
    }

    #[test]
    fn test_estimate_non_blank_at_least_one() {
        assert_eq!(estimate_tokens("a"), 1);
        assert!(estimate_tokens("?") >= 1);
    }

    #[test]
    fn test_estimate_ignores_whitespace() {
        // 35 non-whitespace chars -> 35 / 3.5 * 1.1 = 11
        let text = "abcde ".repeat(7);
        assert_eq!(estimate_tokens(&text), 11);
        assert_eq!(estimate_tokens(&"a".repeat(35)), 11);
    }

    #[test]
    fn test_estimate_counts_chars_not_bytes() {
        assert_eq!(estimate_tokens("привет"), estimate_tokens("hello!"));
    }

    #[test]
    fn test_total_saturates() {
        let count = TokenCount {
            input: u32::MAX,
            output: 5,
            source: TokenSource::Provider,
        };
        assert_eq!(count.total(), u32::MAX);
    }

    #[tokio::test]
    async fn test_provider_usage_wins() {
        let transport = Arc::new(ScriptedTransport::new());
        let resolver = TokenResolver::new(transport.clone(), Some("gpt://f/m".into()));
        let usage = TokenUsage {
            input: 7,
            output: 3,
            total: 10,
        };
        let count = resolver.resolve(Some(usage), "in", "out").await;
        assert_eq!((count.input, count.output), (7, 3));
        assert_eq!(count.source, TokenSource::Provider);
        assert_eq!(transport.tokenize_calls(), 0);
    }

    #[tokio::test]
    async fn test_zero_usage_falls_back_to_tokenizer() {
        let transport = Arc::new(ScriptedTransport::new().with_tokenize_count(5));
        let resolver = TokenResolver::new(transport.clone(), Some("gpt://f/m".into()));
        let count = resolver
            .resolve(Some(TokenUsage::default()), "hello", "world")
            .await;
        assert_eq!((count.input, count.output), (5, 5));
        assert_eq!(count.source, TokenSource::Tokenizer);
        assert_eq!(transport.tokenize_calls(), 2);
    }

    #[tokio::test]
    async fn test_tokenizer_failure_falls_back_to_estimate() {
        let transport = Arc::new(ScriptedTransport::new());
        let resolver = TokenResolver::new(transport, Some("gpt://f/m".into()));
        let count = resolver.resolve(None, &"a".repeat(35), "").await;
        assert_eq!(count.input, 11);
        assert_eq!(count.output, 0);
        assert_eq!(count.source, TokenSource::Estimate);
    }

    #[tokio::test]
    async fn test_no_tokenizer_model_uses_estimate() {
        let transport = Arc::new(ScriptedTransport::new().with_tokenize_count(99));
        let resolver = TokenResolver::new(transport.clone(), None);
        let count = resolver.resolve(None, "Hello", "Hi there").await;
        assert_eq!(count.input, estimate_tokens("Hello"));
        assert_eq!(count.output, estimate_tokens("Hi there"));
        assert_eq!(transport.tokenize_calls(), 0);
    }
}
