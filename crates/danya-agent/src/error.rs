//! Error types for danya-agent

use thiserror::Error;

/// Result type alias using danya-agent Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while processing a chat turn
#[derive(Error, Debug)]
pub enum Error {
    /// An error from the provider layer
    #[error(transparent)]
    Ai(#[from] danya_ai::Error),

    /// History compression failed (always swallowed by the session)
    #[error("Compression error: {0}")]
    Compression(String),

    /// The provider answered without any text
    #[error("Empty response")]
    EmptyResponse,

    /// The turn was aborted through the session handle
    #[error("Cancelled")]
    Cancelled,

    /// The agent roster failed validation
    #[error("Invalid agent roster: {0}")]
    InvalidRoster(String),

    /// The persistence collaborator failed
    #[error("Store error: {0}")]
    Store(String),

    /// A generic error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Text shown to the user for this failure. Each class gets its own message.
    pub fn user_message(&self) -> String {
        match self {
            Error::Ai(e) if e.is_connectivity() => {
                "Connection error. Check your internet connection.".to_string()
            }
            Error::Ai(e) if e.is_timeout() => {
                "Request timed out. Please try again.".to_string()
            }
            Error::Ai(e) if e.is_auth() => {
                "Authorization error. Check your API key and folder id.".to_string()
            }
            Error::Ai(danya_ai::Error::Api { code, message }) => {
                if code.is_empty() {
                    format!("Provider error: {}", message)
                } else {
                    format!("Provider error: {} (code {})", message, code)
                }
            }
            Error::Ai(e) if e.is_content() => {
                "Could not get a response from the bot.".to_string()
            }
            Error::EmptyResponse => "Could not get a response from the bot.".to_string(),
            Error::Cancelled => "Request cancelled.".to_string(),
            other => format!("Error: {}", other),
        }
    }
}
