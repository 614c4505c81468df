//! Error types for danya-ai

use thiserror::Error;

/// Result type alias using danya-ai Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur when talking to the provider endpoints
#[derive(Error, Debug)]
pub enum Error {
    /// Could not reach the host (DNS, refused connection, TLS setup)
    #[error("Connection failed: {0}")]
    Connect(String),

    /// The transport gave up waiting for a response
    #[error("Request timed out: {0}")]
    Timeout(String),

    /// Any other HTTP client failure
    #[error("HTTP error: {0}")]
    Http(reqwest::Error),

    /// Server answered 401 or 403
    #[error("Authentication failed ({status}): {body}")]
    Auth { status: u16, body: String },

    /// Server answered with some other non-2xx status
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// A 2xx response carrying an explicit error object
    #[error("API error: {message} (code: {code})")]
    Api { code: String, message: String },

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The response carried no text where a reply was expected
    #[error("Empty response")]
    EmptyResponse,

    /// Response did not match any known shape
    #[error("Unexpected response: {0}")]
    UnexpectedResponse(String),

    /// Invalid or missing API key / IAM token
    #[error("Invalid or missing API key")]
    InvalidApiKey,

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The transport does not implement this operation
    #[error("Operation not supported: {0}")]
    Unsupported(String),
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Error::Timeout(e.to_string())
        } else if e.is_connect() {
            Error::Connect(e.to_string())
        } else if e.is_decode() {
            Error::UnexpectedResponse(e.to_string())
        } else {
            Error::Http(e)
        }
    }
}

impl Error {
    /// Create a provider-semantic error from code and message
    pub fn api(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Api {
            code: code.into(),
            message: message.into(),
        }
    }

    /// Map a non-2xx status and its body to an error
    pub fn from_status(status: u16, body: impl Into<String>) -> Self {
        let body = body.into();
        match status {
            401 | 403 => Error::Auth { status, body },
            _ => Error::Status { status, body },
        }
    }

    /// Transport-level failure: no connectivity
    pub fn is_connectivity(&self) -> bool {
        matches!(self, Error::Connect(_))
    }

    /// Transport-level failure: timed out
    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::Timeout(_))
    }

    /// Authorization failure, either from the status code or a provider error code
    pub fn is_auth(&self) -> bool {
        match self {
            Error::Auth { .. } | Error::InvalidApiKey => true,
            Error::Api { code, .. } => code == "401" || code == "403",
            _ => false,
        }
    }

    /// Empty or unparseable body where a reply was expected
    pub fn is_content(&self) -> bool {
        matches!(
            self,
            Error::EmptyResponse | Error::UnexpectedResponse(_) | Error::Json(_)
        )
    }
}
