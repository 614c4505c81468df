//! danya-ai: wire layer for Yandex Foundation Models and AI Studio agents
//!
//! This crate provides the request/response types for the completion, agent
//! and tokenize endpoints and an HTTP client that talks to them.

pub mod error;
pub mod providers;
pub mod types;

pub use error::{Error, Result};
pub use providers::{ClientConfig, Credentials, YandexClient};
pub use types::*;
