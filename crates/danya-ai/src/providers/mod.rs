//! Provider implementations

pub mod yandex;

pub use yandex::{ClientConfig, Credentials, YandexClient};
