use crate::backoff::BackoffPolicy;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconnectConfig {
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub max_attempts: u32,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            base_delay_ms: 1000,
            max_delay_ms: 30_000,
            max_attempts: 5,
        }
    }
}

impl From<&ReconnectConfig> for BackoffPolicy {
    fn from(config: &ReconnectConfig) -> Self {
        Self {
            base: Duration::from_millis(config.base_delay_ms),
            cap: Duration::from_millis(config.max_delay_ms),
            max_attempts: config.max_attempts,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    pub server_url: String,
    pub feed_path: String,
    pub reconnect: ReconnectConfig,
    pub connect_timeout_ms: u64,
    pub fetch_state_on_open: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server_url: String::from("http://127.0.0.1:8080"),
            feed_path: String::from("/ws/state"),
            reconnect: Default::default(),
            connect_timeout_ms: 10_000,
            fetch_state_on_open: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Server URL {0:?} must start with http:// or https://")]
pub struct BadServerUrl(pub String);

impl AppConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn api_base(&self) -> &str {
        self.server_url.trim_end_matches('/')
    }

    /// The push feed lives on the same host, reached over `ws://` or `wss://`.
    pub fn feed_url(&self) -> Result<String, BadServerUrl> {
        let base = self.api_base();
        let host = if let Some(rest) = base.strip_prefix("http://") {
            format!("ws://{rest}")
        } else if let Some(rest) = base.strip_prefix("https://") {
            format!("wss://{rest}")
        } else {
            return Err(BadServerUrl(self.server_url.clone()));
        };
        if self.feed_path.starts_with('/') {
            Ok(format!("{host}{}", self.feed_path))
        } else {
            Ok(format!("{host}/{}", self.feed_path))
        }
    }
}
