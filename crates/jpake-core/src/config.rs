//! Pairing client configuration.
//!
//! Values come from a TOML file or `JPAKE_*` environment variables. Retry
//! budgets are per phase: the first and last messages wait on a human, the
//! middle of the exchange should be quick.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::stage::RetryPhase;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PairingConfig {
    /// Base URL of the rendezvous server.
    pub server_url: String,

    // Polling
    pub poll_interval_ms: u64,
    pub max_tries_first: u32,
    pub max_tries: u32,
    pub max_tries_last: u32,
    pub request_timeout_secs: u64,

    pub log_level: String,
}

impl Default for PairingConfig {
    fn default() -> Self {
        Self {
            server_url: "http://127.0.0.1:8080".to_string(),
            poll_interval_ms: 1000,
            max_tries_first: 300,
            max_tries: 10,
            max_tries_last: 300,
            request_timeout_secs: 60,
            log_level: "warn".to_string(),
        }
    }
}

impl PairingConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let mut config = Self::default();

        if let Ok(url) = std::env::var("JPAKE_SERVER_URL") {
            config.server_url = url;
        }

        if let Ok(ms) = std::env::var("JPAKE_POLL_INTERVAL_MS") {
            config.poll_interval_ms = ms.parse()?;
        }

        if let Ok(tries) = std::env::var("JPAKE_MAX_TRIES") {
            config.max_tries = tries.parse()?;
        }

        if let Ok(tries) = std::env::var("JPAKE_MAX_TRIES_FIRST") {
            config.max_tries_first = tries.parse()?;
        }

        if let Ok(tries) = std::env::var("JPAKE_MAX_TRIES_LAST") {
            config.max_tries_last = tries.parse()?;
        }

        if let Ok(secs) = std::env::var("JPAKE_REQUEST_TIMEOUT_SECS") {
            config.request_timeout_secs = secs.parse()?;
        }

        if let Ok(level) = std::env::var("JPAKE_LOG_LEVEL") {
            config.log_level = level;
        }

        Ok(config)
    }

    pub fn from_toml(path: impl AsRef<std::path::Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> anyhow::Result<Self> {
        let config: PairingConfig = toml::from_str(content)?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.server_url.trim().is_empty() {
            anyhow::bail!("server_url must be set");
        }

        if self.max_tries == 0 || self.max_tries_first == 0 || self.max_tries_last == 0 {
            anyhow::bail!("max_tries values must be > 0");
        }

        if self.request_timeout_secs == 0 {
            anyhow::bail!("request_timeout_secs must be > 0");
        }

        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Attempt budget for a network stage in `phase`.
    pub fn max_tries_for(&self, phase: RetryPhase) -> u32 {
        match phase {
            RetryPhase::First => self.max_tries_first,
            RetryPhase::Middle => self.max_tries,
            RetryPhase::Last => self.max_tries_last,
        }
    }
}
