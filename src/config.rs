//! Bot configuration.

use crate::protocol::Mode;
use crate::Result;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Browser identity presented on every request.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Tunables for a [`Bot`](crate::Bot).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BotConfig {
    /// Login mode (normal web client or desktop-patched).
    pub mode: Mode,
    pub user_agent: String,
    /// Timeout for ordinary requests.
    pub request_timeout_secs: u64,
    /// Timeout for requests the server holds open (check-login, sync-check).
    pub long_poll_timeout_secs: u64,
    /// Pause after a suppressed sync error before checking again.
    pub sync_error_pause_ms: u64,
    /// Bytes per `webwxuploadmedia` chunk.
    pub upload_chunk_size: usize,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            mode: Mode::Normal,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            request_timeout_secs: 30,
            long_poll_timeout_secs: 40,
            sync_error_pause_ms: 1_000,
            upload_chunk_size: 512 * 1024,
        }
    }
}

impl BotConfig {
    /// Defaults with the desktop login patch enabled.
    pub fn desktop() -> Self {
        Self {
            mode: Mode::Desktop,
            ..Self::default()
        }
    }

    /// Parse a JSON document; missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn with_mode(mut self, mode: Mode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    pub fn with_long_poll_timeout(mut self, timeout: Duration) -> Self {
        self.long_poll_timeout_secs = timeout.as_secs();
        self
    }

    pub fn with_sync_error_pause(mut self, pause: Duration) -> Self {
        self.sync_error_pause_ms = pause.as_millis() as u64;
        self
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn long_poll_timeout(&self) -> Duration {
        Duration::from_secs(self.long_poll_timeout_secs)
    }

    pub fn sync_error_pause(&self) -> Duration {
        Duration::from_millis(self.sync_error_pause_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_keeps_defaults() {
        let cfg = BotConfig::from_json(r#"{"mode":"desktop","request_timeout_secs":5}"#).unwrap();
        assert_eq!(cfg.mode, Mode::Desktop);
        assert_eq!(cfg.request_timeout(), Duration::from_secs(5));
        assert_eq!(cfg.upload_chunk_size, 512 * 1024);
        assert_eq!(cfg.user_agent, DEFAULT_USER_AGENT);
    }

    #[test]
    fn desktop_preset() {
        assert_eq!(BotConfig::desktop().mode, Mode::Desktop);
        assert_eq!(BotConfig::default().mode, Mode::Normal);
    }
}
