//! Configuration types for the BearyChat adapter.
//!
//! # Example Configuration
//!
//! ```toml
//! adapter = "bearychat"
//!
//! [adapters.bearychat]
//! # Full incoming-webhook URL, or just the hook token
//! webhook = "${BEARYCHAT_WEBHOOK}"
//! # Outgoing-robot endpoint
//! listen = "0.0.0.0:9900"
//! path = "/bearychat"
//! token = "outgoing-robot-token"
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default host that bare webhook tokens are joined onto.
pub const DEFAULT_BASE_URL: &str = "https://hook.bearychat.com";

/// BearyChat adapter configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BearyChatConfig {
    /// Incoming-webhook URL or bare hook token.
    pub webhook: String,

    /// Base URL for bare hook tokens.
    pub base_url: String,

    /// Address the outgoing-robot endpoint binds to.
    pub listen: String,

    /// Path of the outgoing-robot endpoint.
    pub path: String,

    /// Expected outgoing-robot token. Requests carrying a different token are
    /// rejected.
    pub token: Option<String>,

    /// Per-request timeout for webhook calls.
    pub timeout_secs: u64,

    /// Extra attempts after a failed webhook call.
    pub retries: u32,
}

impl Default for BearyChatConfig {
    fn default() -> Self {
        Self {
            webhook: String::new(),
            base_url: DEFAULT_BASE_URL.to_string(),
            listen: "0.0.0.0:9900".to_string(),
            path: "/bearychat".to_string(),
            token: None,
            timeout_secs: 30,
            retries: 2,
        }
    }
}

impl BearyChatConfig {
    /// Returns the request timeout.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }

    /// Returns the endpoint path with a leading slash.
    pub fn normalized_path(&self) -> String {
        if self.path.starts_with('/') {
            self.path.clone()
        } else {
            format!("/{}", self.path)
        }
    }
}
