//! Configuration types for the CLI adapter.
//!
//! # Example Configuration
//!
//! ```toml
//! adapter = "cli"
//!
//! [adapters.cli]
//! user = "alice"
//! ```

use serde::{Deserialize, Serialize};

/// CLI adapter configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    /// Identity attached to every line read from the terminal.
    pub user: String,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            user: "cli".to_string(),
        }
    }
}
