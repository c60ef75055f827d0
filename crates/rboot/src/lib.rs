//! # rboot
//!
//! A chat-bot message router. Inbound chat messages are matched against an
//! ordered list of regex rules; the first matching rule selects a script whose
//! replies are sent back to the sender through the same adapter.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────┐ inbound  ┌────────────┐  first match  ┌───────────────────────────┐
//! │  Adapter  │─────────▶│ Dispatcher │──────────────▶│ Script (own task, context) │
//! │ cli/beary │◀─────────│            │◀──────────────│   └─▶ Memorizer            │
//! └───────────┘ outbound └────────────┘    replies    └───────────────────────────┘
//! ```
//!
//! - **Runtime**: loads configuration, detects backends, runs the lifecycle
//! - **Adapters**: transports selected by `adapter = "..."` (`RBOOT_ADAPTER`)
//! - **Scripts**: named actions with one or more regex rules
//! - **Memorizer**: key/value store shared by scripts (`RBOOT_MEMORIZER`)
//! - **Events**: lifecycle and custom events for subscribers
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use rboot::prelude::*;
//!
//! async fn ping(_ctx: ScriptContext) -> ScriptResult<Vec<Message>> {
//!     Ok(vec![Message::new("pong")])
//! }
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let mut bot = Rboot::new();
//!     rboot::register_builtin_adapters(&mut bot);
//!
//!     bot.register_script(Script::new("ping", ping).rule("ping", r"^ping$"))?;
//!
//!     bot.run().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - `cli`: terminal adapter (default)
//! - `bearychat`: BearyChat webhook adapter
//! - `toml-config`: `rboot.toml` configuration files (default)
//! - `yaml-config`: `rboot.yaml` configuration files
//! - `json-log`: JSON log output

pub use rboot_core as core;
pub use rboot_runtime as runtime;

#[cfg(feature = "bearychat")]
pub use rboot_adapter_bearychat as bearychat;
#[cfg(feature = "cli")]
pub use rboot_adapter_cli as cli;

pub use rboot_runtime::{Rboot, RuntimeError, RuntimeResult};

/// Registers every adapter enabled by cargo features.
#[allow(unused_variables)]
pub fn register_builtin_adapters(bot: &mut Rboot) {
    #[cfg(feature = "cli")]
    bot.register_adapter::<rboot_adapter_cli::CliAdapter>();

    #[cfg(feature = "bearychat")]
    bot.register_adapter::<rboot_adapter_bearychat::BearyChatAdapter>();
}

/// Prelude module for convenient imports.
///
/// ```rust,ignore
/// use rboot::prelude::*;
/// ```
pub mod prelude {
    // Runtime - main entry point
    pub use rboot_runtime::{Rboot, RunningBot, STARTED_EVENT, STOPPING_EVENT};

    // Scripts and rules
    pub use rboot_core::{
        ExactRule, Message, RegexRule, Rule, Script, ScriptContext, ScriptError, ScriptResult,
        User,
    };

    // Collaborators
    pub use rboot_core::{Contacts, Event, EventContext, EventPublisher, Memorizer};

    #[cfg(feature = "bearychat")]
    pub use rboot_adapter_bearychat::BearyChatAdapter;
    #[cfg(feature = "cli")]
    pub use rboot_adapter_cli::CliAdapter;
}
