//! Terminal adapter for rboot.
//!
//! Reads one message per line from stdin and prints replies to stdout. This is
//! the default adapter (`adapter = "cli"`) and the quickest way to try scripts
//! locally:
//!
//! ```rust,ignore
//! use rboot_adapter_cli::CliAdapter;
//! use rboot_runtime::Rboot;
//!
//! let mut bot = Rboot::new();
//! bot.register_adapter::<CliAdapter>();
//! bot.run().await?;
//! ```

mod adapter;
mod config;

pub use adapter::CliAdapter;
pub use config::CliConfig;
