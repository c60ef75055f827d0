//! rboot Runtime - Orchestration layer for the rboot chat-bot router.
//!
//! This crate provides:
//! - Layered configuration loading (`RbootConfig`, `ConfigLoader`)
//! - Adapter and memorizer detection (`BackendRegistry`)
//! - Runtime orchestration with signal handling (`Rboot`)
//! - Logging configuration
//!
//! # Backend Detection
//!
//! The `adapter` and `memorizer` configuration keys (or `RBOOT_ADAPTER` and
//! `RBOOT_MEMORIZER`) select the backends by name. The built-in memorizers are
//! `memory` (default) and `file`; adapters are registered by the application:
//!
//! ```ignore
//! use rboot_runtime::Rboot;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let mut bot = Rboot::new();
//!
//!     bot.register_adapter::<CliAdapter>();
//!     bot.register_script(
//!         Script::new("ping", |_ctx| async { Ok(vec![Message::new("pong")]) })
//!             .rule("ping", r"^ping$"),
//!     )?;
//!
//!     // Run until Ctrl+C
//!     bot.run().await?;
//!
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod logging;
pub mod registry;
pub mod runtime;

// Re-exports
pub use config::{ConfigError, ConfigLoader, ConfigResult, RbootConfig};
pub use error::{RuntimeError, RuntimeResult};
pub use logging::{LoggingBuilder, SpanEvents};
pub use registry::{AdapterFactory, BackendRegistry, MemorizerFactory};
pub use runtime::{Rboot, RunningBot, RuntimeBuilder, STARTED_EVENT, STOPPING_EVENT};

// Re-export tracing for use by other crates
pub use tracing;

/// Prelude module for convenient imports.
///
/// This provides all the commonly used logging macros:
/// - `trace!`, `debug!`, `info!`, `warn!`, `error!`
/// - `span`, `event`
/// - `instrument` attribute
/// - `Level` for span creation
pub mod prelude {
    pub use tracing::{Level, debug, error, event, info, instrument, span, trace, warn};
}
