//! Configuration module for the rboot runtime.
//!
//! Layered loading (defaults, files, `RBOOT_*` environment, overrides) and
//! validation of bot, dispatcher, logging and backend settings.

pub mod error;
pub mod loader;
pub mod schema;
pub mod validation;

pub use error::{ConfigError, ConfigResult};
pub use loader::{ConfigLoader, ENV_PREFIX, Profile, load_config, load_config_from_file};
pub use schema::{
    DispatcherSettings, EventSettings, FileMemorizerConfig, LogFormat, LogLevel, LogOutput,
    LoggingConfig, RbootConfig, SpanEventMode,
};
pub use validation::validate_config;
