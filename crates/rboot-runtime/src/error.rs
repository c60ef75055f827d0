//! Runtime error types.

use thiserror::Error;

pub use crate::config::{ConfigError, ConfigResult};

/// Errors that can occur during runtime operations.
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// Configuration could not be loaded or is invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The configured adapter is not registered.
    #[error("Unknown adapter '{name}' (available: {})", .available.join(", "))]
    UnknownAdapter {
        /// The requested adapter identifier.
        name: String,
        /// Registered adapter identifiers.
        available: Vec<String>,
    },

    /// Adapter configuration deserialization failed.
    #[error("Failed to deserialize adapter config: {0}")]
    AdapterConfigDeserialize(String),

    /// Adapter error.
    #[error("Adapter error: {0}")]
    Adapter(#[from] rboot_core::AdapterError),

    /// Script registration failed.
    #[error("Script registration failed: {0}")]
    Registry(#[from] rboot_core::RegistryError),

    /// Dispatcher lifecycle error.
    #[error("Dispatcher error: {0}")]
    Dispatch(#[from] rboot_core::DispatchError),

    /// The runtime was already started once.
    #[error("Runtime is already running")]
    AlreadyRunning,
}

/// Result type for runtime operations.
pub type RuntimeResult<T> = Result<T, RuntimeError>;
