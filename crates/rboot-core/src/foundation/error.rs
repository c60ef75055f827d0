//! Unified error types for the rboot core.
//!
//! Each component owns one error enum. Runtime-level errors (configuration,
//! backend detection) are defined in rboot-runtime.

use std::time::Duration;

use thiserror::Error;

// =============================================================================
// Registry Errors
// =============================================================================

/// Errors raised while registering or resolving scripts.
#[derive(Debug, Clone, Error)]
pub enum RegistryError {
    /// A script with the same name is already registered.
    #[error("script '{name}' is already registered")]
    DuplicateName {
        /// The duplicate script name.
        name: String,
    },

    /// No script with the requested name exists.
    #[error("script '{name}' is not registered")]
    NotFound {
        /// The missing script name.
        name: String,
    },

    /// A rule pattern failed to compile.
    #[error("invalid pattern for rule '{rule}' of script '{script}': {reason}")]
    InvalidPattern {
        /// Script owning the rule.
        script: String,
        /// Name of the offending rule.
        rule: String,
        /// Compiler message.
        reason: String,
    },

    /// The script declares no rules and could never be matched.
    #[error("script '{name}' has no rules")]
    NoRules {
        /// The script name.
        name: String,
    },
}

// =============================================================================
// Script Errors
// =============================================================================

/// Failure of a script action or event subscriber.
///
/// These never escape the task that ran the script; the dispatcher logs them
/// and drops the replies of the offending message.
#[derive(Debug, Clone, Error)]
pub enum ScriptError {
    /// The action reported a failure.
    #[error("script failed: {0}")]
    Failed(String),

    /// The action ran longer than the configured timeout.
    #[error("script timed out after {0:?}")]
    Timeout(Duration),

    /// The action panicked.
    #[error("script panicked: {0}")]
    Panicked(String),

    /// The outbound stream was closed while the action tried to send.
    #[error("outbound stream closed")]
    OutboundClosed,

    /// A memorizer call failed.
    #[error(transparent)]
    Memorizer(#[from] MemorizerError),
}

impl ScriptError {
    /// Creates a [`ScriptError::Failed`] from any message.
    pub fn failed(msg: impl Into<String>) -> Self {
        Self::Failed(msg.into())
    }
}

// =============================================================================
// Memorizer Errors
// =============================================================================

/// Errors reported by memorizer backends.
#[derive(Debug, Clone, Error)]
pub enum MemorizerError {
    /// The backend could not be initialized or is not usable.
    #[error("memorizer unavailable: {0}")]
    Unavailable(String),

    /// I/O failure in a persistent backend.
    #[error("memorizer I/O error: {0}")]
    Io(String),

    /// The stored data could not be encoded or decoded.
    #[error("memorizer serialization error: {0}")]
    Serialization(String),
}

impl From<std::io::Error> for MemorizerError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<serde_json::Error> for MemorizerError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

// =============================================================================
// Adapter Errors
// =============================================================================

/// Errors that can occur in adapter operations.
#[derive(Debug, Clone, Error)]
pub enum AdapterError {
    /// The inbound stream was already handed out.
    #[error("incoming stream of adapter '{adapter}' was already taken")]
    IncomingTaken {
        /// The adapter name.
        adapter: String,
    },

    /// The transport side of the pipes was already handed out.
    #[error("transport side of adapter '{adapter}' was already taken")]
    TransportTaken {
        /// The adapter name.
        adapter: String,
    },

    /// Invalid adapter configuration.
    #[error("invalid adapter configuration: {0}")]
    InvalidConfig(String),

    /// Delivery or connection failure on the transport.
    #[error("transport error: {0}")]
    Transport(String),

    /// Internal adapter error.
    #[error("adapter error: {0}")]
    Internal(String),
}

impl AdapterError {
    /// Creates an internal adapter error.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Creates a transport error.
    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }

    /// Creates an invalid configuration error.
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }
}

impl From<std::io::Error> for AdapterError {
    fn from(err: std::io::Error) -> Self {
        Self::Transport(err.to_string())
    }
}

// =============================================================================
// Dispatch Errors
// =============================================================================

/// Errors returned by the dispatcher lifecycle.
#[derive(Debug, Clone, Error)]
pub enum DispatchError {
    /// `start` was called on a running dispatcher.
    #[error("dispatcher is already running")]
    AlreadyStarted,

    /// `start` was called after the dispatcher stopped.
    #[error("dispatcher has been stopped")]
    AlreadyStopped,
}

// =============================================================================
// Event Errors
// =============================================================================

/// Errors returned by the event stream.
#[derive(Debug, Clone, Error)]
pub enum EventError {
    /// The consume loop has ended; nothing can be published anymore.
    #[error("event stream is closed")]
    Closed,
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for registry operations.
pub type RegistryResult<T> = Result<T, RegistryError>;

/// Result type for script actions.
pub type ScriptResult<T> = Result<T, ScriptError>;

/// Result type for memorizer operations.
pub type MemorizerResult<T> = Result<T, MemorizerError>;

/// Result type for adapter operations.
pub type AdapterResult<T> = Result<T, AdapterError>;

/// Result type for dispatcher operations.
pub type DispatchResult<T> = Result<T, DispatchError>;

/// Result type for event stream operations.
pub type EventResult<T> = Result<T, EventError>;
