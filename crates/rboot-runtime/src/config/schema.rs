//! Configuration schema definitions.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use figment::value::Value;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::error::{ConfigError, ConfigResult};
use rboot_core::DispatcherConfig;

// =============================================================================
// Root
// =============================================================================

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RbootConfig {
    /// Bot name; also the id of the bot user.
    #[serde(default = "default_name")]
    pub name: String,

    /// Identifier of the adapter to run.
    #[serde(default = "default_adapter")]
    pub adapter: String,

    /// Identifier of the memorizer backend.
    #[serde(default = "default_memorizer")]
    pub memorizer: String,

    /// Dispatcher tuning.
    #[serde(default)]
    pub dispatcher: DispatcherSettings,

    /// Event stream settings.
    #[serde(default)]
    pub events: EventSettings,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Free-form per-adapter sections, keyed by adapter identifier.
    #[serde(default)]
    pub adapters: HashMap<String, Value>,

    /// Free-form per-memorizer sections, keyed by memorizer identifier.
    #[serde(default)]
    pub memorizers: HashMap<String, Value>,
}

impl Default for RbootConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            adapter: default_adapter(),
            memorizer: default_memorizer(),
            dispatcher: DispatcherSettings::default(),
            events: EventSettings::default(),
            logging: LoggingConfig::default(),
            adapters: HashMap::new(),
            memorizers: HashMap::new(),
        }
    }
}

impl RbootConfig {
    /// Deserializes the `[adapters.<name>]` section. Returns `None` when the
    /// section is absent.
    pub fn adapter_section<T>(&self, name: &str) -> ConfigResult<Option<T>>
    where
        T: DeserializeOwned,
    {
        section(&self.adapters, "adapters", name)
    }

    /// Deserializes the `[memorizers.<name>]` section.
    pub fn memorizer_section<T>(&self, name: &str) -> ConfigResult<Option<T>>
    where
        T: DeserializeOwned,
    {
        section(&self.memorizers, "memorizers", name)
    }
}

fn section<T: DeserializeOwned>(
    sections: &HashMap<String, Value>,
    kind: &'static str,
    name: &str,
) -> ConfigResult<Option<T>> {
    sections
        .get(name)
        .map(|value| {
            value
                .deserialize::<T>()
                .map_err(|e| ConfigError::InvalidSection {
                    section: kind,
                    name: name.to_string(),
                    reason: e.to_string(),
                })
        })
        .transpose()
}

fn default_name() -> String {
    "Rboot".to_string()
}

fn default_adapter() -> String {
    "cli".to_string()
}

fn default_memorizer() -> String {
    "memory".to_string()
}

// =============================================================================
// Dispatcher & Events
// =============================================================================

/// Dispatcher tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatcherSettings {
    /// Maximum number of messages handled concurrently.
    #[serde(default = "default_capacity")]
    pub max_in_flight: usize,

    /// Capacity of the adapter's inbound and outbound channels.
    #[serde(default = "default_capacity")]
    pub channel_capacity: usize,

    /// Per-script timeout in seconds; 0 disables the timeout.
    #[serde(default)]
    pub script_timeout_secs: u64,
}

impl Default for DispatcherSettings {
    fn default() -> Self {
        Self {
            max_in_flight: default_capacity(),
            channel_capacity: default_capacity(),
            script_timeout_secs: 0,
        }
    }
}

impl DispatcherSettings {
    /// Converts to the core dispatcher config.
    pub fn to_dispatcher_config(&self) -> DispatcherConfig {
        DispatcherConfig {
            max_in_flight: self.max_in_flight,
            script_timeout: (self.script_timeout_secs > 0)
                .then(|| Duration::from_secs(self.script_timeout_secs)),
        }
    }
}

/// Event stream settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventSettings {
    /// Number of events that can be queued before publishers wait.
    #[serde(default = "default_capacity")]
    pub capacity: usize,
}

impl Default for EventSettings {
    fn default() -> Self {
        Self {
            capacity: default_capacity(),
        }
    }
}

fn default_capacity() -> usize {
    64
}

// =============================================================================
// Logging
// =============================================================================

/// Log verbosity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    #[serde(alias = "warning")]
    Warn,
    Error,
}

impl LogLevel {
    /// Returns the level as a filter directive string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }

    /// Converts to a `tracing` level.
    pub fn to_tracing_level(self) -> tracing::Level {
        match self {
            Self::Trace => tracing::Level::TRACE,
            Self::Debug => tracing::Level::DEBUG,
            Self::Info => tracing::Level::INFO,
            Self::Warn => tracing::Level::WARN,
            Self::Error => tracing::Level::ERROR,
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Log line format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Compact,
    Full,
    Pretty,
    /// Requires the `json-log` feature.
    Json,
}

/// Log destination.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogOutput {
    #[default]
    Stdout,
    Stderr,
    File,
}

/// Which span lifecycle events are logged.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpanEventMode {
    #[default]
    None,
    /// Span creation and close; shows how long each script ran.
    Lifecycle,
    /// Enter and exit.
    Active,
    /// Every span event.
    Full,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Base level; `RUST_LOG` takes precedence when set.
    #[serde(default)]
    pub level: LogLevel,

    /// Line format.
    #[serde(default)]
    pub format: LogFormat,

    /// Destination.
    #[serde(default)]
    pub output: LogOutput,

    /// Log file used when `output = "file"`.
    #[serde(default = "default_log_file")]
    pub file_path: PathBuf,

    /// Per-module levels, e.g. `rboot_core = "debug"`.
    #[serde(default)]
    pub filters: HashMap<String, LogLevel>,

    /// Span events to log.
    #[serde(default)]
    pub span_events: SpanEventMode,

    /// Include thread ids.
    #[serde(default)]
    pub thread_ids: bool,

    /// Include source file and line.
    #[serde(default)]
    pub file_location: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::default(),
            format: LogFormat::default(),
            output: LogOutput::default(),
            file_path: default_log_file(),
            filters: HashMap::new(),
            span_events: SpanEventMode::default(),
            thread_ids: false,
            file_location: false,
        }
    }
}

fn default_log_file() -> PathBuf {
    PathBuf::from("rboot.log")
}

// =============================================================================
// Built-in memorizer sections
// =============================================================================

/// `[memorizers.file]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileMemorizerConfig {
    /// Snapshot file.
    #[serde(default = "default_memo_path")]
    pub path: PathBuf,
}

impl Default for FileMemorizerConfig {
    fn default() -> Self {
        Self {
            path: default_memo_path(),
        }
    }
}

fn default_memo_path() -> PathBuf {
    PathBuf::from("rboot-memo.json")
}
