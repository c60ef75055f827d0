//! Main runtime orchestration.
//!
//! [`Rboot`] collects scripts, event subscribers and backend factories, then
//! wires them together on start: it detects the adapter and the memorizer
//! named in the configuration, starts the adapter, the event stream and the
//! dispatcher, and publishes [`STARTED_EVENT`].
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use rboot_runtime::Rboot;
//!
//! // Loads rboot.toml from the current directory plus RBOOT_* variables
//! let mut bot = Rboot::new();
//! bot.register_adapter::<CliAdapter>();
//! bot.register_script(ping_script())?;
//! bot.run().await?;
//! ```
//!
//! # Custom Configuration
//!
//! ```rust,ignore
//! let mut bot = Rboot::builder()
//!     .config_file("config/production.toml")
//!     .profile("production")
//!     .build()?;
//! ```

use std::future::Future;

use futures::future::BoxFuture;
use serde_json::json;
use tokio::signal;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::{ConfigLoader, ConfigResult, RbootConfig};
use crate::error::{RuntimeError, RuntimeResult};
use crate::logging;
use crate::registry::BackendRegistry;
use rboot_core::{
    Adapter, AdapterInit, BoxedAdapter, BoxedMemorizer, ConfigurableAdapter, Contacts,
    DispatchStats, Dispatcher, EventContext, EventPublisher, EventStream, Memorizer,
    MemorizerResult, Script, ScriptRegistry, Subscriber, User,
};

/// Published once the dispatcher is consuming.
pub const STARTED_EVENT: &str = "rboot.started";

/// Published when shutdown begins, before the dispatcher stops.
pub const STOPPING_EVENT: &str = "rboot.stopping";

/// The rboot runtime.
///
/// Scripts and subscribers can only be added before [`start`](Self::start);
/// the runtime starts at most once.
pub struct Rboot {
    config: RbootConfig,
    scripts: ScriptRegistry,
    events: Option<EventStream>,
    publisher: EventPublisher,
    backends: BackendRegistry,
    contacts: Contacts,
}

impl Rboot {
    /// Creates a runtime with automatic configuration loading.
    ///
    /// Searches `rboot.toml` in the current directory and the user config
    /// directory, then applies `RBOOT_*` environment variables. Falls back to
    /// the defaults if loading fails.
    pub fn new() -> Self {
        let config = ConfigLoader::new().load().unwrap_or_else(|e| {
            eprintln!("Warning: Failed to load config ({e}), using defaults");
            RbootConfig::default()
        });

        Self::from_config(&config)
    }

    /// Creates a runtime builder for custom configuration.
    pub fn builder() -> RuntimeBuilder {
        RuntimeBuilder::new()
    }

    /// Creates a runtime from configuration.
    ///
    /// Initializes logging from `config.logging` unless a subscriber is
    /// already installed.
    pub fn from_config(config: &RbootConfig) -> Self {
        logging::init_from_config(&config.logging);

        info!(
            log_level = %config.logging.level,
            log_format = ?config.logging.format,
            "Runtime initialized from configuration"
        );

        let events = EventStream::new(config.events.capacity);
        let publisher = events.publisher();

        Self {
            config: config.clone(),
            scripts: ScriptRegistry::new(),
            events: Some(events),
            publisher,
            backends: BackendRegistry::new(),
            contacts: Contacts::new(),
        }
    }

    /// Returns a reference to the configuration.
    pub fn config(&self) -> &RbootConfig {
        &self.config
    }

    /// Returns the number of registered scripts.
    pub fn script_count(&self) -> usize {
        self.scripts.len()
    }

    /// Returns the roster the adapter fills once started.
    pub fn contacts(&self) -> &Contacts {
        &self.contacts
    }

    /// Renders the help text of the scripts registered so far, one line per
    /// script.
    pub fn help(&self) -> String {
        self.scripts.help()
    }

    /// Registers a script. Scripts are matched in registration order.
    pub fn register_script(&mut self, script: Script) -> RuntimeResult<()> {
        self.scripts.register(script)?;
        Ok(())
    }

    /// Registers multiple scripts at once, stopping at the first failure.
    pub fn register_scripts(
        &mut self,
        scripts: impl IntoIterator<Item = Script>,
    ) -> RuntimeResult<()> {
        for script in scripts {
            self.register_script(script)?;
        }
        Ok(())
    }

    /// Subscribes to events named `topic` (`*` for all events).
    ///
    /// Subscriptions made after [`start`](Self::start) are ignored.
    pub fn subscribe(&mut self, topic: impl Into<String>, subscriber: impl Subscriber) {
        match self.events.as_mut() {
            Some(events) => events.subscribe(topic, subscriber),
            None => warn!("Runtime already started, subscription ignored"),
        }
    }

    /// Returns a publisher onto the event stream.
    pub fn publisher(&self) -> EventPublisher {
        self.publisher.clone()
    }

    /// Registers a configurable adapter factory.
    ///
    /// The adapter is only built if `config.adapter` selects it. Its
    /// `[adapters.<NAME>]` section is deserialized into `A::Config`, or the
    /// default configuration is used.
    pub fn register_adapter<A>(&mut self) -> &mut Self
    where
        A: ConfigurableAdapter + 'static,
    {
        self.backends.register_adapter::<A>();
        self
    }

    /// Registers a memorizer factory under `name`.
    pub fn register_memorizer<F>(&mut self, name: impl Into<String>, factory: F) -> &mut Self
    where
        F: Fn(&RbootConfig) -> BoxFuture<'static, MemorizerResult<BoxedMemorizer>>
            + Send
            + Sync
            + 'static,
    {
        self.backends.register_memorizer(name, factory);
        self
    }

    /// Returns the backend registry for custom factories.
    pub fn backends_mut(&mut self) -> &mut BackendRegistry {
        &mut self.backends
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Starts the bot.
    ///
    /// Fails if the configured adapter is unknown or cannot start. An unknown
    /// or failing memorizer is replaced by a no-op store.
    pub async fn start(&mut self) -> RuntimeResult<RunningBot> {
        let Some(events) = self.events.take() else {
            return Err(RuntimeError::AlreadyRunning);
        };

        info!(
            name = %self.config.name,
            version = env!("CARGO_PKG_VERSION"),
            "Starting rboot"
        );

        let init = AdapterInit {
            bot: User::with_id(self.config.name.clone()),
            channel_capacity: self.config.dispatcher.channel_capacity,
            contacts: self.contacts.clone(),
        };
        let adapter = self.backends.create_adapter(&self.config, init)?;

        let memorizer = self.backends.create_memorizer(&self.config).await;
        if let Some(e) = memorizer.error() {
            warn!(memorizer = %self.config.memorizer, error = %e, "Memorizer is degraded");
        }

        adapter.on_start().await?;
        info!(adapter = %adapter.name(), "Adapter started");

        let incoming = adapter.incoming()?;
        let outgoing = adapter.outgoing();

        let events_shutdown = CancellationToken::new();
        let events_handle = events.start(
            EventContext::new(memorizer.clone(), outgoing.clone())
                .with_contacts(self.contacts.clone()),
            events_shutdown.clone(),
        );

        let scripts = std::mem::take(&mut self.scripts);
        let script_names: Vec<String> = scripts.names().map(str::to_string).collect();
        let dispatcher = Dispatcher::new(scripts, memorizer.clone())
            .with_contacts(self.contacts.clone())
            .with_config(self.config.dispatcher.to_dispatcher_config());
        let dispatch_handle = dispatcher.start(incoming, outgoing)?;

        let payload = json!({
            "name": self.config.name,
            "adapter": self.config.adapter,
            "memorizer": self.config.memorizer,
            "scripts": script_names,
            "contacts": self.contacts.len(),
        });
        if let Err(e) = self.publisher.emit(STARTED_EVENT, payload).await {
            warn!(error = %e, "Failed to publish started event");
        }

        info!("rboot started");

        Ok(RunningBot {
            adapter,
            memorizer,
            contacts: self.contacts.clone(),
            dispatcher,
            dispatch_handle,
            events_handle,
            events_shutdown,
            publisher: self.publisher.clone(),
            stats: None,
        })
    }

    /// Runs the bot until Ctrl+C, SIGTERM or the adapter closing its inbound
    /// stream, then shuts down gracefully.
    pub async fn run(&mut self) -> RuntimeResult<DispatchStats> {
        let mut bot = self.start().await?;

        info!("rboot is now running. Press Ctrl+C to stop.");

        tokio::select! {
            _ = wait_for_shutdown() => {}
            _ = bot.closed() => info!("Inbound stream closed, shutting down"),
        }

        Ok(bot.stop().await)
    }

    /// Runs the bot until `shutdown` completes or the inbound stream closes.
    pub async fn run_until<F>(&mut self, shutdown: F) -> RuntimeResult<DispatchStats>
    where
        F: Future<Output = ()>,
    {
        let mut bot = self.start().await?;

        tokio::select! {
            _ = shutdown => {}
            _ = bot.closed() => info!("Inbound stream closed, shutting down"),
        }

        Ok(bot.stop().await)
    }
}

impl Default for Rboot {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Rboot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Rboot")
            .field("name", &self.config.name)
            .field("scripts", &self.scripts)
            .field("backends", &self.backends)
            .field("started", &self.events.is_none())
            .finish()
    }
}

/// Waits for Ctrl+C or SIGTERM.
async fn wait_for_shutdown() {
    #[cfg(unix)]
    {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = signal::ctrl_c() => info!("Received Ctrl+C, shutting down"),
                    _ = sigterm.recv() => info!("Received SIGTERM, shutting down"),
                }
                return;
            }
            Err(e) => warn!(error = %e, "Failed to register SIGTERM handler"),
        }
    }

    match signal::ctrl_c().await {
        Ok(()) => info!("Received Ctrl+C, shutting down"),
        Err(e) => {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    }
}

// =============================================================================
// RunningBot
// =============================================================================

/// Handle to a started bot.
pub struct RunningBot {
    adapter: BoxedAdapter,
    memorizer: BoxedMemorizer,
    contacts: Contacts,
    dispatcher: Dispatcher,
    dispatch_handle: JoinHandle<DispatchStats>,
    events_handle: JoinHandle<()>,
    events_shutdown: CancellationToken,
    publisher: EventPublisher,
    stats: Option<DispatchStats>,
}

impl RunningBot {
    /// Returns the running adapter.
    pub fn adapter(&self) -> &BoxedAdapter {
        &self.adapter
    }

    /// Returns the shared memorizer.
    pub fn memorizer(&self) -> &BoxedMemorizer {
        &self.memorizer
    }

    /// Returns the users known to the adapter.
    pub fn contacts(&self) -> &Contacts {
        &self.contacts
    }

    /// Returns a publisher onto the event stream.
    pub fn publisher(&self) -> EventPublisher {
        self.publisher.clone()
    }

    /// Resolves once the dispatcher has ended, usually because the adapter
    /// closed its inbound stream.
    pub async fn closed(&mut self) -> DispatchStats {
        if let Some(stats) = self.stats {
            return stats;
        }

        let stats = match (&mut self.dispatch_handle).await {
            Ok(stats) => stats,
            Err(e) => {
                error!(error = %e, "Dispatcher task failed");
                DispatchStats::default()
            }
        };
        self.stats = Some(stats);
        stats
    }

    /// Shuts the bot down.
    ///
    /// Publishes [`STOPPING_EVENT`], stops reading inbound messages, waits for
    /// in-flight scripts and pending event deliveries, then shuts the adapter
    /// down.
    pub async fn stop(mut self) -> DispatchStats {
        info!("Stopping rboot");

        if let Err(e) = self.publisher.emit(STOPPING_EVENT, json!({})).await {
            debug!(error = %e, "Stopping event not published");
        }

        self.dispatcher.stop();
        let stats = self.closed().await;

        self.events_shutdown.cancel();
        if let Err(e) = (&mut self.events_handle).await {
            error!(error = %e, "Event stream task failed");
        }

        if let Err(e) = self.adapter.on_shutdown().await {
            error!(adapter = %self.adapter.name(), error = %e, "Error during adapter shutdown");
        }

        info!(%stats, "rboot stopped");
        stats
    }
}

impl std::fmt::Debug for RunningBot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunningBot")
            .field("adapter", &self.adapter.name())
            .field("dispatcher", &self.dispatcher)
            .finish_non_exhaustive()
    }
}

// =============================================================================
// RuntimeBuilder
// =============================================================================

/// Builder for creating an [`Rboot`] with custom configuration.
pub struct RuntimeBuilder {
    config_loader: ConfigLoader,
}

impl RuntimeBuilder {
    /// Creates a new runtime builder.
    pub fn new() -> Self {
        Self {
            config_loader: ConfigLoader::new(),
        }
    }

    /// Sets a specific configuration file to load.
    pub fn config_file<P: AsRef<std::path::Path>>(mut self, path: P) -> Self {
        self.config_loader = self.config_loader.file(path);
        self
    }

    /// Sets the configuration profile (e.g., "development", "production").
    pub fn profile(mut self, profile: impl Into<String>) -> Self {
        self.config_loader = self.config_loader.profile(profile);
        self
    }

    /// Adds a search path for configuration files.
    pub fn search_path<P: AsRef<std::path::Path>>(mut self, path: P) -> Self {
        self.config_loader = self.config_loader.search_path(path);
        self
    }

    /// Disables loading environment variables.
    pub fn without_env(mut self) -> Self {
        self.config_loader = self.config_loader.without_env();
        self
    }

    /// Merges additional configuration programmatically.
    pub fn merge(mut self, config: RbootConfig) -> Self {
        self.config_loader = self.config_loader.merge(config);
        self
    }

    /// Overrides a single key, e.g. `set("adapter", "bearychat")`.
    pub fn set<T: serde::Serialize>(mut self, key: &str, value: T) -> Self {
        self.config_loader = self.config_loader.set(key, value);
        self
    }

    /// Builds the runtime.
    pub fn build(self) -> ConfigResult<Rboot> {
        let config = self.config_loader.load()?;
        Ok(Rboot::from_config(&config))
    }
}

impl Default for RuntimeBuilder {
    fn default() -> Self {
        Self::new()
    }
}
