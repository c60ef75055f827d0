//! Backend registry for adapter and memorizer detection.
//!
//! The configured `adapter` and `memorizer` identifiers are resolved against
//! named factories registered here. Adapter resolution is strict: an unknown
//! identifier aborts startup. Memorizer resolution degrades instead: an
//! unknown or failing backend is logged and replaced by a [`NoopMemorizer`].

use std::collections::HashMap;
use std::sync::Arc;

use futures::future::BoxFuture;
use tracing::{debug, info, warn};

use crate::config::{FileMemorizerConfig, RbootConfig};
use crate::error::{RuntimeError, RuntimeResult};
use rboot_core::{
    AdapterInit, BoxedAdapter, BoxedMemorizer, ConfigurableAdapter, FileMemorizer,
    MemorizerError, MemorizerResult, MemoryMemorizer, NoopMemorizer,
};

/// Builds an adapter from the loaded configuration.
pub type AdapterFactory =
    Box<dyn Fn(&RbootConfig, AdapterInit) -> RuntimeResult<BoxedAdapter> + Send + Sync>;

/// Builds a memorizer from the loaded configuration.
pub type MemorizerFactory =
    Box<dyn Fn(&RbootConfig) -> BoxFuture<'static, MemorizerResult<BoxedMemorizer>> + Send + Sync>;

/// Named adapter and memorizer factories.
pub struct BackendRegistry {
    adapters: HashMap<String, AdapterFactory>,
    memorizers: HashMap<String, MemorizerFactory>,
}

impl BackendRegistry {
    /// Creates a registry with the built-in `memory` and `file` memorizers.
    pub fn new() -> Self {
        let mut registry = Self::empty();

        registry.register_memorizer("memory", |_config| {
            Box::pin(async { Ok(Arc::new(MemoryMemorizer::new()) as BoxedMemorizer) })
        });

        registry.register_memorizer("file", |config| {
            let section = config.memorizer_section::<FileMemorizerConfig>("file");
            Box::pin(async move {
                let settings = section
                    .map_err(|e| MemorizerError::Unavailable(e.to_string()))?
                    .unwrap_or_default();
                Ok(Arc::new(FileMemorizer::open(settings.path).await) as BoxedMemorizer)
            })
        });

        registry
    }

    /// Creates a registry without any factories.
    pub fn empty() -> Self {
        Self {
            adapters: HashMap::new(),
            memorizers: HashMap::new(),
        }
    }

    // =========================================================================
    // Adapters
    // =========================================================================

    /// Registers a configurable adapter under [`ConfigurableAdapter::NAME`].
    ///
    /// At creation time the `[adapters.<NAME>]` section is deserialized into
    /// `A::Config`; when the section is absent the default configuration is
    /// used.
    pub fn register_adapter<A>(&mut self)
    where
        A: ConfigurableAdapter + 'static,
    {
        self.register_adapter_fn(A::NAME, |config, init| {
            let adapter_config: A::Config = match config.adapter_section(A::NAME) {
                Ok(Some(section)) => section,
                Ok(None) => {
                    warn!(
                        adapter = A::NAME,
                        "No configuration found for adapter, using default"
                    );
                    Default::default()
                }
                Err(e) => return Err(RuntimeError::AdapterConfigDeserialize(e.to_string())),
            };

            let adapter = A::from_config(adapter_config, init)?;
            Ok(adapter as BoxedAdapter)
        });
    }

    /// Registers an adapter factory under `name`, replacing any previous one.
    pub fn register_adapter_fn<F>(&mut self, name: impl Into<String>, factory: F)
    where
        F: Fn(&RbootConfig, AdapterInit) -> RuntimeResult<BoxedAdapter> + Send + Sync + 'static,
    {
        let name = name.into();
        debug!(adapter = %name, "Registered adapter factory");
        self.adapters.insert(name, Box::new(factory));
    }

    /// Returns the registered adapter identifiers, sorted.
    pub fn adapter_names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.adapters.keys().cloned().collect();
        names.sort();
        names
    }

    /// Creates the adapter selected by `config.adapter`.
    pub fn create_adapter(
        &self,
        config: &RbootConfig,
        init: AdapterInit,
    ) -> RuntimeResult<BoxedAdapter> {
        let factory =
            self.adapters
                .get(&config.adapter)
                .ok_or_else(|| RuntimeError::UnknownAdapter {
                    name: config.adapter.clone(),
                    available: self.adapter_names(),
                })?;

        let adapter = factory(config, init)?;
        info!(adapter = %config.adapter, "Adapter selected");
        Ok(adapter)
    }

    // =========================================================================
    // Memorizers
    // =========================================================================

    /// Registers a memorizer factory under `name`, replacing any previous one.
    pub fn register_memorizer<F>(&mut self, name: impl Into<String>, factory: F)
    where
        F: Fn(&RbootConfig) -> BoxFuture<'static, MemorizerResult<BoxedMemorizer>>
            + Send
            + Sync
            + 'static,
    {
        let name = name.into();
        debug!(memorizer = %name, "Registered memorizer factory");
        self.memorizers.insert(name, Box::new(factory));
    }

    /// Returns the registered memorizer identifiers, sorted.
    pub fn memorizer_names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.memorizers.keys().cloned().collect();
        names.sort();
        names
    }

    /// Creates the memorizer selected by `config.memorizer`.
    ///
    /// Never fails: an unknown identifier or a factory error yields a
    /// [`NoopMemorizer`] whose [`error`](rboot_core::Memorizer::error) carries
    /// the reason.
    pub async fn create_memorizer(&self, config: &RbootConfig) -> BoxedMemorizer {
        let Some(factory) = self.memorizers.get(&config.memorizer) else {
            let reason = format!(
                "unknown memorizer '{}' (available: {})",
                config.memorizer,
                self.memorizer_names().join(", ")
            );
            warn!(memorizer = %config.memorizer, "{reason}, falling back to no-op store");
            return Arc::new(NoopMemorizer::new(reason));
        };

        match factory(config).await {
            Ok(memorizer) => {
                info!(memorizer = %config.memorizer, "Memorizer selected");
                memorizer
            }
            Err(e) => {
                warn!(
                    memorizer = %config.memorizer,
                    error = %e,
                    "Memorizer failed to initialize, falling back to no-op store"
                );
                Arc::new(NoopMemorizer::new(e.to_string()))
            }
        }
    }
}

impl Default for BackendRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for BackendRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendRegistry")
            .field("adapters", &self.adapter_names())
            .field("memorizers", &self.memorizer_names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rboot_core::{Adapter, AdapterPipes, Memorizer};

    fn config_with(adapter: &str, memorizer: &str) -> RbootConfig {
        RbootConfig {
            adapter: adapter.into(),
            memorizer: memorizer.into(),
            ..Default::default()
        }
    }

    #[test]
    fn test_unknown_adapter_lists_available() {
        let mut registry = BackendRegistry::new();
        registry.register_adapter_fn("shell", |_, _| {
            Err(RuntimeError::AdapterConfigDeserialize("unused".into()))
        });

        let result =
            registry.create_adapter(&config_with("slack", "memory"), AdapterInit::default());

        match result {
            Err(RuntimeError::UnknownAdapter { name, available }) => {
                assert_eq!(name, "slack");
                assert_eq!(available, vec!["shell".to_string()]);
            }
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("unknown adapter was created"),
        }
    }

    #[tokio::test]
    async fn test_memory_memorizer_is_default() {
        let registry = BackendRegistry::new();
        let memorizer = registry.create_memorizer(&RbootConfig::default()).await;

        memorizer.save("k", b"v".to_vec()).await.unwrap();
        assert_eq!(memorizer.read("k").await.unwrap(), Some(b"v".to_vec()));
        assert!(memorizer.error().is_none());
    }

    #[tokio::test]
    async fn test_unknown_memorizer_degrades_to_noop() {
        let registry = BackendRegistry::new();
        let memorizer = registry
            .create_memorizer(&config_with("cli", "redis"))
            .await;

        assert!(matches!(
            memorizer.error(),
            Some(MemorizerError::Unavailable(reason)) if reason.contains("redis")
        ));
        memorizer.save("k", b"v".to_vec()).await.unwrap();
        assert_eq!(memorizer.read("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_failing_memorizer_degrades_to_noop() {
        let mut registry = BackendRegistry::empty();
        registry.register_memorizer("flaky", |_| {
            Box::pin(async { Err(MemorizerError::Io("connection refused".into())) })
        });

        let memorizer = registry
            .create_memorizer(&config_with("cli", "flaky"))
            .await;

        assert!(matches!(
            memorizer.error(),
            Some(MemorizerError::Unavailable(reason)) if reason.contains("connection refused")
        ));
    }

    #[tokio::test]
    async fn test_file_memorizer_reads_section() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("memo.json");

        let mut config = config_with("cli", "file");
        config.memorizers.insert(
            "file".into(),
            figment::value::Value::serialize(serde_json::json!({
                "path": path.to_string_lossy(),
            }))
            .unwrap(),
        );

        let registry = BackendRegistry::new();
        let memorizer = registry.create_memorizer(&config).await;
        memorizer.save("k", b"v".to_vec()).await.unwrap();

        assert!(path.exists());
    }

    #[test]
    fn test_adapter_fn_receives_init() {
        let mut registry = BackendRegistry::empty();
        registry.register_adapter_fn("pipes", |_, init| {
            assert_eq!(init.bot.id, "Rboot");
            Ok(Arc::new(TestAdapter(AdapterPipes::new("pipes", init.channel_capacity)))
                as BoxedAdapter)
        });

        let init = AdapterInit {
            bot: rboot_core::User::with_id("Rboot"),
            channel_capacity: 4,
            ..Default::default()
        };
        let adapter = registry
            .create_adapter(&config_with("pipes", "memory"), init)
            .unwrap();
        assert_eq!(adapter.name(), "pipes");
    }

    struct TestAdapter(AdapterPipes);

    #[async_trait::async_trait]
    impl Adapter for TestAdapter {
        fn name(&self) -> &str {
            "pipes"
        }

        async fn on_start(&self) -> rboot_core::AdapterResult<()> {
            Ok(())
        }

        fn incoming(
            &self,
        ) -> rboot_core::AdapterResult<tokio::sync::mpsc::Receiver<rboot_core::Message>> {
            self.0.take_incoming()
        }

        fn outgoing(&self) -> tokio::sync::mpsc::Sender<rboot_core::Message> {
            self.0.outgoing()
        }
    }
}
