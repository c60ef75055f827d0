//! Configuration loader using figment.
//!
//! # Feature Flags
//!
//! - `toml-config` *(default)*: enables TOML configuration files (`rboot.toml`, `config.toml`)
//! - `yaml-config`: enables YAML configuration files (`rboot.yaml`, `rboot.yml`, ...)
//!
//! Both features can be enabled simultaneously; if so, both file formats are searched and loaded.
//!
//! # Configuration Priority (lowest to highest)
//!
//! 1. Built-in defaults
//! 2. Profile-specific config file (`rboot.{profile}.toml` / `rboot.{profile}.yaml`)
//! 3. Main config file (`rboot.toml` / `rboot.yaml`)
//! 4. Environment variables (`RBOOT_*`)
//! 5. Programmatic overrides
//!
//! # Environment Variable Mapping
//!
//! Environment variables are mapped using the `RBOOT_` prefix with `__` as separator:
//!
//! - `RBOOT_ADAPTER=bearychat` → `adapter = "bearychat"`
//! - `RBOOT_DISPATCHER__MAX_IN_FLIGHT=8` → `dispatcher.max_in_flight = 8`
//! - `RBOOT_ADAPTERS__BEARYCHAT__WEBHOOK=xxx` → `adapters.bearychat.webhook = "xxx"`
//!
//! # Example
//!
//! ```rust,ignore
//! use rboot_runtime::config::ConfigLoader;
//!
//! let config = ConfigLoader::new()
//!     .profile("production")
//!     .load()?;
//! ```

use std::path::{Path, PathBuf};

use figment::Figment;
#[cfg(any(feature = "yaml-config", feature = "toml-config"))]
use figment::providers::Format;
#[cfg(feature = "toml-config")]
use figment::providers::Toml;
#[cfg(feature = "yaml-config")]
use figment::providers::Yaml;
use figment::providers::{Env, Serialized};
use tracing::{debug, info, trace};

use super::error::{ConfigError, ConfigResult};
use super::schema::RbootConfig;
use super::validation::validate_config;

/// Environment variable prefix.
pub const ENV_PREFIX: &str = "RBOOT_";

/// Configuration profile for environment-specific settings.
#[derive(Debug, Clone, Default)]
pub enum Profile {
    /// Development profile (default).
    #[default]
    Development,
    /// Production profile.
    Production,
    /// Custom profile name.
    Custom(String),
}

impl Profile {
    /// Returns the profile name as a string.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Development => "development",
            Self::Production => "production",
            Self::Custom(name) => name,
        }
    }

    /// Parses a profile name.
    pub fn parse(name: &str) -> Self {
        match name.to_lowercase().as_str() {
            "production" | "prod" => Self::Production,
            "development" | "dev" => Self::Development,
            other => Self::Custom(other.to_string()),
        }
    }

    /// Reads `RBOOT_PROFILE`, defaulting to Development.
    pub fn from_env() -> Self {
        std::env::var("RBOOT_PROFILE")
            .map(|p| Self::parse(&p))
            .unwrap_or_default()
    }
}

impl std::fmt::Display for Profile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Configuration loader with figment-based multi-source support.
pub struct ConfigLoader {
    profile: Profile,
    search_paths: Vec<PathBuf>,
    load_env: bool,
    config_file: Option<PathBuf>,
    overrides: Figment,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    /// Creates a new configuration loader with defaults.
    pub fn new() -> Self {
        Self {
            profile: Profile::from_env(),
            search_paths: Vec::new(),
            load_env: true,
            config_file: None,
            overrides: Figment::new(),
        }
    }

    /// Sets the configuration profile.
    pub fn profile(mut self, profile: impl Into<String>) -> Self {
        self.profile = Profile::parse(&profile.into());
        self
    }

    /// Adds a search path for configuration files.
    pub fn search_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.search_paths.push(path.as_ref().to_path_buf());
        self
    }

    /// Adds current directory to search paths.
    pub fn with_current_dir(self) -> Self {
        match std::env::current_dir() {
            Ok(cwd) => self.search_path(cwd),
            Err(_) => self,
        }
    }

    /// Adds user config directory to search paths.
    pub fn with_user_config_dir(self) -> Self {
        match dirs::config_dir() {
            Some(config_dir) => self.search_path(config_dir.join("rboot")),
            None => self,
        }
    }

    /// Sets a specific configuration file to load (skips the search).
    pub fn file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_file = Some(path.as_ref().to_path_buf());
        self
    }

    /// Enables loading environment variables (default: true).
    pub fn with_env(mut self) -> Self {
        self.load_env = true;
        self
    }

    /// Disables loading environment variables.
    pub fn without_env(mut self) -> Self {
        self.load_env = false;
        self
    }

    /// Merges a configuration on top of every other source.
    pub fn merge(mut self, config: RbootConfig) -> Self {
        self.overrides = self.overrides.merge(Serialized::defaults(config));
        self
    }

    /// Sets a single key on top of every other source, e.g.
    /// `.set("dispatcher.max_in_flight", 4)`.
    pub fn set<T: serde::Serialize>(mut self, key: &str, value: T) -> Self {
        self.overrides = self.overrides.merge(Serialized::default(key, value));
        self
    }

    /// Loads, validates and returns the configuration.
    pub fn load(self) -> ConfigResult<RbootConfig> {
        let profile = self.profile.clone();
        let figment = self.build_figment()?;

        let config: RbootConfig = figment.extract()?;
        validate_config(&config)?;

        debug!(
            profile = %profile,
            adapter = %config.adapter,
            memorizer = %config.memorizer,
            "Configuration loaded successfully"
        );

        Ok(config)
    }

    /// Builds the figment instance with all sources.
    fn build_figment(mut self) -> ConfigResult<Figment> {
        let mut figment = Figment::from(Serialized::defaults(RbootConfig::default()));

        if let Some(path) = self.config_file.take() {
            if !path.exists() {
                return Err(ConfigError::FileNotFound(path));
            }
            info!(path = %path.display(), "Loading configuration file");
            figment = Self::merge_config_file(figment, &path)?;
        } else {
            figment = self.load_config_files(figment);
        }

        if self.load_env {
            trace!("Loading environment variables with {ENV_PREFIX} prefix");
            figment = figment.merge(Env::prefixed(ENV_PREFIX).split("__"));
        }

        Ok(figment.merge(std::mem::take(&mut self.overrides)))
    }

    /// Merges a single config file into the figment, dispatching on file extension.
    fn merge_config_file(figment: Figment, path: &Path) -> ConfigResult<Figment> {
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
        match ext {
            #[cfg(feature = "toml-config")]
            "toml" => Ok(figment.merge(Toml::file(path))),
            #[cfg(feature = "yaml-config")]
            "yaml" | "yml" => Ok(figment.merge(Yaml::file(path))),
            _ => Err(ConfigError::UnsupportedFormat(ext.to_string())),
        }
    }

    /// Resolves the effective list of search paths.
    fn resolve_search_paths(&self) -> Vec<PathBuf> {
        if !self.search_paths.is_empty() {
            return self.search_paths.clone();
        }
        let mut paths = Vec::new();
        if let Ok(cwd) = std::env::current_dir() {
            paths.push(cwd);
        }
        if let Some(config_dir) = dirs::config_dir() {
            paths.push(config_dir.join("rboot"));
        }
        paths
    }

    /// Searches one file format.
    ///
    /// Iterates `search_paths × base_names`, merging a profile-specific
    /// variant first and then the base file. Stops at the first base file.
    #[cfg(any(feature = "toml-config", feature = "yaml-config"))]
    fn load_format_files<F>(
        &self,
        mut figment: Figment,
        search_paths: &[PathBuf],
        base_names: &[&str],
        merge_fn: F,
    ) -> (Figment, bool)
    where
        F: Fn(Figment, &Path) -> Figment,
    {
        for search_path in search_paths {
            for base_name in base_names {
                let Some((stem, ext)) = base_name.rsplit_once('.') else {
                    continue;
                };

                let profile_path =
                    search_path.join(format!("{stem}.{}.{ext}", self.profile.as_str()));
                if profile_path.exists() {
                    debug!(path = %profile_path.display(), "Loading profile-specific config");
                    figment = merge_fn(figment, &profile_path);
                }

                let base_path = search_path.join(base_name);
                if base_path.exists() {
                    info!(path = %base_path.display(), "Loading configuration file");
                    figment = merge_fn(figment, &base_path);
                    return (figment, true);
                }
            }
        }
        (figment, false)
    }

    /// Searches for and loads configuration files from search paths.
    #[allow(unused_mut)]
    fn load_config_files(&self, mut figment: Figment) -> Figment {
        let search_paths = self.resolve_search_paths();
        let mut found = false;

        #[cfg(feature = "toml-config")]
        {
            let (f, ok) = self.load_format_files(
                figment,
                &search_paths,
                &["rboot.toml", "config.toml"],
                |fig, path| fig.merge(Toml::file(path)),
            );
            figment = f;
            found |= ok;
        }

        #[cfg(feature = "yaml-config")]
        {
            let (f, ok) = self.load_format_files(
                figment,
                &search_paths,
                &["rboot.yaml", "rboot.yml", "config.yaml", "config.yml"],
                |fig, path| fig.merge(Yaml::file(path)),
            );
            figment = f;
            found |= ok;
        }

        if !found {
            debug!(paths = ?search_paths, "No configuration file found, using defaults");
        }
        figment
    }
}

/// Loads the configuration from the default locations.
pub fn load_config() -> ConfigResult<RbootConfig> {
    ConfigLoader::new().load()
}

/// Loads the configuration from a specific file plus the environment.
pub fn load_config_from_file<P: AsRef<Path>>(path: P) -> ConfigResult<RbootConfig> {
    ConfigLoader::new().file(path).load()
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use figment::Jail;

    use super::*;
    use crate::config::LogLevel;

    #[test]
    fn test_default_config() {
        Jail::expect_with(|_jail| {
            let config = ConfigLoader::new().without_env().load().unwrap();

            assert_eq!(config.adapter, "cli");
            assert_eq!(config.logging.level.as_str(), "info");
            Ok(())
        });
    }

    #[test]
    fn test_file_then_env_then_overrides() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "rboot.toml",
                r#"
                    name = "Herald"
                    adapter = "bearychat"

                    [dispatcher]
                    max_in_flight = 8

                    [logging]
                    level = "debug"

                    [adapters.bearychat]
                    webhook = "token"
                "#,
            )?;
            jail.set_env("RBOOT_DISPATCHER__MAX_IN_FLIGHT", "16");
            jail.set_env("RBOOT_MEMORIZER", "file");

            let config = ConfigLoader::new()
                .search_path(jail.directory())
                .set("events.capacity", 4)
                .load()
                .unwrap();

            assert_eq!(config.name, "Herald");
            assert_eq!(config.adapter, "bearychat");
            assert_eq!(config.memorizer, "file");
            assert_eq!(config.dispatcher.max_in_flight, 16);
            assert_eq!(config.events.capacity, 4);
            assert_eq!(config.logging.level, LogLevel::Debug);
            assert!(config.adapters.contains_key("bearychat"));
            Ok(())
        });
    }

    #[test]
    fn test_profile_file_is_merged_under_base() {
        Jail::expect_with(|jail| {
            jail.create_file("rboot.production.toml", "memorizer = \"file\"\nname = \"Prod\"")?;
            jail.create_file("rboot.toml", "name = \"Base\"")?;

            let config = ConfigLoader::new()
                .without_env()
                .profile("prod")
                .search_path(jail.directory())
                .load()
                .unwrap();

            assert_eq!(config.memorizer, "file");
            assert_eq!(config.name, "Base");
            Ok(())
        });
    }

    #[test]
    fn test_explicit_file_must_exist() {
        let dir = tempfile::tempdir().unwrap();
        let err = ConfigLoader::new()
            .without_env()
            .file(dir.path().join("missing.toml"))
            .load()
            .unwrap_err();

        assert!(matches!(err, ConfigError::FileNotFound(_)));
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rboot.toml");
        std::fs::write(&path, "[dispatcher]\nmax_in_flight = 0\n").unwrap();

        let err = ConfigLoader::new()
            .without_env()
            .file(&path)
            .load()
            .unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError { .. }));

        std::fs::write(&path, "[logging]\nlevel = \"loud\"\n").unwrap();
        let err = ConfigLoader::new()
            .without_env()
            .file(&path)
            .load()
            .unwrap_err();
        assert!(matches!(err, ConfigError::ParseError(_)));
    }

    #[test]
    fn test_profile_parse() {
        assert!(matches!(Profile::parse("PROD"), Profile::Production));
        assert!(matches!(Profile::parse("dev"), Profile::Development));
        assert_eq!(Profile::parse("staging").as_str(), "staging");
    }
}
