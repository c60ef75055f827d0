//! Configuration validation utilities.

use super::error::{ConfigError, ConfigResult};
use super::schema::{LogFormat, RbootConfig};

/// Validates the entire configuration.
pub fn validate_config(config: &RbootConfig) -> ConfigResult<()> {
    validate_names(config)?;
    validate_capacities(config)?;
    validate_logging(config)?;
    Ok(())
}

fn validate_names(config: &RbootConfig) -> ConfigResult<()> {
    if config.name.trim().is_empty() {
        return Err(ConfigError::missing_field("name"));
    }
    if config.adapter.trim().is_empty() {
        return Err(ConfigError::missing_field("adapter"));
    }
    if config.memorizer.trim().is_empty() {
        return Err(ConfigError::missing_field("memorizer"));
    }
    Ok(())
}

fn validate_capacities(config: &RbootConfig) -> ConfigResult<()> {
    if config.dispatcher.max_in_flight == 0 {
        return Err(ConfigError::validation(
            "dispatcher.max_in_flight must be greater than 0",
        ));
    }
    if config.dispatcher.channel_capacity == 0 {
        return Err(ConfigError::validation(
            "dispatcher.channel_capacity must be greater than 0",
        ));
    }
    if config.events.capacity == 0 {
        return Err(ConfigError::validation(
            "events.capacity must be greater than 0",
        ));
    }
    Ok(())
}

fn validate_logging(config: &RbootConfig) -> ConfigResult<()> {
    if config.logging.format == LogFormat::Json && !cfg!(feature = "json-log") {
        return Err(ConfigError::validation(
            "logging.format = \"json\" requires the json-log feature",
        ));
    }
    if config.logging.file_path.as_os_str().is_empty() {
        return Err(ConfigError::missing_field("logging.file_path"));
    }
    Ok(())
}
