//! Configuration validation utilities.

use super::error::{ConfigError, ConfigResult};
use super::schema::{ChimeConfig, EngineConfig, LogOutput, LoggingConfig};

/// Validates the entire configuration.
pub fn validate_config(config: &ChimeConfig) -> ConfigResult<()> {
    validate_engine_config(&config.engine)?;
    validate_logging_config(&config.logging)?;
    validate_dialogs(config)?;
    Ok(())
}

/// Validates engine settings.
fn validate_engine_config(engine: &EngineConfig) -> ConfigResult<()> {
    for (code, text) in &engine.code_replies {
        if code.trim().is_empty() {
            return Err(ConfigError::validation("Code reply keys cannot be empty"));
        }
        if text.is_empty() {
            return Err(ConfigError::validation(format!(
                "Code reply for '{code}' cannot be empty"
            )));
        }
    }
    Ok(())
}

/// Validates logging settings.
fn validate_logging_config(logging: &LoggingConfig) -> ConfigResult<()> {
    if logging.output == LogOutput::File && logging.file_path.is_none() {
        return Err(ConfigError::missing_field("logging.file_path"));
    }
    if logging.filters.keys().any(|module| module.trim().is_empty()) {
        return Err(ConfigError::validation("Log filter module names cannot be empty"));
    }
    Ok(())
}

/// Validates dialog file entries.
fn validate_dialogs(config: &ChimeConfig) -> ConfigResult<()> {
    for path in &config.dialogs {
        if path.as_os_str().is_empty() {
            return Err(ConfigError::validation("Dialog paths cannot be empty"));
        }
        if path.extension().and_then(|e| e.to_str()) != Some("json") {
            return Err(ConfigError::validation(format!(
                "Dialog file must be JSON: {}",
                path.display()
            )));
        }
    }
    Ok(())
}
