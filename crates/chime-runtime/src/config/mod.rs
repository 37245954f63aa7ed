//! Configuration module for the Chime runtime.
//!
//! This module provides layered configuration loading (defaults, TOML files,
//! `CHIME_*` environment variables) and validation for the engine, logging
//! and dialog files.

pub mod error;
pub mod loader;
pub mod schema;
pub mod validation;

pub use error::{ConfigError, ConfigResult};
pub use loader::{ConfigLoader, Profile, load_config, load_config_from_file};
pub use schema::{
    ChimeConfig, EngineConfig, LogFormat, LogLevel, LogOutput, LoggingConfig, SpanEventConfig,
};
pub use validation::validate_config;
