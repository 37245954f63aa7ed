//! Runtime error types.

use thiserror::Error;

use crate::config::ConfigError;
use chime_core::StoreError;
use chime_framework::RuleError;

/// Errors that can occur during runtime operations.
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// A raw payload could not be turned into an inbound message.
    #[error("Invalid inbound payload: {0}")]
    InvalidPayload(#[from] serde_json::Error),

    /// Session store failure on an explicit store operation.
    #[error("Session store error: {0}")]
    Store(#[from] StoreError),

    /// Rule registration failed.
    #[error("Rule error: {0}")]
    Rule(#[from] RuleError),

    /// Configuration could not be loaded.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Result type for runtime operations.
pub type RuntimeResult<T> = Result<T, RuntimeError>;
