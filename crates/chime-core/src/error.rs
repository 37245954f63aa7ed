//! Unified error types for the Chime core.
//!
//! This module provides the error types that travel with a turn: handler
//! failures, the terminal error attached to a reply, and session store
//! failures. Registration (usage) errors are defined in `chime-framework`.

use thiserror::Error;

// =============================================================================
// Handler Errors
// =============================================================================

/// Errors a rule handler can report.
///
/// A handler either fails with a status code (looked up in the configured
/// code replies when the turn ends without a reply) or with a free-form
/// message.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HandlerError {
    /// Status-style failure, e.g. `403`.
    #[error("status {0}")]
    Status(u16),

    /// Free-form failure.
    #[error("{0}")]
    Failed(String),
}

impl HandlerError {
    /// Creates a status-code error.
    pub fn status(code: u16) -> Self {
        Self::Status(code)
    }

    /// Creates a free-form error.
    pub fn failed(msg: impl Into<String>) -> Self {
        Self::Failed(msg.into())
    }

    /// Returns the code used to look up a human readable reply.
    pub fn code(&self) -> String {
        match self {
            Self::Status(code) => code.to_string(),
            Self::Failed(msg) => msg.clone(),
        }
    }
}

impl From<String> for HandlerError {
    fn from(msg: String) -> Self {
        Self::Failed(msg)
    }
}

impl From<&str> for HandlerError {
    fn from(msg: &str) -> Self {
        Self::Failed(msg.to_string())
    }
}

// =============================================================================
// Reply Errors
// =============================================================================

/// The terminal error of a turn, carried next to the fallback reply.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReplyError {
    /// The rule list was exhausted without a terminal value.
    #[error("no rule matched the message")]
    NotFound,

    /// A rule ended the turn but produced nothing to send.
    #[error("the turn ended without a reply")]
    NoReply,

    /// A handler failed while `break_on_error` was set.
    #[error("rule '{rule}' failed: {source}")]
    Handler {
        /// Name of the failing rule.
        rule: String,
        /// The handler's error.
        #[source]
        source: HandlerError,
    },
}

impl ReplyError {
    /// Creates a handler error for the named rule.
    pub fn handler(rule: impl Into<String>, source: HandlerError) -> Self {
        Self::Handler {
            rule: rule.into(),
            source,
        }
    }

    /// Returns the code used to look up a human readable reply.
    pub fn code(&self) -> String {
        match self {
            Self::NotFound => "404".to_string(),
            Self::NoReply => "500".to_string(),
            Self::Handler { source, .. } => source.code(),
        }
    }

    /// Returns `true` for the not-found condition.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound)
    }
}

// =============================================================================
// Store Errors
// =============================================================================

/// Errors raised by a [`SessionStore`](crate::store::SessionStore) backend.
///
/// "Not found" is never an error; stores return an empty session instead.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// I/O failure talking to the backend.
    #[error("session store I/O error: {0}")]
    Io(String),

    /// Stored data could not be (de)serialized.
    #[error("session data is malformed: {0}")]
    Serialization(String),

    /// Any other backend failure.
    #[error("session store error: {0}")]
    Backend(String),
}

impl From<std::io::Error> for StoreError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for handler invocations.
pub type HandlerResult<T> = Result<T, HandlerError>;

/// Result type for session store operations.
pub type StoreResult<T> = Result<T, StoreError>;
