//! Error types for the Chime framework.

use std::path::PathBuf;

use thiserror::Error;

/// Usage errors raised synchronously to whoever registers rules.
///
/// These are never swallowed: a malformed declaration is a programming
/// error in the bot, not a runtime condition.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RuleError {
    /// A registration call produced no rules.
    #[error("invalid rule: registration produced no rules")]
    EmptyRegistration,

    /// A pattern could not be compiled.
    #[error("invalid pattern '{pattern}': {reason}")]
    InvalidPattern {
        /// The pattern source text.
        pattern: String,
        /// Why compilation failed.
        reason: String,
    },

    /// A wait rule with this name already exists.
    #[error("wait rule name conflict: '{0}'")]
    DuplicateWaitRule(String),

    /// A dialog table has an unsupported shape.
    #[error("invalid dialog table: {0}")]
    InvalidDialog(String),

    /// A dialog file could not be read or parsed.
    #[error("failed to load dialog file {path}: {reason}")]
    DialogFile {
        /// The file path.
        path: PathBuf,
        /// Why loading failed.
        reason: String,
    },
}

impl RuleError {
    /// Creates an invalid pattern error.
    pub fn invalid_pattern(pattern: impl Into<String>, reason: impl ToString) -> Self {
        Self::InvalidPattern {
            pattern: pattern.into(),
            reason: reason.to_string(),
        }
    }

    /// Creates an invalid dialog error.
    pub fn invalid_dialog(msg: impl Into<String>) -> Self {
        Self::InvalidDialog(msg.into())
    }
}

/// Result type for rule registration.
pub type RuleResult<T> = Result<T, RuleError>;
