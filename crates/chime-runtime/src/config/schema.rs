//! Configuration schema definitions.

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use chime_framework::{DispatcherConfig, default_code_replies};

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ChimeConfig {
    /// Dispatch engine settings.
    #[serde(default)]
    pub engine: EngineConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Dialog files loaded at startup, in order.
    #[serde(default)]
    pub dialogs: Vec<PathBuf>,
}

// =============================================================================
// Engine
// =============================================================================

/// Dispatch engine settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Keep surrounding whitespace of inbound text.
    #[serde(default = "default_true")]
    pub keep_blank: bool,

    /// Stop a stage at the first handler error.
    #[serde(default = "default_true")]
    pub break_on_error: bool,

    /// Human readable replies keyed by error code. Merged over the
    /// built-in table.
    #[serde(default = "default_code_replies")]
    pub code_replies: HashMap<String, String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            keep_blank: true,
            break_on_error: true,
            code_replies: default_code_replies(),
        }
    }
}

impl EngineConfig {
    /// Converts to the dispatcher's configuration.
    pub fn to_dispatcher_config(&self) -> DispatcherConfig {
        let mut code_replies = default_code_replies();
        code_replies.extend(
            self.code_replies
                .iter()
                .map(|(code, text)| (code.clone(), text.clone())),
        );
        DispatcherConfig {
            keep_blank: self.keep_blank,
            break_on_error: self.break_on_error,
            code_replies,
        }
    }
}

fn default_true() -> bool {
    true
}

// =============================================================================
// Logging
// =============================================================================

/// Log verbosity level.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Most verbose.
    Trace,
    /// Rule matches and wait transitions.
    Debug,
    /// Default.
    #[default]
    Info,
    /// Warnings only.
    Warn,
    /// Errors only.
    Error,
}

impl LogLevel {
    /// Returns the level name.
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

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Log line format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Single-line, abbreviated.
    #[default]
    Compact,
    /// Single-line with all fields.
    Full,
    /// Multi-line, human oriented.
    Pretty,
    /// Newline-delimited JSON.
    #[cfg(feature = "json-log")]
    Json,
}

/// Log destination.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogOutput {
    /// Standard output.
    #[default]
    Stdout,
    /// Standard error.
    Stderr,
    /// The file at `file_path`.
    File,
}

/// Which span lifecycle events are logged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpanEventConfig {
    /// Span created.
    #[serde(default)]
    pub new: bool,
    /// Span entered.
    #[serde(default)]
    pub enter: bool,
    /// Span exited.
    #[serde(default)]
    pub exit: bool,
    /// Span closed.
    #[serde(default)]
    pub close: bool,
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Global level.
    #[serde(default)]
    pub level: LogLevel,

    /// Line format.
    #[serde(default)]
    pub format: LogFormat,

    /// Destination.
    #[serde(default)]
    pub output: LogOutput,

    /// Span lifecycle events.
    #[serde(default)]
    pub span_events: SpanEventConfig,

    /// Include thread ids.
    #[serde(default)]
    pub thread_ids: bool,

    /// Include source file and line.
    #[serde(default)]
    pub file_location: bool,

    /// Log file path when `output = "file"`.
    #[serde(default)]
    pub file_path: Option<PathBuf>,

    /// Per-module levels, e.g. `chime_framework = "debug"`.
    #[serde(default)]
    pub filters: HashMap<String, LogLevel>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            format: LogFormat::Compact,
            output: LogOutput::Stdout,
            span_events: SpanEventConfig::default(),
            thread_ids: false,
            file_location: false,
            file_path: None,
            filters: HashMap::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_defaults() {
        let engine = EngineConfig::default();
        assert!(engine.keep_blank);
        assert!(engine.break_on_error);
        assert_eq!(
            engine.to_dispatcher_config().code_to_reply("404"),
            "Don't know what you are saying."
        );
    }

    #[test]
    fn test_partial_code_replies_keep_builtins() {
        let engine: EngineConfig =
            serde_json::from_value(serde_json::json!({ "code_replies": { "404": "Eh?" } }))
                .unwrap();
        let config = engine.to_dispatcher_config();
        assert_eq!(config.code_to_reply("404"), "Eh?");
        assert_eq!(config.code_to_reply("500"), "Something is broken...");
        assert_eq!(config.code_to_reply("418"), "418");
    }

    #[test]
    fn test_log_level_names() {
        let level: LogLevel = serde_json::from_value(serde_json::json!("warn")).unwrap();
        assert_eq!(level, LogLevel::Warn);
        assert_eq!(level.to_string(), "warn");
    }
}
