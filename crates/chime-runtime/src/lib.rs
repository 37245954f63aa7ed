//! Chime Runtime - session-backed driver for the Chime engine.
//!
//! This crate provides:
//! - The turn driver ([`ChimeRuntime`]), also usable as a `tower::Service`
//! - Layered configuration ([`config`])
//! - Logging setup ([`logging`])
//!
//! ```ignore
//! use chime_runtime::{ChimeRuntime, config::load_config, logging};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = load_config()?;
//!     logging::init_from_config(&config.logging);
//!
//!     let runtime = ChimeRuntime::from_config(&config)?;
//!     let outcome = runtime.handle(InboundMessage::text("u1", "hello")).await;
//!     println!("{:?}", outcome.reply_text());
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod logging;
pub mod runtime;

pub use config::{ChimeConfig, ConfigError, ConfigLoader, ConfigResult, EngineConfig, LoggingConfig};
pub use error::{RuntimeError, RuntimeResult};
pub use logging::{LoggingBuilder, SpanEvents};
pub use runtime::ChimeRuntime;
