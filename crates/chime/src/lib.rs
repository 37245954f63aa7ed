//! # Chime
//!
//! A conversational rule-dispatch engine for chat bots.
//!
//! ## Overview
//!
//! Each inbound message is matched against an ordered list of rules. The
//! first rule whose handler yields a value produces the reply. A rule may
//! declare follow-up `replies`; the conversation then waits for the next
//! message to be matched against those first.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌──────────────────────────────────────────────┐
//! │   Runtime   │────▶│ Dispatcher                                   │
//! │ (store, cfg)│     │  before hooks → waiter → routes → after hooks │
//! └─────────────┘     └──────────────────────────────────────────────┘
//! ```
//!
//! - **Runtime**: loads and saves sessions, applies configuration
//! - **Dispatcher**: walks rule lists, enters domains, arms waiters
//! - **Rules**: a pattern, a handler and optional follow-up replies
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use chime::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let runtime = ChimeRuntime::new();
//!     runtime.dispatcher().set(
//!         RuleDef::route("dial", "Press 1 or 2")
//!             .replies(RuleSpec::map().entry("=1", "A").entry("=2", "B")),
//!     )?;
//!
//!     let outcome = runtime.handle(InboundMessage::text("u1", "dial")).await;
//!     assert_eq!(outcome.reply_text().as_deref(), Some("Press 1 or 2"));
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - `toml-config`: load `chime.toml` files (default)
//! - `json-log`: JSON log output

pub use chime_core as core;
pub use chime_framework as framework;
pub use chime_runtime as runtime;

/// Prelude module for convenient imports.
///
/// ```rust,ignore
/// use chime::prelude::*;
/// ```
pub mod prelude {
    // Runtime - main entry point
    pub use chime_runtime::{ChimeRuntime, LoggingBuilder, SpanEvents};
    pub use chime_runtime::config::{ChimeConfig, ConfigLoader, load_config};

    // Rule declaration
    pub use chime_framework::{
        Dispatcher, DispatcherConfig, Handler, NO_PATTERN, Outcome, PatternSpec, Rule, RuleDef,
        RuleError, RuleSpec, YES_PATTERN,
    };

    // Message and session types for handlers
    pub use chime_core::{
        HandlerError, InboundMessage, IntoReply, Message, MessageKind, Reply, ReplyError, Session,
        SessionStore,
    };
}
