//! # Chime Framework
//!
//! Rule normalization, matching, execution and dispatch.
//!
//! This layer provides:
//! - [`RuleSpec`] and [`convert`] for declaring rules in any accepted shape
//! - [`Rule`] with its compiled [`Pattern`] and closed [`Handler`] set
//! - The matcher ([`Rule::test`]) and executor ([`Rule::exec`])
//! - The per-turn [`Dispatcher`] with hooks, domains and wait rules
//! - JSON dialog tables for bulk loading
//!
//! Session persistence and process setup live in `chime-runtime`.

pub mod dialog;
pub mod dispatcher;
pub mod error;
pub mod executor;
pub mod handler;
pub mod matcher;
pub mod registry;
pub mod rule;
pub mod spec;
pub mod template;

pub use dialog::spec_from_value;
pub use dispatcher::{Dispatcher, DispatcherConfig, Outcome, default_code_replies};
pub use error::{RuleError, RuleResult};
pub use handler::{ANONYMOUS_FN, AsyncFn, Handler, SyncFn};
pub use registry::{REPLY_PREFIX, WaitRegistry};
pub use rule::{NO_PATTERN, Pattern, PatternSpec, PredicateFn, Rule, RuleDef, RuleList, YES_PATTERN};
pub use spec::{RuleSpec, convert};
pub use template::substitute;
