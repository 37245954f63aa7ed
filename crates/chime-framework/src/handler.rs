//! Handler system for the Chime framework.
//!
//! A rule's handler is one of a closed set of shapes, decided once when the
//! rule is built:
//!
//! | Variant | Produces |
//! |---------|----------|
//! | [`Handler::Empty`] | nothing; the walk continues |
//! | [`Handler::Literal`] | the template, with `{param}` substitution |
//! | [`Handler::RandomChoice`] | one element, re-picked on every call; an empty list as is |
//! | [`Handler::Sync`] | whatever the function returns, via [`IntoReply`] |
//! | [`Handler::Async`] | the awaited result of the function's future |
//! | [`Handler::Value`] | the value itself, verbatim |
//!
//! # Example
//!
//! ```rust,ignore
//! use chime_framework::Handler;
//!
//! // Literal template
//! let hello: Handler = "hello {name}".into();
//!
//! // Random pick
//! let greet: Handler = vec!["hi", "hey", "yo"].into();
//!
//! // Synchronous function; returning None keeps walking
//! let echo = Handler::from_fn(|msg: &Message| msg.text().map(str::to_uppercase));
//!
//! // Asynchronous function
//! let lookup = Handler::from_async(|msg: Arc<Message>| async move {
//!     let weather = fetch_weather(msg.param("city")).await?;
//!     Ok::<_, HandlerError>(weather)
//! });
//! ```

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;
use serde_json::Value;

use chime_core::{HandlerResult, IntoReply, Message, Reply};

/// Fallback name for functions whose name cannot be recovered.
pub const ANONYMOUS_FN: &str = "annonymous_fn";

/// A type-erased synchronous handler.
pub type SyncFn = Arc<dyn Fn(&Message) -> HandlerResult<Option<Reply>> + Send + Sync>;

/// A type-erased asynchronous handler.
pub type AsyncFn =
    Arc<dyn Fn(Arc<Message>) -> BoxFuture<'static, HandlerResult<Option<Reply>>> + Send + Sync>;

/// The handler of a rule.
#[derive(Clone, Default)]
pub enum Handler {
    /// No handler; always yields no value.
    #[default]
    Empty,

    /// A template string.
    Literal(String),

    /// A list of handlers, one picked uniformly at random per call.
    RandomChoice(Vec<Handler>),

    /// A synchronous function over the message.
    Sync {
        /// The function.
        f: SyncFn,
        /// The function's item name, when it has one.
        name: Option<String>,
    },

    /// An asynchronous function over the message.
    Async {
        /// The function.
        f: AsyncFn,
        /// The function's item name, when it has one.
        name: Option<String>,
    },

    /// A structured value returned verbatim.
    Value(Reply),
}

impl Handler {
    /// Wraps a synchronous function.
    ///
    /// A falsy return value (see [`IntoReply`]) means "no match, continue".
    pub fn from_fn<F, R>(f: F) -> Self
    where
        F: Fn(&Message) -> R + Send + Sync + 'static,
        R: IntoReply,
    {
        Self::Sync {
            f: Arc::new(move |msg: &Message| f(msg).into_reply()),
            name: function_name::<F>(),
        }
    }

    /// Wraps an asynchronous function.
    ///
    /// The returned future is the only point where a turn may suspend.
    pub fn from_async<F, Fut, R>(f: F) -> Self
    where
        F: Fn(Arc<Message>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = R> + Send + 'static,
        R: IntoReply,
    {
        Self::Async {
            f: Arc::new(
                move |msg: Arc<Message>| -> BoxFuture<'static, HandlerResult<Option<Reply>>> {
                    let fut = f(msg);
                    Box::pin(async move { fut.await.into_reply() })
                },
            ),
            name: function_name::<F>(),
        }
    }

    /// Creates a random-choice handler from literal templates.
    pub fn choices<I, S>(items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::RandomChoice(
            items
                .into_iter()
                .map(|s| Self::Literal(s.into()))
                .collect(),
        )
    }

    /// Returns `true` for handlers that can never produce a value.
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }

    /// Returns the function name for function handlers.
    pub fn function_name(&self) -> Option<&str> {
        match self {
            Self::Sync { name, .. } | Self::Async { name, .. } => {
                Some(name.as_deref().unwrap_or(ANONYMOUS_FN))
            }
            _ => None,
        }
    }

    /// Returns a display name used when a rule has neither a name nor a
    /// pattern.
    pub(crate) fn display_name(&self) -> String {
        match self {
            Self::Empty => ANONYMOUS_FN.to_string(),
            Self::Literal(text) => text.clone(),
            Self::RandomChoice(items) => items
                .iter()
                .map(Self::display_name)
                .collect::<Vec<_>>()
                .join(","),
            Self::Sync { .. } | Self::Async { .. } => {
                self.function_name().unwrap_or(ANONYMOUS_FN).to_string()
            }
            Self::Value(reply) => reply.to_string(),
        }
    }
}

/// Recovers the item name of a function type, e.g. `greet` for
/// `my_bot::rules::greet`. Closures and function pointers have none.
pub(crate) fn function_name<F>() -> Option<String> {
    let full = std::any::type_name::<F>();
    if full.contains("{{closure}}") || full.starts_with("fn(") || full.starts_with('&') {
        return None;
    }
    let path = full.split('<').next().unwrap_or(full);
    path.rsplit("::")
        .next()
        .filter(|name| !name.is_empty())
        .map(str::to_string)
}

impl fmt::Debug for Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => f.write_str("Empty"),
            Self::Literal(text) => f.debug_tuple("Literal").field(text).finish(),
            Self::RandomChoice(items) => f.debug_tuple("RandomChoice").field(items).finish(),
            Self::Sync { name, .. } => f
                .debug_struct("Sync")
                .field("name", &name.as_deref().unwrap_or(ANONYMOUS_FN))
                .finish_non_exhaustive(),
            Self::Async { name, .. } => f
                .debug_struct("Async")
                .field("name", &name.as_deref().unwrap_or(ANONYMOUS_FN))
                .finish_non_exhaustive(),
            Self::Value(reply) => f.debug_tuple("Value").field(reply).finish(),
        }
    }
}

impl From<&str> for Handler {
    fn from(text: &str) -> Self {
        Self::Literal(text.to_string())
    }
}

impl From<String> for Handler {
    fn from(text: String) -> Self {
        Self::Literal(text)
    }
}

impl From<Vec<&str>> for Handler {
    fn from(items: Vec<&str>) -> Self {
        Self::choices(items)
    }
}

impl From<Vec<String>> for Handler {
    fn from(items: Vec<String>) -> Self {
        Self::choices(items)
    }
}

impl<const N: usize> From<[&str; N]> for Handler {
    fn from(items: [&str; N]) -> Self {
        Self::choices(items)
    }
}

impl From<Reply> for Handler {
    fn from(reply: Reply) -> Self {
        Self::Value(reply)
    }
}

/// Converts a JSON value as found in dialog tables.
impl From<Value> for Handler {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => Self::Empty,
            Value::String(text) => Self::Literal(text),
            Value::Array(items) => Self::RandomChoice(items.into_iter().map(Self::from).collect()),
            other => Self::Value(Reply::Structured(other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn greet(_msg: &Message) -> &'static str {
        "hello"
    }

    #[test]
    fn test_function_name_of_fn_item() {
        let handler = Handler::from_fn(greet);
        assert_eq!(handler.function_name(), Some("greet"));
    }

    #[test]
    fn test_function_name_of_closure_is_anonymous() {
        let handler = Handler::from_fn(|_msg: &Message| "hi");
        assert_eq!(handler.function_name(), Some(ANONYMOUS_FN));
        assert_eq!(handler.display_name(), ANONYMOUS_FN);
    }

    #[test]
    fn test_from_json() {
        let handler = Handler::from(serde_json::json!(["a", "b"]));
        assert!(matches!(handler, Handler::RandomChoice(ref items) if items.len() == 2));
        assert!(Handler::from(serde_json::json!(null)).is_empty());
        assert!(matches!(
            Handler::from(serde_json::json!({"title": "t"})),
            Handler::Value(Reply::Structured(_))
        ));
    }
}
