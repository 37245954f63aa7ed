//! Reply values produced by rule handlers.
//!
//! A [`Reply`] is the terminal value of a rule. Handlers may return anything
//! implementing [`IntoReply`], similar to how Axum handlers return
//! `IntoResponse` types; the conversion also decides whether the returned
//! value counts as "no value" (keep walking) or as a terminal reply.

use std::fmt;

use rand::seq::IndexedRandom;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{HandlerError, HandlerResult};

/// Outgoing content for a turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Reply {
    /// Plain text.
    Text(String),
    /// A list of texts; one is picked at random when the turn ends.
    Choices(Vec<String>),
    /// Any other structured payload (news articles, music, ...), passed
    /// through verbatim.
    Structured(Value),
}

impl Reply {
    /// Creates a text reply.
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(text.into())
    }

    /// Returns `true` when this value means "no reply".
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Text(text) => text.is_empty(),
            Self::Choices(choices) => choices.is_empty(),
            Self::Structured(value) => matches!(
                value,
                Value::Null | Value::Bool(false)
            ) || value.as_str().is_some_and(str::is_empty),
        }
    }

    /// Returns the text if this is a text reply.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            Self::Structured(Value::String(text)) => Some(text),
            _ => None,
        }
    }

    /// Resolves a [`Reply::Choices`] into one uniformly random text.
    ///
    /// Other variants are returned unchanged.
    pub fn pick(self) -> Self {
        match self {
            Self::Choices(choices) => match choices.choose(&mut rand::rng()) {
                Some(choice) => Self::Text(choice.clone()),
                None => Self::Choices(choices),
            },
            other => other,
        }
    }
}

impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(text) => f.write_str(text),
            Self::Choices(choices) => f.write_str(&choices.join(" / ")),
            Self::Structured(value) => write!(f, "{value}"),
        }
    }
}

impl From<String> for Reply {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<&str> for Reply {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

impl From<Vec<String>> for Reply {
    fn from(choices: Vec<String>) -> Self {
        Self::Choices(choices)
    }
}

impl From<Vec<&str>> for Reply {
    fn from(choices: Vec<&str>) -> Self {
        Self::Choices(choices.into_iter().map(str::to_string).collect())
    }
}

impl From<Value> for Reply {
    fn from(value: Value) -> Self {
        match value {
            Value::String(text) => Self::Text(text),
            Value::Array(items) if !items.is_empty() && items.iter().all(Value::is_string) => {
                Self::Choices(
                    items
                        .into_iter()
                        .filter_map(|v| v.as_str().map(str::to_string))
                        .collect(),
                )
            }
            other => Self::Structured(other),
        }
    }
}

// ============================================================================
// IntoReply - Handle handler return values
// ============================================================================

/// Conversion from a handler's return value into the executor's result.
///
/// `Ok(None)` means "no value, continue with the next rule".
pub trait IntoReply {
    /// Converts this value into a handler result.
    fn into_reply(self) -> HandlerResult<Option<Reply>>;
}

impl IntoReply for Reply {
    fn into_reply(self) -> HandlerResult<Option<Reply>> {
        Ok((!self.is_empty()).then_some(self))
    }
}

impl IntoReply for String {
    fn into_reply(self) -> HandlerResult<Option<Reply>> {
        Reply::Text(self).into_reply()
    }
}

impl IntoReply for &str {
    fn into_reply(self) -> HandlerResult<Option<Reply>> {
        Reply::from(self).into_reply()
    }
}

impl IntoReply for Vec<String> {
    fn into_reply(self) -> HandlerResult<Option<Reply>> {
        Reply::Choices(self).into_reply()
    }
}

impl IntoReply for Vec<&str> {
    fn into_reply(self) -> HandlerResult<Option<Reply>> {
        Reply::from(self).into_reply()
    }
}

impl IntoReply for Value {
    fn into_reply(self) -> HandlerResult<Option<Reply>> {
        Reply::from(self).into_reply()
    }
}

/// `()` never produces a reply.
impl IntoReply for () {
    fn into_reply(self) -> HandlerResult<Option<Reply>> {
        Ok(None)
    }
}

impl<T: IntoReply> IntoReply for Option<T> {
    fn into_reply(self) -> HandlerResult<Option<Reply>> {
        match self {
            Some(inner) => inner.into_reply(),
            None => Ok(None),
        }
    }
}

impl<T: IntoReply, E: Into<HandlerError>> IntoReply for Result<T, E> {
    fn into_reply(self) -> HandlerResult<Option<Reply>> {
        self.map_err(Into::into)?.into_reply()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_falsy_values_are_no_reply() {
        assert_eq!("".into_reply().unwrap(), None);
        assert_eq!(().into_reply().unwrap(), None);
        assert_eq!(None::<String>.into_reply().unwrap(), None);
        assert_eq!(json!(null).into_reply().unwrap(), None);
        assert_eq!(json!(false).into_reply().unwrap(), None);
    }

    #[test]
    fn test_truthy_values_are_replies() {
        assert_eq!("hi".into_reply().unwrap(), Some(Reply::text("hi")));
        assert_eq!(
            vec!["a", "b"].into_reply().unwrap(),
            Some(Reply::Choices(vec!["a".into(), "b".into()]))
        );
        assert_eq!(
            json!({"title": "news"}).into_reply().unwrap(),
            Some(Reply::Structured(json!({"title": "news"})))
        );
    }

    #[test]
    fn test_result_error_is_propagated() {
        let result: Result<String, HandlerError> = Err(HandlerError::status(403));
        assert_eq!(result.into_reply(), Err(HandlerError::Status(403)));
    }

    #[test]
    fn test_pick_returns_member() {
        let choices = vec!["x".to_string(), "y".to_string(), "z".to_string()];
        for _ in 0..20 {
            let picked = Reply::Choices(choices.clone()).pick();
            let text = picked.as_text().unwrap().to_string();
            assert!(choices.contains(&text));
        }
    }

    #[test]
    fn test_untagged_deserialize() {
        let reply: Reply = serde_json::from_value(json!("hello")).unwrap();
        assert_eq!(reply, Reply::text("hello"));
        let reply: Reply = serde_json::from_value(json!(["a", "b"])).unwrap();
        assert_eq!(reply, Reply::Choices(vec!["a".into(), "b".into()]));
    }
}
