//! Bulk rule loading from JSON dialog tables.
//!
//! ```json
//! {
//!   "hi": ["hello", "hey"],
//!   "/^bye$/i": "see you",
//!   "help": { "name": "help", "handler": "ask me anything", "replies": { "Y": "ok" } }
//! }
//! ```
//!
//! Keys become patterns and values handlers; rules are named
//! `dialog_<key>` unless they carry a name. Arrays of `[pattern, handler]`
//! pairs are accepted too. Key order is preserved.

use std::path::Path;

use serde_json::{Map, Value};
use tracing::{debug, info};

use crate::dispatcher::Dispatcher;
use crate::error::{RuleError, RuleResult};
use crate::handler::Handler;
use crate::rule::{PatternSpec, RuleDef};
use crate::spec::RuleSpec;

const DIALOG_PREFIX: &str = "dialog_";

impl Dispatcher {
    /// Registers every rule of a dialog table as a route.
    ///
    /// Nothing is registered if any entry is malformed. Returns the number of
    /// rules added.
    pub fn dialog(&self, table: &Value) -> RuleResult<usize> {
        let defs = dialog_rules(table)?;
        let count = defs.len();
        self.set(defs)?;
        debug!(count, "Dialog table loaded");
        Ok(count)
    }

    /// Reads a JSON dialog file and registers its rules.
    pub fn dialog_file(&self, path: impl AsRef<Path>) -> RuleResult<usize> {
        let path = path.as_ref();
        let file_error = |reason: String| RuleError::DialogFile {
            path: path.to_path_buf(),
            reason,
        };
        let content = std::fs::read_to_string(path).map_err(|e| file_error(e.to_string()))?;
        let table: Value = serde_json::from_str(&content).map_err(|e| file_error(e.to_string()))?;
        let count = self.dialog(&table)?;
        info!(path = %path.display(), count, "Dialog file loaded");
        Ok(count)
    }
}

fn dialog_rules(table: &Value) -> RuleResult<Vec<RuleDef>> {
    match table {
        Value::Object(entries) => entries
            .iter()
            .map(|(key, item)| keyed_rule(key, item))
            .collect(),
        Value::Array(items) => items
            .iter()
            .enumerate()
            .map(|(index, item)| indexed_rule(index, item))
            .collect(),
        other => Err(RuleError::invalid_dialog(format!(
            "expected an object or an array, found {}",
            kind_of(other)
        ))),
    }
}

fn keyed_rule(key: &str, item: &Value) -> RuleResult<RuleDef> {
    let name = format!("{DIALOG_PREFIX}{key}");
    match item {
        Value::String(_) | Value::Array(_) => {
            Ok(RuleDef::route(key, Handler::from(item.clone())).name(name))
        }
        Value::Object(fields) => rule_def(fields, Some(name), PatternSpec::from(key)),
        other => Err(RuleError::invalid_dialog(format!(
            "entry '{key}' has an unsupported value: {}",
            kind_of(other)
        ))),
    }
}

fn indexed_rule(index: usize, item: &Value) -> RuleResult<RuleDef> {
    match item {
        Value::Array(pair) if pair.len() == 2 && pair[0].is_string() => {
            let pattern = pair[0].as_str().unwrap_or_default();
            Ok(RuleDef::route(pattern, Handler::from(pair[1].clone()))
                .name(format!("{DIALOG_PREFIX}{pattern}")))
        }
        Value::String(_) | Value::Array(_) => {
            Ok(RuleDef::new(Handler::from(item.clone())).name(format!("{DIALOG_PREFIX}{index}")))
        }
        Value::Object(fields) => rule_def(
            fields,
            Some(format!("{DIALOG_PREFIX}{index}")),
            PatternSpec::Any,
        ),
        other => Err(RuleError::invalid_dialog(format!(
            "entry #{index} has an unsupported value: {}",
            kind_of(other)
        ))),
    }
}

/// Builds a rule declaration from an object with rule fields.
fn rule_def(
    fields: &Map<String, Value>,
    default_name: Option<String>,
    default_pattern: PatternSpec,
) -> RuleResult<RuleDef> {
    let mut def = RuleDef::new(fields.get("handler").cloned().unwrap_or(Value::Null));
    def.name = string_field(fields, "name")?.or(default_name);
    def.description = string_field(fields, "description")?;
    def.domain = string_field(fields, "domain")?;
    def.pattern = match string_field(fields, "pattern")? {
        Some(pattern) => PatternSpec::Source(pattern),
        None => default_pattern,
    };
    if let Some(replies) = fields.get("replies") {
        def.replies = Some(Box::new(spec_from_value(replies)?));
    }
    Ok(def)
}

fn string_field(fields: &Map<String, Value>, key: &str) -> RuleResult<Option<String>> {
    match fields.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(other) => Err(RuleError::invalid_dialog(format!(
            "field '{key}' must be a string, found {}",
            kind_of(other)
        ))),
    }
}

/// Interprets a JSON value as a rule declaration.
///
/// - a string is a catch-all literal reply
/// - an object with a `handler` field is one rule
/// - any other object maps patterns to handlers
/// - an array is a list; two-element arrays inside it are `[pattern, handler]`
pub fn spec_from_value(value: &Value) -> RuleResult<RuleSpec> {
    match value {
        Value::Null => Ok(RuleSpec::Empty),
        Value::String(text) => Ok(RuleSpec::Text(text.clone())),
        Value::Object(fields) if fields.contains_key("handler") => {
            Ok(RuleSpec::Rule(rule_def(fields, None, PatternSpec::Any)?))
        }
        Value::Object(fields) => Ok(RuleSpec::Map(
            fields
                .iter()
                .map(|(pattern, handler)| (PatternSpec::from(pattern), Handler::from(handler.clone())))
                .collect(),
        )),
        Value::Array(items) => items
            .iter()
            .map(|item| match item {
                Value::Array(pair) if pair.len() == 2 && pair[0].is_string() => {
                    let pattern = pair[0].as_str().unwrap_or_default();
                    Ok(RuleSpec::Pair(pattern.into(), Handler::from(pair[1].clone())))
                }
                other => spec_from_value(other),
            })
            .collect::<RuleResult<Vec<_>>>()
            .map(RuleSpec::List),
        other => Err(RuleError::invalid_dialog(format!(
            "cannot build rules from {}",
            kind_of(other)
        ))),
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chime_core::{InboundMessage, Session};
    use serde_json::json;

    #[tokio::test]
    async fn test_object_table() {
        let dispatcher = Dispatcher::new();
        let count = dispatcher
            .dialog(&json!({
                "=hi": ["hello", "hey"],
                "bye": "see you {0}",
                "help": { "handler": "ask me", "description": "help text" }
            }))
            .unwrap();
        assert_eq!(count, 3);

        let names: Vec<_> = dispatcher.routes().iter().map(|r| r.name().to_string()).collect();
        assert_eq!(names, ["dialog_=hi", "dialog_bye", "dialog_help"]);
        assert_eq!(
            dispatcher.get("dialog_help").unwrap().description(),
            Some("help text")
        );

        let outcome = dispatcher
            .reply(InboundMessage::text("u", "bye"), Session::new())
            .await;
        assert_eq!(outcome.reply_text().as_deref(), Some("see you bye"));

        let outcome = dispatcher
            .reply(InboundMessage::text("u", "hi"), Session::new())
            .await;
        let reply = outcome.reply_text().unwrap();
        assert!(reply == "hello" || reply == "hey");
    }

    #[tokio::test]
    async fn test_pair_array_table() {
        let dispatcher = Dispatcher::new();
        dispatcher
            .dialog(&json!([["=a", "A"], ["=b", "B"], "fallback"]))
            .unwrap();

        let names: Vec<_> = dispatcher.routes().iter().map(|r| r.name().to_string()).collect();
        assert_eq!(names, ["dialog_=a", "dialog_=b", "dialog_2"]);

        let outcome = dispatcher
            .reply(InboundMessage::text("u", "b"), Session::new())
            .await;
        assert_eq!(outcome.reply_text().as_deref(), Some("B"));
        let outcome = dispatcher
            .reply(InboundMessage::text("u", "zzz"), Session::new())
            .await;
        assert_eq!(outcome.reply_text().as_deref(), Some("fallback"));
    }

    #[tokio::test]
    async fn test_object_rule_with_replies() {
        let dispatcher = Dispatcher::new();
        dispatcher
            .dialog(&json!({
                "order": {
                    "handler": "confirm?",
                    "replies": { "Y": "ordered", "N": "cancelled" }
                }
            }))
            .unwrap();

        let first = dispatcher
            .reply(InboundMessage::text("u", "order"), Session::new())
            .await;
        assert_eq!(
            first.session().wait.waiter.as_deref(),
            Some("_reply_dialog_order")
        );
        let second = dispatcher
            .reply(InboundMessage::text("u", "不要了"), first.session())
            .await;
        assert_eq!(second.reply_text().as_deref(), Some("cancelled"));
    }

    #[test]
    fn test_malformed_table_registers_nothing() {
        let dispatcher = Dispatcher::new();
        let err = dispatcher
            .dialog(&json!({ "ok": "fine", "bad": 42 }))
            .unwrap_err();
        assert!(matches!(err, RuleError::InvalidDialog(_)));
        assert!(dispatcher.routes().is_empty());

        assert!(dispatcher.dialog(&json!("nope")).is_err());
        assert!(matches!(
            dispatcher.dialog(&json!({ "x": { "handler": "y", "name": 3 } })),
            Err(RuleError::InvalidDialog(_))
        ));
    }

    #[test]
    fn test_missing_file() {
        let dispatcher = Dispatcher::new();
        let err = dispatcher
            .dialog_file("/definitely/not/here.json")
            .unwrap_err();
        assert!(matches!(err, RuleError::DialogFile { .. }));
    }

    #[test]
    fn test_spec_from_value_shapes() {
        assert!(matches!(spec_from_value(&json!(null)).unwrap(), RuleSpec::Empty));
        assert!(matches!(spec_from_value(&json!("x")).unwrap(), RuleSpec::Text(_)));
        assert!(matches!(
            spec_from_value(&json!({ "a": "b" })).unwrap(),
            RuleSpec::Map(ref entries) if entries.len() == 1
        ));
        assert!(matches!(
            spec_from_value(&json!([["=a", "A"], "b"])).unwrap(),
            RuleSpec::List(ref items) if matches!(items[0], RuleSpec::Pair(..))
        ));
        assert!(spec_from_value(&json!(1)).is_err());
    }
}
