//! Pattern matching for rules.
//!
//! [`Rule::test`] decides whether a rule applies to a message. Regex
//! patterns also extract their captures into the message params, so a
//! handler or literal template further down can refer to them as `{0}`,
//! `{1}`, ... or by group name.

use regex::Captures;
use tracing::{debug, trace, warn};

use chime_core::{Message, MessageKind};

use crate::rule::{Pattern, Rule};

impl Rule {
    /// Tests this rule's pattern against a message.
    ///
    /// - `Any` matches everything.
    /// - A predicate's answer is authoritative, whatever the message kind.
    /// - Literal and regex patterns only apply to text messages that carry
    ///   text. A successful regex match merges its captures into the params.
    pub fn test(&self, message: Option<&Message>) -> bool {
        let Some(message) = message else {
            warn!(rule = %self.name(), "Rule tested without a message");
            return false;
        };

        match self.pattern() {
            Pattern::Any => true,
            Pattern::Predicate { f, .. } => f(self, message),
            Pattern::Literal(literal) => matchable_text(self, message).is_some_and(|t| literal == t),
            Pattern::Regex { regex, .. } => {
                let Some(caps) = matchable_text(self, message).and_then(|t| regex.captures(t))
                else {
                    return false;
                };
                merge_captures(regex.capture_names(), &caps, message);
                true
            }
        }
    }

    /// Shorthand for [`test`](Self::test) with a message present.
    pub fn matches(&self, message: &Message) -> bool {
        let matched = self.test(Some(message));
        trace!(rule = %self.name(), matched, "Rule tested");
        matched
    }
}

/// Returns the text literal and regex patterns apply to.
fn matchable_text<'m>(rule: &Rule, message: &'m Message) -> Option<&'m str> {
    let text = message.text().filter(|_| message.is(MessageKind::Text));
    if text.is_none() {
        debug!(
            rule = %rule.name(),
            kind = %message.kind(),
            "Message has no text, pattern skipped"
        );
    }
    text
}

/// Copies numbered and named groups into the params.
///
/// Groups that did not take part in the match remove any earlier value under
/// the same key.
fn merge_captures<'r>(
    names: impl Iterator<Item = Option<&'r str>>,
    caps: &Captures<'_>,
    message: &Message,
) {
    for (index, name) in names.enumerate() {
        let keys = std::iter::once(index.to_string()).chain(name.map(str::to_string));
        match caps.get(index) {
            Some(m) => message.merge_params(keys.map(|key| (key, m.as_str()))),
            None => {
                for key in keys {
                    message.remove_param(&key);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rule::{PatternSpec, RuleDef};
    use chime_core::{InboundMessage, Session};

    fn rule(pattern: impl Into<PatternSpec>) -> Rule {
        Rule::new(RuleDef::route(pattern, "x"), None).unwrap()
    }

    fn text(s: &str) -> Message {
        Message::new(InboundMessage::text("u", s), Session::new())
    }

    #[test]
    fn test_missing_message_never_matches() {
        assert!(!rule(PatternSpec::Any).test(None));
    }

    #[test]
    fn test_any_matches_non_text() {
        let msg = Message::new(InboundMessage::new("u", MessageKind::Image), Session::new());
        assert!(rule(PatternSpec::Any).matches(&msg));
        assert!(!rule("=x").matches(&msg));
        assert!(!rule("x").matches(&msg));
    }

    #[test]
    fn test_literal_is_exact() {
        assert!(rule("=foo").matches(&text("foo")));
        assert!(!rule("=foo").matches(&text("foobar")));
    }

    #[test]
    fn test_regex_captures_to_params() {
        let msg = text("call 123 now");
        assert!(rule(r"call (?P<num>\d+)").matches(&msg));
        assert_eq!(msg.param("0").as_deref(), Some("call 123"));
        assert_eq!(msg.param("1").as_deref(), Some("123"));
        assert_eq!(msg.param("num").as_deref(), Some("123"));
    }

    #[test]
    fn test_non_participating_group_clears_key() {
        let msg = text("ab");
        msg.set_param("2", "stale");
        assert!(rule("(a)(x)?b").matches(&msg));
        assert_eq!(msg.param("1").as_deref(), Some("a"));
        assert_eq!(msg.param("2"), None);
    }

    #[test]
    fn test_predicate_is_authoritative() {
        let only_images = PatternSpec::predicate(|_: &Rule, msg: &Message| msg.is(MessageKind::Image));
        let r = rule(only_images);
        let image = Message::new(InboundMessage::new("u", MessageKind::Image), Session::new());
        assert!(r.matches(&image));
        assert!(!r.matches(&text("image")));
    }

    #[test]
    fn test_predicate_sees_rule() {
        let r = Rule::new(
            RuleDef::route(
                PatternSpec::predicate(|rule: &Rule, msg: &Message| msg.text() == Some(rule.name())),
                "x",
            )
            .name("ping"),
            None,
        )
        .unwrap();
        assert!(r.matches(&text("ping")));
        assert!(!r.matches(&text("pong")));
    }
}
