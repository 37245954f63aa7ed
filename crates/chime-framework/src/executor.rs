//! Handler execution for rules.

use std::sync::Arc;

use rand::seq::IndexedRandom;
use tracing::{trace, warn};

use chime_core::{HandlerResult, IntoReply, Message, Reply};

use crate::handler::Handler;
use crate::rule::Rule;
use crate::template::substitute;

impl Rule {
    /// Runs this rule's handler against a message.
    ///
    /// `Ok(None)` means the rule produced no value and the walk should go on.
    /// Function handlers may have ended the turn or filled the reply slot as a
    /// side effect.
    pub async fn exec(&self, message: &Arc<Message>) -> HandlerResult<Option<Reply>> {
        let handler = resolve_choice(self.handler());
        trace!(rule = %self.name(), handler = ?handler, "Executing handler");

        match handler {
            Handler::Empty => {
                warn!(rule = %self.name(), "Rule has no handler");
                Ok(None)
            }
            Handler::Literal(template) => {
                let params = message.params();
                substitute(template, &params).into_owned().into_reply()
            }
            Handler::Sync { f, .. } => f(message.as_ref()),
            Handler::Async { f, .. } => f(Arc::clone(message)).await,
            Handler::Value(reply) => Ok(Some(reply.clone())),
            Handler::RandomChoice(_) => Ok(Some(Reply::Choices(Vec::new()))),
        }
    }
}

/// Picks through nested random choices down to a concrete handler.
///
/// An empty choice list is kept as is and later returned verbatim.
fn resolve_choice(handler: &Handler) -> &Handler {
    let mut current = handler;
    while let Handler::RandomChoice(items) = current
        && let Some(item) = items.choose(&mut rand::rng())
    {
        current = item;
    }
    current
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rule::RuleDef;
    use chime_core::{HandlerError, InboundMessage, Session};

    use std::collections::HashSet;

    fn message(text: &str) -> Arc<Message> {
        Arc::new(Message::new(InboundMessage::text("u", text), Session::new()))
    }

    fn rule(def: RuleDef) -> Rule {
        Rule::new(def, None).unwrap()
    }

    #[tokio::test]
    async fn test_literal_substitutes_params() {
        let r = rule(RuleDef::route(r"my name is (?P<name>\w+)", "hello {name}"));
        let msg = message("my name is bob");
        assert!(r.matches(&msg));
        assert_eq!(r.exec(&msg).await.unwrap(), Some(Reply::text("hello bob")));
    }

    #[test]
    fn test_random_choice_reaches_every_member() {
        let options = ["a", "b", "c", "d"];
        let r = rule(RuleDef::new(options));
        let msg = message("x");
        let seen: HashSet<String> = tokio_test::block_on(async {
            let mut seen = HashSet::new();
            for _ in 0..400 {
                let reply = tokio_test::assert_ok!(r.exec(&msg).await).unwrap();
                seen.insert(reply.as_text().unwrap().to_string());
            }
            seen
        });
        let expected: HashSet<String> = options.iter().map(|s| s.to_string()).collect();
        assert_eq!(seen, expected);
    }

    #[tokio::test]
    async fn test_empty_choice_returned_verbatim() {
        let r = rule(RuleDef::new(Handler::RandomChoice(Vec::new())));
        assert_eq!(
            r.exec(&message("x")).await.unwrap(),
            Some(Reply::Choices(Vec::new()))
        );

        let nested = rule(RuleDef::new(Handler::RandomChoice(vec![
            Handler::RandomChoice(Vec::new()),
        ])));
        assert_eq!(
            nested.exec(&message("x")).await.unwrap(),
            Some(Reply::Choices(Vec::new()))
        );
    }

    #[tokio::test]
    async fn test_sync_handler_falsy_continues() {
        let r = rule(RuleDef::new(Handler::from_fn(|_: &Message| "")));
        assert_eq!(r.exec(&message("x")).await.unwrap(), None);

        let r = rule(RuleDef::new(Handler::from_fn(|msg: &Message| {
            msg.text().map(str::to_uppercase)
        })));
        assert_eq!(r.exec(&message("hey")).await.unwrap(), Some(Reply::text("HEY")));
    }

    #[tokio::test]
    async fn test_async_handler_error() {
        let r = rule(RuleDef::new(Handler::from_async(|_msg: Arc<Message>| async {
            tokio::task::yield_now().await;
            Err::<String, _>(HandlerError::status(403))
        })));
        assert_eq!(r.exec(&message("x")).await, Err(HandlerError::Status(403)));
    }

    #[tokio::test]
    async fn test_value_handler_verbatim() {
        let value = serde_json::json!({ "title": "news", "url": "http://example.com" });
        let r = rule(RuleDef::new(Handler::from(value.clone())));
        assert_eq!(
            r.exec(&message("x")).await.unwrap(),
            Some(Reply::Structured(value))
        );
    }
}
