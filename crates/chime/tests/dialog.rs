//! End-to-end conversations through the runtime.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chime::prelude::*;
use chime::core::{StoreError, StoreResult};
use serde_json::json;

async fn say(runtime: &ChimeRuntime, uid: &str, text: &str) -> Outcome {
    runtime.handle(InboundMessage::text(uid, text)).await
}

fn dial_runtime() -> ChimeRuntime {
    let runtime = ChimeRuntime::new();
    runtime
        .dispatcher()
        .set(
            RuleDef::route("dial", "choose: 1/2/3").name("dial").replies(
                RuleSpec::map()
                    .entry("=1", "A")
                    .entry("=2", "B")
                    .entry("=3", "C")
                    .entry(
                        "/.*/",
                        Handler::from_fn(|msg: &Message| {
                            msg.rewait();
                            format!("please choose 1, 2 or 3 (retry {})", msg.rewait_count())
                        }),
                    ),
            ),
        )
        .unwrap();
    runtime
}

#[tokio::test]
async fn greeting_picks_one_of_the_choices() {
    let runtime = ChimeRuntime::new();
    let choices = ["你也好", "你好", "很高兴认识你"];
    runtime
        .dispatcher()
        .set(RuleDef::route("你好", Handler::choices(choices)))
        .unwrap();

    let mut seen = HashSet::new();
    for _ in 0..300 {
        let outcome = say(&runtime, "u1", "你好").await;
        let reply = outcome.reply_text().unwrap();
        assert!(choices.contains(&reply.as_str()), "unexpected reply {reply}");
        seen.insert(reply);
    }
    let expected: HashSet<String> = choices.iter().map(|s| s.to_string()).collect();
    assert_eq!(seen, expected);
}

#[tokio::test]
async fn dial_menu_with_rewait() {
    let runtime = dial_runtime();

    let prompt = say(&runtime, "u1", "dial").await;
    assert!(prompt.reply_text().unwrap().contains("choose"));
    let picked = say(&runtime, "u1", "1").await;
    assert_eq!(picked.reply_text().as_deref(), Some("A"));

    let prompt = say(&runtime, "u1", "dial").await;
    assert!(prompt.reply_text().unwrap().contains("choose"));
    let bogus = say(&runtime, "u1", "bogus").await;
    assert_eq!(
        bogus.reply_text().as_deref(),
        Some("please choose 1, 2 or 3 (retry 1)")
    );
    assert_eq!(bogus.message.rewait_count(), 1);
    assert_eq!(bogus.session().wait.rewait_count, 1);

    let picked = say(&runtime, "u1", "2").await;
    assert_eq!(picked.reply_text().as_deref(), Some("B"));
}

#[tokio::test]
async fn resolved_wait_does_not_capture_third_turn() {
    let runtime = dial_runtime();
    runtime.dispatcher().set("fallback").unwrap();

    say(&runtime, "u1", "dial").await;
    say(&runtime, "u1", "3").await;
    let third = say(&runtime, "u1", "3").await;
    assert_eq!(third.reply_text().as_deref(), Some("fallback"));
}

#[tokio::test]
async fn conversations_wait_independently() {
    let runtime = dial_runtime();

    say(&runtime, "alice", "dial").await;
    let bob = say(&runtime, "bob", "1").await;
    assert_eq!(bob.error, Some(ReplyError::NotFound));

    let alice = say(&runtime, "alice", "1").await;
    assert_eq!(alice.reply_text().as_deref(), Some("A"));
}

#[tokio::test]
async fn literal_pattern_is_exact() {
    let runtime = ChimeRuntime::new();
    runtime.dispatcher().set(RuleDef::route("=foo", "bar")).unwrap();

    assert_eq!(say(&runtime, "u1", "foo").await.reply_text().as_deref(), Some("bar"));
    assert_eq!(
        say(&runtime, "u1", "foobar").await.error,
        Some(ReplyError::NotFound)
    );
}

#[tokio::test]
async fn no_match_uses_configured_fallback() {
    let mut config = ChimeConfig::default();
    config
        .engine
        .code_replies
        .insert("404".to_string(), "Say that again?".to_string());
    let runtime = ChimeRuntime::from_config(&config).unwrap();

    let outcome = say(&runtime, "u1", "anything").await;
    assert_eq!(outcome.error, Some(ReplyError::NotFound));
    assert_eq!(outcome.reply_text().as_deref(), Some("Say that again?"));
}

#[tokio::test]
async fn yes_no_shorthands() {
    let runtime = ChimeRuntime::new();
    runtime
        .dispatcher()
        .set(
            RuleDef::route("=order", "confirm?")
                .replies(RuleSpec::map().entry("Y", "ordered").entry("N", "cancelled")),
        )
        .unwrap();

    say(&runtime, "u1", "order").await;
    let yes = say(&runtime, "u1", "好的").await;
    assert_eq!(yes.reply_text().as_deref(), Some("ordered"));

    say(&runtime, "u1", "order").await;
    let no = say(&runtime, "u1", "nope").await;
    assert_eq!(no.reply_text().as_deref(), Some("cancelled"));
}

#[tokio::test]
async fn async_handler_and_captures() {
    let runtime = ChimeRuntime::new();
    runtime
        .dispatcher()
        .set(RuleDef::route(
            r"^weather in (?<city>\w+)$",
            Handler::from_async(|msg: Arc<Message>| async move {
                tokio::time::sleep(Duration::from_millis(5)).await;
                format!("sunny in {}", msg.param("city").unwrap_or_default())
            }),
        ))
        .unwrap();

    let outcome = say(&runtime, "u1", "weather in Hefei").await;
    assert_eq!(outcome.reply_text().as_deref(), Some("sunny in Hefei"));
}

#[tokio::test]
async fn domain_gatekeeper_guards_tagged_rules() {
    let runtime = ChimeRuntime::new();
    let dispatcher = runtime.dispatcher();
    dispatcher
        .domain(
            "admin",
            Handler::from_fn(|msg: &Message| {
                if msg.uid() == "root" {
                    Ok(None::<String>)
                } else {
                    Err(HandlerError::status(403))
                }
            }),
        )
        .unwrap();
    dispatcher
        .set(RuleDef::route("=reboot", "rebooting").domain("admin"))
        .unwrap();

    let denied = say(&runtime, "guest", "reboot").await;
    assert_eq!(
        denied.reply_text().as_deref(),
        Some("You have no permission to do this.")
    );
    let allowed = say(&runtime, "root", "reboot").await;
    assert_eq!(allowed.reply_text().as_deref(), Some("rebooting"));
}

#[tokio::test]
async fn dialog_table_end_to_end() {
    let runtime = ChimeRuntime::new();
    runtime
        .dispatcher()
        .dialog(&json!({
            "=hi": "hello {uid}",
            "menu": {
                "handler": "tea or coffee?",
                "replies": [["tea", "one tea"], ["coffee", "one coffee"]]
            }
        }))
        .unwrap();

    assert!(runtime.dispatcher().get("dialog_menu").is_some());

    say(&runtime, "u1", "menu").await;
    let order = say(&runtime, "u1", "coffee please").await;
    assert_eq!(order.reply_text().as_deref(), Some("one coffee"));
}

#[tokio::test]
async fn duplicate_wait_rule_is_rejected() {
    let runtime = ChimeRuntime::new();
    runtime.dispatcher().wait_rule("ask", "first").unwrap();
    let err = runtime.dispatcher().wait_rule("ask", "second").unwrap_err();
    assert_eq!(err, RuleError::DuplicateWaitRule("ask".to_string()));
}

struct FlakyStore;

#[async_trait]
impl SessionStore for FlakyStore {
    async fn get(&self, _id: &str) -> StoreResult<Session> {
        Err(StoreError::Io("connection reset".into()))
    }

    async fn set(&self, _id: &str, _session: &Session) -> StoreResult<()> {
        Err(StoreError::Io("connection reset".into()))
    }

    async fn destroy(&self, _id: &str) -> StoreResult<()> {
        Ok(())
    }
}

#[tokio::test]
async fn store_failure_still_replies() {
    let runtime = ChimeRuntime::with_store(Dispatcher::new(), FlakyStore);
    runtime.dispatcher().set(RuleDef::route("=ping", "pong")).unwrap();

    let outcome = say(&runtime, "u1", "ping").await;
    assert!(outcome.is_ok());
    assert_eq!(outcome.reply_text().as_deref(), Some("pong"));
}

#[test]
fn config_defaults() {
    let config = ChimeConfig::default();
    assert!(config.engine.keep_blank);
    assert!(config.engine.break_on_error);
    assert!(config.dialogs.is_empty());
}

#[tokio::test]
async fn nested_menus_keep_their_own_sub_replies() {
    let runtime = ChimeRuntime::new();
    for menu in ["a", "b"] {
        let answer = format!("from {}", menu.to_uppercase());
        tokio_test::assert_ok!(runtime.dispatcher().set(
            RuleDef::route(format!("={menu}"), "pick 1")
                .replies(RuleDef::route("=1", "now x").replies([("=x", answer)])),
        ));
    }

    for text in ["a", "1"] {
        say(&runtime, "u1", text).await;
    }
    let first = say(&runtime, "u1", "x").await;
    assert_eq!(first.reply_text().as_deref(), Some("from A"));

    for text in ["b", "1"] {
        say(&runtime, "u1", text).await;
    }
    let second = say(&runtime, "u1", "x").await;
    assert_eq!(second.reply_text().as_deref(), Some("from B"));
}

#[tokio::test]
async fn handler_registers_wait_rule_through_engine_handle() {
    let runtime = ChimeRuntime::new();
    let engine = Arc::downgrade(&runtime.shared_dispatcher());
    tokio_test::assert_ok!(runtime.dispatcher().set(RuleDef::route(
        "=quiz",
        Handler::from_fn(move |msg: &Message| {
            if let Some(engine) = engine.upgrade()
                && engine.get_wait_rule("quiz_answer").is_none()
            {
                engine
                    .wait_rule("quiz_answer", RuleDef::route("=4", "correct"))
                    .unwrap();
            }
            msg.wait("quiz_answer");
            "2 + 2 = ?"
        }),
    )));
    runtime.dispatcher().set("fallback").unwrap();

    let question = say(&runtime, "u1", "quiz").await;
    assert_eq!(question.reply_text().as_deref(), Some("2 + 2 = ?"));
    assert!(runtime.dispatcher().waits().contains("quiz_answer"));
    assert_eq!(
        runtime.dispatcher().get_wait_rule("quiz_answer").unwrap()[0].name(),
        "quiz_answer"
    );

    let answer = say(&runtime, "u1", "4").await;
    assert_eq!(answer.reply_text().as_deref(), Some("correct"));

    say(&runtime, "u2", "quiz").await;
    let again = say(&runtime, "u2", "4").await;
    assert_eq!(again.reply_text().as_deref(), Some("correct"));
}
