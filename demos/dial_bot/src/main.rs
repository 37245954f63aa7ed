//! Dial Bot Demo
//!
//! An interactive phone-menu bot. Each line typed on stdin is one turn of
//! the conversation; the reply is printed back.
//!
//! # Rules
//!
//! - `你好` / `hello`: a random greeting
//! - `dial`: a numbered menu that waits for `1`, `2` or `3` and re-prompts
//!   on anything else
//! - `reboot`: only for the `root` user (domain gatekeeper)
//! - `weather in <city>`: an async handler using a capture
//! - anything else: the not-found fallback
//!
//! # Usage
//!
//! ```bash
//! cargo run --package dial-bot -- --uid alice
//! cargo run --package dial-bot -- --config chime.toml --verbose
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use chime::prelude::*;
use chime::runtime::config::load_config_from_file;
use chime::runtime::logging;
use clap::Parser;
use serde_json::json;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{Level, debug, info};

#[derive(Debug, Parser)]
#[command(about = "Talk to a Chime phone-menu bot on stdin")]
struct Args {
    /// Configuration file; the default locations are searched otherwise.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Conversation id used for every turn.
    #[arg(short, long, default_value = "guest")]
    uid: String,

    /// Log rule matches and wait transitions.
    #[arg(short, long)]
    verbose: bool,
}

// ============================================================================
// Rules
// ============================================================================

fn register_rules(dispatcher: &Dispatcher) -> Result<()> {
    dispatcher.before(Handler::from_fn(|msg: &Message| {
        debug!(uid = msg.uid(), text = msg.text().unwrap_or_default(), "Inbound");
    }))?;

    dispatcher.set(RuleDef::route(
        "你好|hello",
        Handler::choices(["你也好", "你好", "很高兴认识你"]),
    ))?;

    dispatcher.set(
        RuleDef::route("^dial$", "choose: 1) sales 2) support 3) operator")
            .name("dial")
            .description("phone menu")
            .replies(
                RuleSpec::map()
                    .entry("=1", "Connecting you to sales.")
                    .entry("=2", "Connecting you to support.")
                    .entry("=3", "Please hold for an operator.")
                    .entry(
                        PatternSpec::Any,
                        Handler::from_fn(|msg: &Message| {
                            msg.rewait();
                            if msg.rewait_count() >= 3 {
                                msg.resolve();
                                return "Too many attempts, goodbye.".to_string();
                            }
                            format!("Please press 1, 2 or 3 (attempt {})", msg.rewait_count())
                        }),
                    ),
            ),
    )?;

    dispatcher.domain(
        "admin",
        Handler::from_fn(|msg: &Message| {
            if msg.uid() == "root" {
                Ok(None::<String>)
            } else {
                Err(HandlerError::status(403))
            }
        }),
    )?;
    dispatcher.set(RuleDef::route("=reboot", "Rebooting...").domain("admin"))?;

    dispatcher.set(RuleDef::route(
        r"^weather in (?<city>\w+)$",
        Handler::from_async(|msg: Arc<Message>| async move {
            let city = msg.param("city").unwrap_or_default();
            format!("It is sunny in {city}.")
        }),
    ))?;

    dispatcher.dialog(&json!({
        "=help": "Try: hello, dial, weather in <city>, reboot",
        "bye|再见": ["Bye!", "See you."]
    }))?;

    Ok(())
}

// ============================================================================
// Main Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => load_config_from_file(path)?,
        None => ConfigLoader::new().with_user_config_dir().load()?,
    };

    if args.verbose {
        LoggingBuilder::new()
            .with_level(Level::DEBUG)
            .directive("chime_framework=debug")
            .span_events(SpanEvents::LIFECYCLE)
            .init();
    } else {
        logging::init_from_config(&config.logging);
    }

    let runtime = ChimeRuntime::from_config(&config)?;
    register_rules(runtime.dispatcher())?;
    info!(uid = %args.uid, rules = runtime.dispatcher().routes().len(), "Dial bot ready");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let outcome = runtime
            .handle(InboundMessage::text(args.uid.as_str(), line))
            .await;
        match outcome.reply() {
            Some(reply) => println!("{reply}"),
            None => println!("..."),
        }
        if let Some(error) = &outcome.error {
            debug!(code = %error.code(), error = %error, "Turn finished with an error");
        }
    }

    Ok(())
}
