//! Turn dispatcher for the Chime framework.
//!
//! The [`Dispatcher`] owns every rule table and turns one inbound message
//! into one reply. A turn walks a single ordered rule list:
//!
//! ```text
//! befores ++ wait rules (if the session is waiting) ++ routes
//! ```
//!
//! 1. Rules are tested in order; non-matching rules are skipped
//! 2. The first match of a domain-tagged rule splices that domain's hooks
//!    and gatekeepers in front of it and restarts the walk (once per turn)
//! 3. The first rule producing a value (or ending the turn) finishes the
//!    main stage; if it declares `replies`, the session starts waiting on them
//! 4. After-hooks then run over the finished message
//!
//! ```rust,ignore
//! use chime_framework::{Dispatcher, RuleDef, RuleSpec};
//!
//! let dispatcher = Dispatcher::new();
//! dispatcher.set(RuleDef::route("hi", ["hello", "hey"]))?;
//! dispatcher.set(
//!     RuleDef::route("dial", "choose: 1/2")
//!         .replies(RuleSpec::map().entry("=1", "A").entry("=2", "B")),
//! )?;
//!
//! let outcome = dispatcher.reply(InboundMessage::text("u1", "hi"), Session::new()).await;
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{Instrument, Level, debug, error, span, warn};

use chime_core::{InboundMessage, Message, Reply, ReplyError, Session};

use crate::error::{RuleError, RuleResult};
use crate::registry::{REPLY_PREFIX, WaitRegistry};
use crate::rule::{Rule, RuleDef, RuleList};
use crate::spec::{RuleSpec, convert};

// ============================================================================
// Configuration
// ============================================================================

/// Engine behaviour switches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatcherConfig {
    /// Keep surrounding whitespace of inbound text.
    pub keep_blank: bool,
    /// Stop a stage at the first handler error.
    pub break_on_error: bool,
    /// Human readable replies for error codes.
    pub code_replies: HashMap<String, String>,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            keep_blank: true,
            break_on_error: true,
            code_replies: default_code_replies(),
        }
    }
}

impl DispatcherConfig {
    /// Returns the configured message for `code`, or the code itself.
    pub fn code_to_reply(&self, code: &str) -> String {
        self.code_replies
            .get(code)
            .cloned()
            .unwrap_or_else(|| code.to_string())
    }
}

/// The built-in code replies.
pub fn default_code_replies() -> HashMap<String, String> {
    [
        ("204", "OK, got that."),
        ("403", "You have no permission to do this."),
        ("404", "Don't know what you are saying."),
        ("500", "Something is broken..."),
    ]
    .into_iter()
    .map(|(code, text)| (code.to_string(), text.to_string()))
    .collect()
}

// ============================================================================
// Outcome
// ============================================================================

/// The result of one turn.
///
/// The message carries the final reply and the mutated session; the
/// error, if any, is the terminal error of the turn.
#[derive(Debug, Clone)]
pub struct Outcome {
    /// Terminal error of the turn.
    pub error: Option<ReplyError>,
    /// The finished message.
    pub message: Arc<Message>,
}

impl Outcome {
    /// Returns the final reply.
    pub fn reply(&self) -> Option<Reply> {
        self.message.reply()
    }

    /// Returns the final reply if it is textual.
    pub fn reply_text(&self) -> Option<String> {
        self.message.reply_text()
    }

    /// Returns a copy of the session as left by the turn.
    pub fn session(&self) -> Session {
        self.message.session_snapshot()
    }

    /// Returns `true` if the turn finished without an error.
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

// ============================================================================
// Dispatcher
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Main,
    After,
}

#[derive(Debug)]
enum StageEnd {
    /// A rule finished the stage, with or without a value.
    Done(Option<Reply>),
    /// A handler failed under `break_on_error`.
    Failed(ReplyError),
    /// The list ran out.
    Exhausted,
}

/// The rule-dispatch engine.
///
/// All registration methods take `&self`; tables are guarded by locks that
/// are only held while copying them, never across a handler.
#[derive(Debug, Default)]
pub struct Dispatcher {
    config: RwLock<DispatcherConfig>,
    befores: RwLock<RuleList>,
    afters: RwLock<RuleList>,
    routes: RwLock<RuleList>,
    domains: RwLock<HashMap<String, RuleList>>,
    waits: WaitRegistry,
}

impl Dispatcher {
    /// Creates an empty dispatcher with the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty dispatcher with the given configuration.
    pub fn with_config(config: DispatcherConfig) -> Self {
        Self {
            config: RwLock::new(config),
            ..Default::default()
        }
    }

    /// Returns a copy of the configuration.
    pub fn config(&self) -> DispatcherConfig {
        self.config.read().clone()
    }

    /// Replaces the configuration.
    pub fn set_config(&self, config: DispatcherConfig) {
        *self.config.write() = config;
    }

    /// Sets the human readable reply for an error code.
    pub fn code_reply(&self, code: impl ToString, text: impl Into<String>) {
        self.config
            .write()
            .code_replies
            .insert(code.to_string(), text.into());
    }

    // ─── Registration ─────────────────────────────────────────────────────────

    /// Appends reply rules.
    pub fn set(&self, spec: impl Into<RuleSpec>) -> RuleResult<()> {
        let rules = normalize(spec.into())?;
        for rule in &rules {
            debug!(rule = %rule.name(), "Route defined");
        }
        self.routes.write().extend(rules);
        Ok(())
    }

    /// Appends before-reply hooks.
    ///
    /// A hook tagged with a domain only runs once the walk has entered that
    /// domain.
    pub fn before(&self, spec: impl Into<RuleSpec>) -> RuleResult<()> {
        let rules = normalize(spec.into())?
            .into_iter()
            .map(|rule| Arc::new(Rule::clone(&rule).into_before()));
        self.befores.write().extend(rules);
        Ok(())
    }

    /// Alias of [`before`](Self::before).
    pub fn use_rule(&self, spec: impl Into<RuleSpec>) -> RuleResult<()> {
        self.before(spec)
    }

    /// Appends after-reply hooks.
    pub fn after(&self, spec: impl Into<RuleSpec>) -> RuleResult<()> {
        let rules = normalize(spec.into())?;
        self.afters.write().extend(rules);
        Ok(())
    }

    /// Appends gatekeeper rules to a domain.
    pub fn domain(&self, name: impl Into<String>, spec: impl Into<RuleSpec>) -> RuleResult<()> {
        let name = name.into();
        let rules = normalize(spec.into())?;
        debug!(domain = %name, count = rules.len(), "Domain rules defined");
        self.domains.write().entry(name).or_default().extend(rules);
        Ok(())
    }

    /// Registers a named wait-rule set.
    ///
    /// A bare handler or text, or a single unnamed rule, is registered as one
    /// rule carrying the wait-rule's name.
    pub fn wait_rule(&self, name: impl Into<String>, spec: impl Into<RuleSpec>) -> RuleResult<()> {
        let name = name.into();
        if self.waits.contains(&name) {
            return Err(RuleError::DuplicateWaitRule(name));
        }
        let spec = match spec.into() {
            RuleSpec::Text(text) => RuleSpec::Rule(RuleDef::new(text).name(&name)),
            RuleSpec::Handler(handler) => RuleSpec::Rule(RuleDef::new(handler).name(&name)),
            RuleSpec::Rule(def) if def.name.is_none() => RuleSpec::Rule(def.name(&name)),
            other => other,
        };
        let rules = normalize(spec)?;
        self.waits.register(name, rules)
    }

    /// Resolves a wait-rule name.
    ///
    /// Looks in the registry first, then for a route of that name, then
    /// derives `_reply_<scope>` sets from the replies of the rule with that
    /// scope, nested reply rules included.
    pub fn get_wait_rule(&self, name: &str) -> Option<RuleList> {
        if let Some(rules) = self.waits.get(name) {
            return Some(rules);
        }
        if let Some(rule) = self.find_route(name) {
            return Some(vec![rule]);
        }
        let rule_name = name.strip_prefix(REPLY_PREFIX)?;
        let rule = self.find_scoped(rule_name)?;
        let key = self.waits.get_or_insert_replies(&rule)?;
        self.waits.get(&key)
    }

    /// Finds a rule by name in routes, hooks, domains and wait sets.
    pub fn get(&self, name: &str) -> Option<Arc<Rule>> {
        if let Some(rule) = self.find_route(name) {
            return Some(rule);
        }
        let found = [&self.befores, &self.afters]
            .into_iter()
            .find_map(|table| find_by_name(&table.read(), name));
        if found.is_some() {
            return found;
        }
        let from_domain = self
            .domains
            .read()
            .values()
            .find_map(|rules| find_by_name(rules, name));
        from_domain.or_else(|| self.waits.find_rule(name))
    }

    /// Replaces routes that share a name with the given rules.
    ///
    /// Returns how many routes were replaced.
    pub fn update(&self, spec: impl Into<RuleSpec>) -> RuleResult<usize> {
        let rules = normalize(spec.into())?;
        let mut routes = self.routes.write();
        let mut replaced = 0;
        for rule in rules {
            for slot in routes.iter_mut().filter(|r| r.name() == rule.name()) {
                *slot = Arc::clone(&rule);
                replaced += 1;
            }
        }
        debug!(replaced, "Routes updated");
        Ok(replaced)
    }

    /// Removes routes with the given name; returns `true` if any was removed.
    pub fn delete(&self, name: &str) -> bool {
        let mut routes = self.routes.write();
        let before = routes.len();
        routes.retain(|rule| rule.name() != name);
        before != routes.len()
    }

    /// Removes every rule, hook, domain and wait set.
    pub fn reset(&self) {
        self.befores.write().clear();
        self.afters.write().clear();
        self.routes.write().clear();
        self.domains.write().clear();
        self.waits.clear();
    }

    /// Returns a copy of the routes.
    pub fn routes(&self) -> RuleList {
        self.routes.read().clone()
    }

    /// Returns the wait registry.
    pub fn waits(&self) -> &WaitRegistry {
        &self.waits
    }

    fn find_route(&self, name: &str) -> Option<Arc<Rule>> {
        find_by_name(&self.routes.read(), name)
    }

    fn find_scoped(&self, scope: &str) -> Option<Arc<Rule>> {
        let found = [&self.routes, &self.befores, &self.afters]
            .into_iter()
            .find_map(|table| find_by_scope(&table.read(), scope));
        if found.is_some() {
            return found;
        }
        let from_domain = self
            .domains
            .read()
            .values()
            .find_map(|rules| find_by_scope(rules, scope));
        from_domain.or_else(|| self.waits.find_scoped(scope))
    }

    // ─── Turn ─────────────────────────────────────────────────────────────────

    /// Runs one turn.
    pub async fn reply(&self, inbound: InboundMessage, session: Session) -> Outcome {
        let span = span!(Level::DEBUG, "turn", uid = %inbound.uid);
        self.run_turn(inbound, session).instrument(span).await
    }

    async fn run_turn(&self, inbound: InboundMessage, session: Session) -> Outcome {
        let config = self.config();

        let mut message = Message::new(inbound, session);
        if !config.keep_blank {
            message.trim_text();
        }
        let message = Arc::new(message);
        debug!(kind = %message.kind(), text = ?message.text(), "Turn started");

        let waiter = message.session().wait.take_waiter();
        let wait_rules = match waiter {
            Some(name) => {
                let count = message.session().wait.rewait_count;
                message.set_rewait_count(count);
                let rules = self.get_wait_rule(&name);
                match &rules {
                    Some(rules) => debug!(waiter = %name, count = rules.len(), "Waiter found"),
                    None => warn!(waiter = %name, "Waiter cannot be resolved, ignored"),
                }
                rules.unwrap_or_default()
            }
            None => {
                message.session().wait.rewait_count = 0;
                RuleList::new()
            }
        };

        let mut list = self.befores.read().clone();
        list.extend(wait_rules);
        list.extend(self.routes.read().iter().cloned());

        let end = self.walk(list, &message, Stage::Main, &config).await;
        let mut error = self.finish(end, &message, &config);

        let afters = self.afters.read().clone();
        if let StageEnd::Failed(err) = self.walk(afters, &message, Stage::After, &config).await {
            error!(code = %err.code(), error = %err, "After-reply hook failed");
            message.set_error(err.clone());
            message.set_reply(config.code_to_reply(&err.code()));
            error = Some(err);
        }

        debug!(reply = ?message.reply(), "Turn finished");
        Outcome { error, message }
    }

    async fn walk(
        &self,
        mut list: RuleList,
        message: &Arc<Message>,
        stage: Stage,
        config: &DispatcherConfig,
    ) -> StageEnd {
        let mut domain: Option<String> = None;
        let mut i = 0;

        while i < list.len() {
            let rule = Arc::clone(&list[i]);
            message.set_cursor(i, rule.name());

            if rule.is_before() && rule.domain() != domain.as_deref() {
                i += 1;
                continue;
            }
            if !rule.matches(message) {
                i += 1;
                continue;
            }

            if stage == Stage::Main
                && domain.is_none()
                && let Some(tag) = rule.domain()
            {
                debug!(domain = %tag, rule = %rule.name(), "Entering domain");
                let mut spliced: RuleList = self
                    .befores
                    .read()
                    .iter()
                    .filter(|hook| hook.domain() == Some(tag))
                    .cloned()
                    .collect();
                spliced.extend(self.domains.read().get(tag).into_iter().flatten().cloned());
                spliced.extend(list.split_off(i));
                list = spliced;
                domain = Some(tag.to_string());
                i = 0;
                continue;
            }

            let result = match rule.exec(message).await {
                Ok(result) => result,
                Err(err) if config.break_on_error => {
                    return StageEnd::Failed(ReplyError::handler(rule.name(), err));
                }
                Err(err) => {
                    warn!(rule = %rule.name(), error = %err, "Handler failed, continuing");
                    None
                }
            };

            if stage == Stage::Main && (result.is_some() || message.is_ended()) {
                debug!(rule = %rule.name(), "Rule matched");
                if let Some(key) = self.waits.get_or_insert_replies(&rule) {
                    message.wait(key);
                }
                return StageEnd::Done(result);
            }
            i += 1;
        }

        StageEnd::Exhausted
    }

    /// Settles the main stage: records the error and fills the reply slot.
    fn finish(
        &self,
        end: StageEnd,
        message: &Message,
        config: &DispatcherConfig,
    ) -> Option<ReplyError> {
        let (reply, error) = match end {
            StageEnd::Done(Some(reply)) => (Some(reply), None),
            StageEnd::Done(None) => match message.reply() {
                Some(reply) => (Some(reply), None),
                None => (None, Some(ReplyError::NoReply)),
            },
            StageEnd::Exhausted => (message.reply(), Some(ReplyError::NotFound)),
            StageEnd::Failed(err) => (None, Some(err)),
        };

        let mut reply = reply;
        if let Some(err) = &error {
            if err.is_not_found() {
                debug!("No rule produced a reply");
            } else {
                error!(code = %err.code(), error = %err, "Turn ended with an error");
            }
            message.set_error(err.clone());
            if reply.is_none() {
                reply = Some(Reply::Text(config.code_to_reply(&err.code())));
            }
        }

        let reply = reply
            .map(Reply::pick)
            .unwrap_or_else(|| Reply::text(""));
        message.set_reply(reply);
        error
    }
}

fn normalize(spec: RuleSpec) -> RuleResult<RuleList> {
    let rules = convert(spec, None)?;
    if rules.is_empty() {
        return Err(RuleError::EmptyRegistration);
    }
    Ok(rules)
}

fn find_by_name(rules: &[Arc<Rule>], name: &str) -> Option<Arc<Rule>> {
    rules.iter().find(|rule| rule.name() == name).cloned()
}

/// Depth-first search through rules and their replies.
pub(crate) fn find_by_scope(rules: &[Arc<Rule>], scope: &str) -> Option<Arc<Rule>> {
    rules.iter().find_map(|rule| {
        if rule.scope() == scope {
            return Some(Arc::clone(rule));
        }
        match rule.replies() {
            Some(replies) if scope.starts_with(rule.scope()) => find_by_scope(replies, scope),
            _ => None,
        }
    })
}
