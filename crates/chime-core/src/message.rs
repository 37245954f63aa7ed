//! Inbound messages and the per-turn message handle.
//!
//! - [`InboundMessage`] is the raw payload handed over by the host, as
//!   produced by the upstream protocol layer.
//!
//! - [`Message`] is what rules see during one turn. It is shared with
//!   asynchronous handlers as `Arc<Message>`, so every field a handler may
//!   change (params, reply slot, session, turn bookkeeping) sits behind its
//!   own lock. Guards are never held by the engine across an await point.
//!
//! Handlers drive the wait-state through [`Message::wait`],
//! [`Message::rewait`] and [`Message::resolve`].

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use parking_lot::{Mutex, MutexGuard};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ReplyError;
use crate::reply::Reply;
use crate::session::Session;

/// Capture parameters collected while matching.
pub type Params = HashMap<String, String>;

/// The type of an inbound message.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    /// Plain text message.
    #[default]
    Text,
    /// Image message.
    Image,
    /// Voice message.
    Voice,
    /// Video message.
    Video,
    /// Location message.
    Location,
    /// Link message.
    Link,
    /// Platform event (subscribe, click, ...).
    Event,
    /// Anything else.
    #[serde(other)]
    Other,
}

impl MessageKind {
    /// Returns the wire name of this kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Image => "image",
            Self::Voice => "voice",
            Self::Video => "video",
            Self::Location => "location",
            Self::Link => "link",
            Self::Event => "event",
            Self::Other => "other",
        }
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// InboundMessage: raw payload
// =============================================================================

/// The raw payload of one inbound message.
///
/// Unknown fields are kept in `extra` and exposed to handlers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InboundMessage {
    /// Conversation id; also the session key.
    #[serde(default)]
    pub uid: String,

    /// Message type.
    #[serde(default, rename = "type")]
    pub kind: MessageKind,

    /// Text payload, if any.
    #[serde(default)]
    pub text: Option<String>,

    /// Pre-filled parameters.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub params: Params,

    /// Any other payload fields.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl InboundMessage {
    /// Creates a text message for conversation `uid`.
    pub fn text(uid: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            uid: uid.into(),
            kind: MessageKind::Text,
            text: Some(text.into()),
            ..Default::default()
        }
    }

    /// Creates a message of the given kind without text.
    pub fn new(uid: impl Into<String>, kind: MessageKind) -> Self {
        Self {
            uid: uid.into(),
            kind,
            ..Default::default()
        }
    }

    /// Adds an extra payload field (builder pattern).
    pub fn with_extra(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }
}

// =============================================================================
// Message: per-turn handle
// =============================================================================

#[derive(Debug, Default)]
struct Cursor {
    index: usize,
    rule: Option<String>,
}

/// The message handle of one turn.
///
/// The handle carries no reference to the engine. A handler that registers
/// rules or looks up wait-rule sets while it runs captures a `Weak` to the
/// dispatcher instead:
///
/// ```rust,ignore
/// let engine = Arc::downgrade(&runtime.shared_dispatcher());
/// runtime.dispatcher().set(RuleDef::route("=quiz", Handler::from_fn(move |msg: &Message| {
///     if let Some(engine) = engine.upgrade() {
///         let _ = engine.wait_rule("answer", RuleDef::route("=4", "correct"));
///     }
///     msg.wait("answer");
///     "2 + 2 = ?"
/// })))?;
/// ```
///
/// # Locking
///
/// [`session`](Self::session) returns a guard. Drop it before calling
/// [`wait`](Self::wait), [`rewait`](Self::rewait) or
/// [`resolve`](Self::resolve), which lock the session themselves.
pub struct Message {
    uid: String,
    kind: MessageKind,
    text: Option<String>,
    extra: Map<String, Value>,
    params: Mutex<Params>,
    reply: Mutex<Option<Reply>>,
    session: Mutex<Session>,
    cursor: Mutex<Cursor>,
    ended: AtomicBool,
    rewait_count: AtomicU32,
    error: Mutex<Option<ReplyError>>,
}

impl Message {
    /// Creates the turn handle from a raw payload and the loaded session.
    pub fn new(inbound: InboundMessage, session: Session) -> Self {
        Self {
            uid: inbound.uid,
            kind: inbound.kind,
            text: inbound.text,
            extra: inbound.extra,
            params: Mutex::new(inbound.params),
            reply: Mutex::new(None),
            session: Mutex::new(session),
            cursor: Mutex::new(Cursor::default()),
            ended: AtomicBool::new(false),
            rewait_count: AtomicU32::new(0),
            error: Mutex::new(None),
        }
    }

    /// Trims surrounding whitespace from the text payload.
    pub fn trim_text(&mut self) {
        if let Some(text) = &mut self.text {
            let trimmed = text.trim();
            if trimmed.len() != text.len() {
                *text = trimmed.to_string();
            }
        }
    }

    // ─── Payload ──────────────────────────────────────────────────────────────

    /// Returns the conversation id.
    pub fn uid(&self) -> &str {
        &self.uid
    }

    /// Returns the message kind.
    pub fn kind(&self) -> MessageKind {
        self.kind
    }

    /// Returns `true` if the message is of the given kind.
    pub fn is(&self, kind: MessageKind) -> bool {
        self.kind == kind
    }

    /// Returns the text payload.
    pub fn text(&self) -> Option<&str> {
        self.text.as_deref()
    }

    /// Returns the extra payload fields.
    pub fn extra(&self) -> &Map<String, Value> {
        &self.extra
    }

    /// Returns one extra payload field.
    pub fn get_extra(&self, key: &str) -> Option<&Value> {
        self.extra.get(key)
    }

    // ─── Params ───────────────────────────────────────────────────────────────

    /// Returns a copy of the current params.
    pub fn params(&self) -> Params {
        self.params.lock().clone()
    }

    /// Returns one param.
    pub fn param(&self, key: &str) -> Option<String> {
        self.params.lock().get(key).cloned()
    }

    /// Returns `true` if any param is set.
    pub fn has_params(&self) -> bool {
        !self.params.lock().is_empty()
    }

    /// Sets one param.
    pub fn set_param(&self, key: impl Into<String>, value: impl Into<String>) {
        self.params.lock().insert(key.into(), value.into());
    }

    /// Removes one param.
    pub fn remove_param(&self, key: &str) -> Option<String> {
        self.params.lock().remove(key)
    }

    /// Merges params; later entries overwrite earlier ones.
    pub fn merge_params<I, K, V>(&self, entries: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut params = self.params.lock();
        for (k, v) in entries {
            params.insert(k.into(), v.into());
        }
    }

    // ─── Reply slot ───────────────────────────────────────────────────────────

    /// Returns the current reply.
    pub fn reply(&self) -> Option<Reply> {
        self.reply.lock().clone()
    }

    /// Returns the current reply rendered as text, if it is textual.
    pub fn reply_text(&self) -> Option<String> {
        self.reply
            .lock()
            .as_ref()
            .and_then(|r| r.as_text().map(str::to_string))
    }

    /// Overwrites the reply slot.
    pub fn set_reply(&self, reply: impl Into<Reply>) {
        *self.reply.lock() = Some(reply.into());
    }

    /// Clears the reply slot.
    pub fn clear_reply(&self) {
        *self.reply.lock() = None;
    }

    // ─── Session & wait-state ─────────────────────────────────────────────────

    /// Locks and returns the session.
    pub fn session(&self) -> MutexGuard<'_, Session> {
        self.session.lock()
    }

    /// Returns a copy of the session, e.g. for persisting it.
    pub fn session_snapshot(&self) -> Session {
        self.session.lock().clone()
    }

    /// Pins the next turn of this conversation to the wait-rule `name`.
    pub fn wait(&self, name: impl Into<String>) {
        self.session.lock().wait.wait(name);
    }

    /// Re-arms the wait-rule consumed by this turn and bumps the rewait count.
    pub fn rewait(&self) {
        let mut session = self.session.lock();
        session.wait.rewait();
        self.rewait_count
            .store(session.wait.rewait_count, Ordering::SeqCst);
    }

    /// Leaves the wait-state: clears waiter, last waited and rewait count.
    pub fn resolve(&self) {
        self.session.lock().wait.resolve();
        self.rewait_count.store(0, Ordering::SeqCst);
    }

    /// Returns how many times the current prompt was re-armed before this
    /// turn (updated by [`rewait`](Self::rewait)).
    pub fn rewait_count(&self) -> u32 {
        self.rewait_count.load(Ordering::SeqCst)
    }

    /// Records the rewait count read from the session at turn start.
    pub fn set_rewait_count(&self, count: u32) {
        self.rewait_count.store(count, Ordering::SeqCst);
    }

    // ─── Turn bookkeeping ─────────────────────────────────────────────────────

    /// Marks the turn as ended even without a reply value.
    pub fn end(&self) {
        self.ended.store(true, Ordering::SeqCst);
    }

    /// Returns `true` if a handler ended the turn.
    pub fn is_ended(&self) -> bool {
        self.ended.load(Ordering::SeqCst)
    }

    /// Returns the index of the rule being evaluated in the current walk.
    pub fn rule_index(&self) -> usize {
        self.cursor.lock().index
    }

    /// Returns the name of the rule being evaluated.
    pub fn current_rule(&self) -> Option<String> {
        self.cursor.lock().rule.clone()
    }

    /// Moves the walk cursor; called by the dispatcher for every rule.
    pub fn set_cursor(&self, index: usize, rule: &str) {
        let mut cursor = self.cursor.lock();
        cursor.index = index;
        cursor.rule = Some(rule.to_string());
    }

    /// Returns the terminal error of the turn, if any.
    pub fn error(&self) -> Option<ReplyError> {
        self.error.lock().clone()
    }

    /// Records the terminal error of the turn.
    pub fn set_error(&self, error: ReplyError) {
        *self.error.lock() = Some(error);
    }
}

impl fmt::Debug for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Message")
            .field("uid", &self.uid)
            .field("kind", &self.kind)
            .field("text", &self.text)
            .field("reply", &self.reply())
            .field("ended", &self.is_ended())
            .finish_non_exhaustive()
    }
}
