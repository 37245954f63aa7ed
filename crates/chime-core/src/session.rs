//! Per-conversation session state.
//!
//! A [`Session`] is loaded from a [`SessionStore`](crate::store::SessionStore)
//! at the start of a turn, mutated while the turn runs, and persisted when the
//! turn ends. The engine's own bookkeeping lives in [`WaitState`], kept apart
//! from the free-form `data` bag that handlers use, so handler keys can never
//! collide with wait-state fields.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

/// Wait-state of a conversation.
///
/// `waiter` names the rule set the next turn must try first. After a turn
/// consumes it, the name moves to `last_waited` so that
/// [`rewait`](Self::rewait) can re-arm it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WaitState {
    /// Rule set to try before the main routes on the next turn.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub waiter: Option<String>,

    /// The waiter consumed by the most recent turn.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_waited: Option<String>,

    /// How many times the current prompt was re-armed.
    #[serde(default, skip_serializing_if = "is_zero")]
    pub rewait_count: u32,
}

fn is_zero(n: &u32) -> bool {
    *n == 0
}

impl WaitState {
    /// Returns `true` when no wait-state is recorded at all.
    pub fn is_idle(&self) -> bool {
        self.waiter.is_none() && self.last_waited.is_none() && self.rewait_count == 0
    }

    /// Arms `name` as the next turn's waiter.
    pub fn wait(&mut self, name: impl Into<String>) {
        let name = name.into();
        debug!(waiter = %name, "Wait rule armed");
        self.waiter = Some(name);
    }

    /// Consumes the pending waiter, remembering it as `last_waited`.
    pub fn take_waiter(&mut self) -> Option<String> {
        let waiter = self.waiter.take()?;
        self.last_waited = Some(waiter.clone());
        Some(waiter)
    }

    /// Re-arms `last_waited` and bumps `rewait_count` by one.
    ///
    /// Returns the re-armed name, if there was one.
    pub fn rewait(&mut self) -> Option<&str> {
        self.rewait_count += 1;
        debug!(
            last_waited = self.last_waited.as_deref().unwrap_or("<none>"),
            rewait_count = self.rewait_count,
            "Rewait"
        );
        self.waiter.clone_from(&self.last_waited);
        self.waiter.as_deref()
    }

    /// Leaves the wait-state entirely.
    pub fn resolve(&mut self) {
        *self = Self::default();
    }
}

/// Mutable per-conversation state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Session {
    /// Engine-owned wait-state.
    #[serde(default, skip_serializing_if = "WaitState::is_idle")]
    pub wait: WaitState,

    /// Handler-defined fields.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub data: Map<String, Value>,
}

impl Session {
    /// Creates an empty session.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` when neither wait-state nor data is present.
    pub fn is_empty(&self) -> bool {
        self.wait.is_idle() && self.data.is_empty()
    }

    /// Reads and deserializes a handler-defined field.
    ///
    /// Returns `None` when the key is absent or holds a different shape.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.data
            .get(key)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    /// Returns the raw JSON value of a handler-defined field.
    pub fn get_value(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }

    /// Stores a handler-defined field. Values that fail to serialize are
    /// stored as `null`.
    pub fn set<T: Serialize>(&mut self, key: impl Into<String>, value: T) {
        let value = serde_json::to_value(value).unwrap_or(Value::Null);
        self.data.insert(key.into(), value);
    }

    /// Removes a handler-defined field.
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.data.remove(key)
    }

    /// Returns `true` if a handler-defined field exists.
    pub fn contains(&self, key: &str) -> bool {
        self.data.contains_key(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_take_waiter_moves_to_last_waited() {
        let mut wait = WaitState::default();
        wait.wait("_reply_dial");
        assert_eq!(wait.take_waiter().as_deref(), Some("_reply_dial"));
        assert_eq!(wait.waiter, None);
        assert_eq!(wait.last_waited.as_deref(), Some("_reply_dial"));
        assert_eq!(wait.take_waiter(), None);
    }

    #[test]
    fn test_rewait_increments_and_rearms() {
        let mut wait = WaitState::default();
        wait.wait("guess");
        wait.take_waiter();

        for n in 1..=3 {
            assert_eq!(wait.rewait(), Some("guess"));
            assert_eq!(wait.rewait_count, n);
            wait.take_waiter();
        }

        wait.resolve();
        assert!(wait.is_idle());
    }

    #[test]
    fn test_rewait_without_last_waited_only_counts() {
        let mut wait = WaitState::default();
        assert_eq!(wait.rewait(), None);
        assert_eq!(wait.rewait_count, 1);
        assert_eq!(wait.waiter, None);
    }

    #[test]
    fn test_data_is_kept_apart_from_wait_state() {
        let mut session = Session::new();
        session.set("waiter", "user value");
        session.wait.wait("_reply_x");

        assert_eq!(session.get::<String>("waiter").as_deref(), Some("user value"));
        assert_eq!(session.wait.waiter.as_deref(), Some("_reply_x"));

        let json = serde_json::to_value(&session).unwrap();
        assert_eq!(
            json,
            json!({
                "wait": { "waiter": "_reply_x" },
                "data": { "waiter": "user value" }
            })
        );
    }

    #[test]
    fn test_deserialize_empty_object() {
        let session: Session = serde_json::from_value(json!({})).unwrap();
        assert!(session.is_empty());
    }
}
