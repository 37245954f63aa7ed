//! Named rule sets consulted at the start of a waiting turn.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;

use crate::error::{RuleError, RuleResult};
use crate::rule::{Rule, RuleList};

/// Prefix of wait-rule names derived from a rule's `replies`.
pub const REPLY_PREFIX: &str = "_reply_";

/// Registry of wait-rule sets keyed by name.
#[derive(Debug, Default)]
pub struct WaitRegistry {
    rules: RwLock<HashMap<String, RuleList>>,
}

impl WaitRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a rule set under `name`.
    ///
    /// Fails if the name is already taken.
    pub fn register(&self, name: impl Into<String>, rules: RuleList) -> RuleResult<()> {
        let name = name.into();
        let mut map = self.rules.write();
        if map.contains_key(&name) {
            return Err(RuleError::DuplicateWaitRule(name));
        }
        debug!(wait_rule = %name, count = rules.len(), "Wait rule registered");
        map.insert(name, rules);
        Ok(())
    }

    /// Returns the rule set registered under `name`.
    pub fn get(&self, name: &str) -> Option<RuleList> {
        self.rules.read().get(name).cloned()
    }

    /// Returns the reply set of `rule`, registering it on first use.
    pub fn get_or_insert_replies(&self, rule: &Rule) -> Option<String> {
        let replies = rule.replies()?;
        let key = rule.reply_key();
        if self.rules.read().contains_key(&key) {
            return Some(key);
        }
        let mut map = self.rules.write();
        if !map.contains_key(&key) {
            debug!(wait_rule = %key, count = replies.len(), "Reply rules registered");
            map.insert(key.clone(), replies.clone());
        }
        Some(key)
    }

    /// Removes and returns the rule set registered under `name`.
    pub fn remove(&self, name: &str) -> Option<RuleList> {
        self.rules.write().remove(name)
    }

    /// Returns `true` if `name` is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.rules.read().contains_key(name)
    }

    /// Finds a rule by name in any registered set.
    pub fn find_rule(&self, name: &str) -> Option<Arc<Rule>> {
        self.rules
            .read()
            .values()
            .flatten()
            .find(|rule| rule.name() == name)
            .cloned()
    }

    /// Finds a rule by scope in any registered set, nested replies included.
    pub fn find_scoped(&self, scope: &str) -> Option<Arc<Rule>> {
        self.rules
            .read()
            .values()
            .find_map(|rules| crate::dispatcher::find_by_scope(rules, scope))
    }

    /// Removes everything.
    pub fn clear(&self) {
        self.rules.write().clear();
    }

    /// Returns the number of registered sets.
    pub fn len(&self) -> usize {
        self.rules.read().len()
    }

    /// Returns `true` if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.rules.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rule::RuleDef;
    use crate::spec::RuleSpec;

    fn list(spec: impl Into<RuleSpec>) -> RuleList {
        crate::spec::convert(spec.into(), None).unwrap()
    }

    #[test]
    fn test_duplicate_name_rejected() {
        let registry = WaitRegistry::new();
        registry.register("guess", list("a")).unwrap();
        assert_eq!(
            registry.register("guess", list("b")),
            Err(RuleError::DuplicateWaitRule("guess".into()))
        );
        assert_eq!(registry.get("guess").unwrap()[0].name(), "a");
    }

    #[test]
    fn test_replies_registered_once() {
        let registry = WaitRegistry::new();
        let rule = Rule::new(
            RuleDef::route("dial", "choose").replies([("=1", "A")]),
            None,
        )
        .unwrap();

        let key = registry.get_or_insert_replies(&rule).unwrap();
        assert_eq!(key, "_reply_/dial/");
        let first = registry.get(&key).unwrap();
        registry.get_or_insert_replies(&rule);
        let second = registry.get(&key).unwrap();
        assert!(Arc::ptr_eq(&first[0], &second[0]));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_rule_without_replies() {
        let registry = WaitRegistry::new();
        let rule = Rule::new(RuleDef::new("x"), None).unwrap();
        assert_eq!(registry.get_or_insert_replies(&rule), None);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_remove_and_clear() {
        let registry = WaitRegistry::new();
        registry.register("a", list("x")).unwrap();
        registry.register("b", list("y")).unwrap();
        assert!(registry.remove("a").is_some());
        assert!(!registry.contains("a"));
        assert_eq!(registry.find_rule("y").unwrap().name(), "y");
        registry.clear();
        assert!(registry.is_empty());
    }
}
