//! Rule declarations in all accepted shapes.
//!
//! Every registration entry point takes `impl Into<RuleSpec>` and normalizes
//! it with [`convert`] into a flat [`RuleList`]:
//!
//! ```rust,ignore
//! dispatcher.set("hello")?;                                   // one catch-all rule
//! dispatcher.set(RuleDef::route("hi", "hello"))?;             // one full rule
//! dispatcher.set([("=1", "one"), ("=2", "two")])?;            // pattern -> handler map
//! dispatcher.set(vec![RuleSpec::from("a"), rule_def.into()])?; // a mixed list
//! ```

use std::sync::Arc;

use crate::error::RuleResult;
use crate::handler::Handler;
use crate::rule::{PatternSpec, Rule, RuleDef, RuleList};

/// One or more rule declarations.
#[derive(Clone, Default)]
pub enum RuleSpec {
    /// Nothing.
    #[default]
    Empty,
    /// A literal reply; becomes an always-matching rule named after it.
    Text(String),
    /// A bare handler; becomes an always-matching rule.
    Handler(Handler),
    /// A full declaration.
    Rule(RuleDef),
    /// An already-built rule, reused as-is.
    Compiled(Arc<Rule>),
    /// A single pattern and its handler.
    Pair(PatternSpec, Handler),
    /// A list of declarations, flattened in order.
    List(Vec<RuleSpec>),
    /// A pattern-to-handler table; entry order is priority.
    Map(Vec<(PatternSpec, Handler)>),
}

impl RuleSpec {
    /// Starts an empty pattern-to-handler table.
    pub fn map() -> Self {
        Self::Map(Vec::new())
    }

    /// Appends a pattern and its handler.
    pub fn entry(self, pattern: impl Into<PatternSpec>, handler: impl Into<Handler>) -> Self {
        let (pattern, handler) = (pattern.into(), handler.into());
        match self {
            Self::Map(mut entries) => {
                entries.push((pattern, handler));
                Self::Map(entries)
            }
            Self::Empty => Self::Map(vec![(pattern, handler)]),
            other => Self::List(vec![other, Self::Pair(pattern, handler)]),
        }
    }

    /// Returns `true` if this declaration cannot produce any rule.
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Empty => true,
            Self::List(items) => items.iter().all(Self::is_empty),
            Self::Map(entries) => entries.is_empty(),
            _ => false,
        }
    }
}

/// Normalizes a declaration into a rule list.
///
/// `parent` is recorded on every newly built rule; it is the scope of the
/// rule whose `replies` are being normalized.
pub fn convert(spec: RuleSpec, parent: Option<&str>) -> RuleResult<RuleList> {
    let mut rules = RuleList::new();
    collect(spec, parent, &mut rules)?;
    Ok(rules)
}

fn collect(spec: RuleSpec, parent: Option<&str>, out: &mut RuleList) -> RuleResult<()> {
    match spec {
        RuleSpec::Empty => {}
        RuleSpec::Text(text) => {
            out.push(Arc::new(Rule::new(RuleDef::new(Handler::Literal(text)), parent)?));
        }
        RuleSpec::Handler(handler) => out.push(Arc::new(Rule::new(RuleDef::new(handler), parent)?)),
        RuleSpec::Rule(def) => out.push(Arc::new(Rule::new(def, parent)?)),
        RuleSpec::Compiled(rule) => out.push(rule),
        RuleSpec::Pair(pattern, handler) => {
            out.push(Arc::new(Rule::new(RuleDef::route(pattern, handler), parent)?));
        }
        RuleSpec::List(items) => {
            for item in items {
                collect(item, parent, out)?;
            }
        }
        RuleSpec::Map(entries) => {
            for (pattern, handler) in entries {
                out.push(Arc::new(Rule::new(RuleDef::route(pattern, handler), parent)?));
            }
        }
    }
    Ok(())
}

impl From<&str> for RuleSpec {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

impl From<String> for RuleSpec {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<Handler> for RuleSpec {
    fn from(handler: Handler) -> Self {
        Self::Handler(handler)
    }
}

impl From<RuleDef> for RuleSpec {
    fn from(def: RuleDef) -> Self {
        Self::Rule(def)
    }
}

impl From<Rule> for RuleSpec {
    fn from(rule: Rule) -> Self {
        Self::Compiled(Arc::new(rule))
    }
}

impl From<Arc<Rule>> for RuleSpec {
    fn from(rule: Arc<Rule>) -> Self {
        Self::Compiled(rule)
    }
}

impl From<RuleList> for RuleSpec {
    fn from(rules: RuleList) -> Self {
        Self::List(rules.into_iter().map(Self::Compiled).collect())
    }
}

impl From<Vec<RuleSpec>> for RuleSpec {
    fn from(items: Vec<RuleSpec>) -> Self {
        Self::List(items)
    }
}

impl From<Vec<RuleDef>> for RuleSpec {
    fn from(defs: Vec<RuleDef>) -> Self {
        Self::List(defs.into_iter().map(Self::Rule).collect())
    }
}

impl<P, H> From<(P, H)> for RuleSpec
where
    P: Into<PatternSpec>,
    H: Into<Handler>,
{
    fn from((pattern, handler): (P, H)) -> Self {
        Self::Pair(pattern.into(), handler.into())
    }
}

impl<P, H> From<Vec<(P, H)>> for RuleSpec
where
    P: Into<PatternSpec>,
    H: Into<Handler>,
{
    fn from(entries: Vec<(P, H)>) -> Self {
        Self::Map(
            entries
                .into_iter()
                .map(|(p, h)| (p.into(), h.into()))
                .collect(),
        )
    }
}

impl<P, H, const N: usize> From<[(P, H); N]> for RuleSpec
where
    P: Into<PatternSpec>,
    H: Into<Handler>,
{
    fn from(entries: [(P, H); N]) -> Self {
        Self::Map(
            entries
                .into_iter()
                .map(|(p, h)| (p.into(), h.into()))
                .collect(),
        )
    }
}
