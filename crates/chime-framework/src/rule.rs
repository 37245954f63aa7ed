//! Rules: named (pattern, handler) records.
//!
//! A [`Rule`] is built once from a [`RuleDef`] and never changes afterwards.
//! Building a rule resolves everything that could otherwise be re-parsed on
//! every message:
//!
//! - the pattern source is compiled through a small grammar
//!   (see [`Pattern::compile`]),
//! - the name is derived when none is given,
//! - nested `replies` are normalized into a [`RuleList`] so that the wait
//!   registry only has to store them on first use.
//!
//! A rule declared inside another rule's `replies` is scoped under its
//! parent: its scope is `<parent scope>/<name>`, and its own replies are
//! registered as `_reply_<scope>`. Two menus that both answer `=1` thus keep
//! separate follow-up sets.
//!
//! # Pattern grammar
//!
//! | Source | Pattern |
//! |--------|---------|
//! | `Y`, `N` | canonical yes / no phrase regexes |
//! | `/body/flags` | regex `body` with flags `i`, `m`, `s` (`g` is ignored) |
//! | `=text` | exact equality with `text` |
//! | anything else | regex compiled from the whole string |

use std::fmt;
use std::sync::Arc;

use regex::{Regex, RegexBuilder};

use chime_core::Message;

use crate::error::{RuleError, RuleResult};
use crate::handler::{ANONYMOUS_FN, Handler, function_name};
use crate::spec::{RuleSpec, convert};

/// An ordered list of rules; order is match priority.
pub type RuleList = Vec<Arc<Rule>>;

/// A predicate over the message, called with the owning rule as context.
pub type PredicateFn = Arc<dyn Fn(&Rule, &Message) -> bool + Send + Sync>;

/// Affirmative consent phrases, tolerant of trailing soft particles.
pub const YES_PATTERN: &str =
    "^(是|yes|yep|yeah|Y|阔以|可以|要得|好|需?要|OK|恩|嗯|找|搜|搞起)[啊的吧嘛诶啦唉哎!.。]*$";

/// Negative consent phrases, tolerant of trailing soft particles.
pub const NO_PATTERN: &str =
    "^(不(是|需?要|必|用|需|行|可以)?了?|no?|nope|不好|否|算了)[啊的吧嘛诶啦唉哎!.。]*$";

const REGEX_FLAGS: &str = "gimsuy";

// ============================================================================
// Pattern
// ============================================================================

/// How a pattern is declared, before compilation.
#[derive(Clone, Default)]
pub enum PatternSpec {
    /// Always match.
    #[default]
    Any,
    /// A source string, compiled through the pattern grammar.
    Source(String),
    /// A pre-built regex.
    Regex(Regex),
    /// A predicate function.
    Predicate {
        /// The predicate.
        f: PredicateFn,
        /// The predicate's item name, when it has one.
        name: Option<String>,
    },
}

impl PatternSpec {
    /// Wraps a predicate function.
    pub fn predicate<F>(f: F) -> Self
    where
        F: Fn(&Rule, &Message) -> bool + Send + Sync + 'static,
    {
        Self::Predicate {
            f: Arc::new(f),
            name: function_name::<F>(),
        }
    }
}

impl From<&str> for PatternSpec {
    fn from(source: &str) -> Self {
        Self::Source(source.to_string())
    }
}

impl From<String> for PatternSpec {
    fn from(source: String) -> Self {
        Self::Source(source)
    }
}

impl From<&String> for PatternSpec {
    fn from(source: &String) -> Self {
        Self::Source(source.clone())
    }
}

impl From<Regex> for PatternSpec {
    fn from(regex: Regex) -> Self {
        Self::Regex(regex)
    }
}

impl<T: Into<PatternSpec>> From<Option<T>> for PatternSpec {
    fn from(spec: Option<T>) -> Self {
        spec.map_or(Self::Any, Into::into)
    }
}

/// A compiled pattern.
#[derive(Clone)]
pub enum Pattern {
    /// Matches every message.
    Any,
    /// Exact text equality.
    Literal(String),
    /// Unanchored regex search with capture extraction.
    Regex {
        /// The compiled regex.
        regex: Regex,
        /// The `/body/flags` source text.
        source: String,
    },
    /// A predicate whose answer is authoritative.
    Predicate {
        /// The predicate.
        f: PredicateFn,
        /// The predicate's item name, when it has one.
        name: Option<String>,
    },
}

impl Pattern {
    /// Compiles a declared pattern.
    pub fn compile(spec: PatternSpec) -> RuleResult<Self> {
        match spec {
            PatternSpec::Any => Ok(Self::Any),
            PatternSpec::Regex(regex) => {
                let source = format!("/{}/", regex.as_str());
                Ok(Self::Regex { regex, source })
            }
            PatternSpec::Predicate { f, name } => Ok(Self::Predicate { f, name }),
            PatternSpec::Source(source) => Self::parse(&source),
        }
    }

    /// Compiles a source string through the pattern grammar.
    pub fn parse(source: &str) -> RuleResult<Self> {
        if let Some(body) = shorthand(source) {
            return Self::regex(body, "i");
        }
        if let Some((body, flags)) = split_regex_literal(source) {
            return Self::regex(body, flags);
        }
        if let Some(literal) = source.strip_prefix('=') {
            return Ok(Self::Literal(literal.to_string()));
        }
        Self::regex(source, "")
    }

    fn regex(body: &str, flags: &str) -> RuleResult<Self> {
        let source = format!("/{body}/{flags}");
        let mut builder = RegexBuilder::new(body);
        for flag in flags.chars() {
            match flag {
                'i' => builder.case_insensitive(true),
                'm' => builder.multi_line(true),
                's' => builder.dot_matches_new_line(true),
                _ => &mut builder,
            };
        }
        let regex = builder
            .build()
            .map_err(|e| RuleError::invalid_pattern(&source, e))?;
        Ok(Self::Regex { regex, source })
    }

    /// Returns the text a rule name is derived from, if the pattern has one.
    pub fn source(&self) -> Option<&str> {
        match self {
            Self::Any => None,
            Self::Literal(text) => Some(text),
            Self::Regex { source, .. } => Some(source),
            Self::Predicate { name, .. } => Some(name.as_deref().unwrap_or(ANONYMOUS_FN)),
        }
    }
}

impl fmt::Debug for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Any => f.write_str("Any"),
            Self::Literal(text) => f.debug_tuple("Literal").field(text).finish(),
            Self::Regex { source, .. } => f.debug_tuple("Regex").field(source).finish(),
            Self::Predicate { name, .. } => f
                .debug_struct("Predicate")
                .field("name", &name.as_deref().unwrap_or(ANONYMOUS_FN))
                .finish_non_exhaustive(),
        }
    }
}

fn shorthand(source: &str) -> Option<&'static str> {
    match source {
        "Y" => Some(YES_PATTERN),
        "N" => Some(NO_PATTERN),
        _ => None,
    }
}

/// Splits `/body/flags` into its parts.
fn split_regex_literal(source: &str) -> Option<(&str, &str)> {
    let rest = source.strip_prefix('/')?;
    let end = rest.rfind('/')?;
    let (body, flags) = (&rest[..end], &rest[end + 1..]);
    flags
        .chars()
        .all(|c| REGEX_FLAGS.contains(c))
        .then_some((body, flags))
}

// ============================================================================
// RuleDef - declaration
// ============================================================================

/// The declaration of a single rule.
///
/// # Example
///
/// ```rust,ignore
/// let def = RuleDef::route("dial", "choose: 1/2/3")
///     .replies(RuleSpec::map().entry("=1", "A").entry("=2", "B"));
/// ```
#[derive(Clone, Default)]
pub struct RuleDef {
    /// Explicit name; derived when absent.
    pub name: Option<String>,
    /// Free-form description.
    pub description: Option<String>,
    /// The pattern.
    pub pattern: PatternSpec,
    /// The handler.
    pub handler: Handler,
    /// Rules to try first on the next turn after this rule replies.
    pub replies: Option<Box<RuleSpec>>,
    /// Domain tag.
    pub domain: Option<String>,
}

impl RuleDef {
    /// Creates an always-matching rule with the given handler.
    pub fn new(handler: impl Into<Handler>) -> Self {
        Self {
            handler: handler.into(),
            ..Default::default()
        }
    }

    /// Creates a rule from a pattern and a handler.
    pub fn route(pattern: impl Into<PatternSpec>, handler: impl Into<Handler>) -> Self {
        Self {
            pattern: pattern.into(),
            handler: handler.into(),
            ..Default::default()
        }
    }

    /// Sets the name.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Sets the description.
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Sets the pattern.
    pub fn pattern(mut self, pattern: impl Into<PatternSpec>) -> Self {
        self.pattern = pattern.into();
        self
    }

    /// Sets the handler.
    pub fn handler(mut self, handler: impl Into<Handler>) -> Self {
        self.handler = handler.into();
        self
    }

    /// Sets the reply rules.
    pub fn replies(mut self, replies: impl Into<RuleSpec>) -> Self {
        self.replies = Some(Box::new(replies.into()));
        self
    }

    /// Sets the domain tag.
    pub fn domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = Some(domain.into());
        self
    }
}

// ============================================================================
// Rule
// ============================================================================

/// A compiled rule.
#[derive(Clone)]
pub struct Rule {
    name: String,
    description: Option<String>,
    pattern: Pattern,
    handler: Handler,
    replies: Option<RuleList>,
    domain: Option<String>,
    parent: Option<String>,
    scope: String,
    before: bool,
}

impl Rule {
    /// Builds a rule from its declaration.
    ///
    /// `parent` is the scope of the rule whose `replies` this rule was
    /// declared in.
    pub fn new(def: RuleDef, parent: Option<&str>) -> RuleResult<Self> {
        let pattern = Pattern::compile(def.pattern)?;
        let name = match def.name {
            Some(name) => name,
            None => pattern
                .source()
                .map(str::to_string)
                .unwrap_or_else(|| def.handler.display_name()),
        };
        let scope = match parent {
            Some(parent) => format!("{parent}/{name}"),
            None => name.clone(),
        };
        let replies = match def.replies {
            Some(spec) => Some(convert(*spec, Some(&scope))?),
            None => None,
        };

        Ok(Self {
            name,
            description: def.description,
            pattern,
            handler: def.handler,
            replies,
            domain: def.domain,
            parent: parent.map(str::to_string),
            scope,
            before: false,
        })
    }

    /// Returns the name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the description.
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Returns the compiled pattern.
    pub fn pattern(&self) -> &Pattern {
        &self.pattern
    }

    /// Returns the handler.
    pub fn handler(&self) -> &Handler {
        &self.handler
    }

    /// Returns the normalized reply rules.
    pub fn replies(&self) -> Option<&RuleList> {
        self.replies.as_ref()
    }

    /// Returns the domain tag.
    pub fn domain(&self) -> Option<&str> {
        self.domain.as_deref()
    }

    /// Returns the scope of the rule this one was declared under.
    pub fn parent(&self) -> Option<&str> {
        self.parent.as_deref()
    }

    /// Returns the name qualified by the parent chain; equal to the name
    /// for top-level rules.
    pub fn scope(&self) -> &str {
        &self.scope
    }

    /// Returns `true` for before-reply hooks.
    pub fn is_before(&self) -> bool {
        self.before
    }

    /// Returns the wait-rule name under which this rule's replies are
    /// registered.
    pub fn reply_key(&self) -> String {
        format!("{}{}", crate::registry::REPLY_PREFIX, self.scope)
    }

    pub(crate) fn into_before(mut self) -> Self {
        self.before = true;
        self
    }
}

impl fmt::Debug for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rule")
            .field("name", &self.name)
            .field("pattern", &self.pattern)
            .field("handler", &self.handler)
            .field("replies", &self.replies.as_ref().map(Vec::len))
            .field("domain", &self.domain)
            .finish_non_exhaustive()
    }
}
