//! `{param}` substitution for literal handlers.

use std::borrow::Cow;
use std::sync::LazyLock;

use regex::{Captures, Regex};

use chime_core::Params;

static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\\)?\{([A-Za-z0-9_]+)\}").expect("placeholder regex is valid")
});

/// Replaces `{name}` tokens with values from `params`.
///
/// `\{name}` renders as a literal `{name}`; tokens without a matching param
/// are left untouched.
pub fn substitute<'a>(template: &'a str, params: &Params) -> Cow<'a, str> {
    if params.is_empty() {
        return Cow::Borrowed(template);
    }
    PLACEHOLDER.replace_all(template, |caps: &Captures<'_>| {
        let key = &caps[2];
        if caps.get(1).is_some() {
            return format!("{{{key}}}");
        }
        match params.get(key) {
            Some(value) => value.clone(),
            None => caps[0].to_string(),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(entries: &[(&str, &str)]) -> Params {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_substitute_named_and_numbered() {
        let p = params(&[("0", "hi bob"), ("1", "bob"), ("mood", "happy")]);
        assert_eq!(substitute("hello {1}, you look {mood}", &p), "hello bob, you look happy");
    }

    #[test]
    fn test_escaped_token_is_literal() {
        let p = params(&[("name", "bob")]);
        assert_eq!(substitute(r"\{name} is {name}", &p), "{name} is bob");
    }

    #[test]
    fn test_missing_key_left_verbatim() {
        let p = params(&[("a", "1")]);
        assert_eq!(substitute("{a}{b}", &p), "1{b}");
    }

    #[test]
    fn test_no_params_borrows() {
        assert!(matches!(substitute("{x}", &Params::new()), Cow::Borrowed("{x}")));
    }
}
