/// URL rules: glob-like patterns that send matching tabs to a group
use crate::error::Result;
use crate::resolver::GroupRef;
use regex::Regex;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rule {
    pub pattern: String,
    #[serde(flatten)]
    pub target: GroupRef,
    /// Whether tab events apply this rule on their own
    #[serde(default)]
    pub auto_move: bool,
}

impl Rule {
    pub fn new(pattern: &str, target: GroupRef, auto_move: bool) -> Rule {
        Rule {
            pattern: pattern.to_string(),
            target,
            auto_move,
        }
    }
}

/// Which rules a lookup considers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleFilter {
    /// Event-driven grouping: only rules with `auto_move` set
    AutoMoveOnly,
    /// Manual "apply rules" and similar bulk flows
    All,
}

/// Compile a rule pattern into an unanchored regex
///
/// Dots and question marks are literal, `*` matches any run of characters.
/// Other regex syntax passes through untouched, so a pattern can still be
/// malformed.
pub fn compile_pattern(pattern: &str) -> Result<Regex> {
    let translated = pattern
        .replace('.', "\\.")
        .replace('*', ".*")
        .replace('?', "\\?");

    Ok(Regex::new(&translated)?)
}

/// Does `pattern` match anywhere in `url`?
pub fn matches_pattern(url: &str, pattern: &str) -> bool {
    match compile_pattern(pattern) {
        Ok(re) => re.is_match(url),
        Err(e) => {
            log::warn!("Ignoring rule pattern '{}': {}", pattern, e);
            false
        }
    }
}

/// Rules in stored order whose pattern matches `url`
pub fn matching_rules<'a>(
    url: &'a str,
    rules: &'a [Rule],
    filter: RuleFilter,
) -> impl Iterator<Item = &'a Rule> + 'a {
    rules
        .iter()
        .filter(move |rule| filter == RuleFilter::All || rule.auto_move)
        .filter(move |rule| matches_pattern(url, &rule.pattern))
}

/// First rule in stored order whose pattern matches `url`
pub fn find_matching_rule<'a>(url: &'a str, rules: &'a [Rule], filter: RuleFilter) -> Option<&'a Rule> {
    matching_rules(url, rules, filter).next()
}
