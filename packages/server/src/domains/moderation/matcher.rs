//! Rule matchers, resolved once per snapshot load.
//!
//! Each stored rule is compiled into a `Matcher` variant so evaluation never
//! re-parses strategy strings or recompiles patterns.

use regex::{Regex, RegexBuilder};
use thiserror::Error;

use super::models::{MatchStrategy, Rule};
use crate::common::utils::{fuzzy_key, normalize_text};

/// Upper bound on a compiled rule pattern. The regex engine matches in
/// linear time, so this caps memory rather than backtracking.
const REGEX_SIZE_LIMIT: usize = 1 << 20;

/// A rule that cannot be evaluated.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RuleFault {
    #[error("regex rule {rule_id} ('{word}') has no pattern")]
    MissingPattern { rule_id: i64, word: String },

    #[error("rule {rule_id} ('{word}') has an invalid pattern: {reason}")]
    InvalidPattern {
        rule_id: i64,
        word: String,
        reason: String,
    },

    #[error("rule {rule_id} reduces to an empty word and would match everything")]
    EmptyWord { rule_id: i64 },
}

#[derive(Debug, Clone)]
enum Matcher {
    Exact(String),
    Contains(String),
    Regex(Regex),
    Fuzzy(String),
    Faulty(RuleFault),
}

/// A rule paired with its ready-to-run matcher.
#[derive(Debug, Clone)]
pub struct CompiledRule {
    pub rule: Rule,
    matcher: Matcher,
}

impl CompiledRule {
    pub fn compile(rule: Rule) -> Self {
        let matcher = match build_matcher(&rule) {
            Ok(matcher) => matcher,
            Err(fault) => {
                tracing::warn!(
                    rule_id = rule.id,
                    error = %fault,
                    "Moderation rule cannot be evaluated, it will be skipped"
                );
                Matcher::Faulty(fault)
            }
        };
        Self { rule, matcher }
    }

    /// Evaluate against already-normalized text.
    pub fn evaluate(&self, normalized: &str) -> Result<bool, RuleFault> {
        match &self.matcher {
            Matcher::Exact(word) => Ok(normalized == word),
            Matcher::Contains(word) => Ok(normalized.contains(word.as_str())),
            Matcher::Regex(re) => Ok(re.is_match(normalized)),
            Matcher::Fuzzy(key) => Ok(fuzzy_key(normalized).contains(key.as_str())),
            Matcher::Faulty(fault) => Err(fault.clone()),
        }
    }

    pub fn is_faulty(&self) -> bool {
        matches!(self.matcher, Matcher::Faulty(_))
    }
}

/// Compile a rule pattern exactly as the engine evaluates it.
pub fn compile_pattern(pattern: &str) -> Result<Regex, regex::Error> {
    RegexBuilder::new(pattern)
        .case_insensitive(true)
        .size_limit(REGEX_SIZE_LIMIT)
        .build()
}

/// Comparison key for a word-based rule. Empty when nothing survives normalization.
pub fn match_key(word: &str, strategy: MatchStrategy) -> String {
    match strategy {
        MatchStrategy::Fuzzy => fuzzy_key(word),
        _ => normalize_text(word),
    }
}

fn build_matcher(rule: &Rule) -> Result<Matcher, RuleFault> {
    match rule.match_type {
        MatchStrategy::Exact => {
            non_empty(rule, match_key(&rule.word, rule.match_type)).map(Matcher::Exact)
        }
        MatchStrategy::Contains => {
            non_empty(rule, match_key(&rule.word, rule.match_type)).map(Matcher::Contains)
        }
        MatchStrategy::Fuzzy => {
            non_empty(rule, match_key(&rule.word, rule.match_type)).map(Matcher::Fuzzy)
        }
        MatchStrategy::Regex => {
            let pattern = rule
                .pattern
                .as_deref()
                .filter(|p| !p.is_empty())
                .ok_or_else(|| RuleFault::MissingPattern {
                    rule_id: rule.id,
                    word: rule.word.clone(),
                })?;

            compile_pattern(pattern)
                .map(Matcher::Regex)
                .map_err(|e| RuleFault::InvalidPattern {
                    rule_id: rule.id,
                    word: rule.word.clone(),
                    reason: e.to_string(),
                })
        }
    }
}

fn non_empty(rule: &Rule, key: String) -> Result<String, RuleFault> {
    if key.is_empty() {
        Err(RuleFault::EmptyWord { rule_id: rule.id })
    } else {
        Ok(key)
    }
}
