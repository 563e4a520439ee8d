// Common test utilities
#![allow(dead_code)]

pub mod harness;
pub mod http;

pub use harness::*;
pub use http::*;

use campus_core::domains::moderation::models::{
    MatchStrategy, RuleCategory, RuleInput, Severity,
};

/// Active rule with no pattern
pub fn rule(
    word: &str,
    category: RuleCategory,
    severity: Severity,
    match_type: MatchStrategy,
) -> RuleInput {
    RuleInput {
        word: word.to_string(),
        pattern: None,
        category,
        severity,
        match_type,
        is_active: true,
    }
}
