//! Text moderation: rule models, the rule cache, the engine and rule admin.

pub mod admin;
pub mod cache;
pub mod defaults;
pub mod engine;
pub mod errors;
pub mod matcher;
pub mod models;
pub mod rule_file;

pub use admin::{ImportSummary, RuleAdmin};
pub use cache::{RuleCache, RuleSnapshot};
pub use engine::{
    CommentVerdict, ModerationEngine, PublicViolation, SubmissionVerdict, TextCheck, Violation,
    ViolationDetails,
};
pub use errors::ModerationError;
pub use matcher::{CompiledRule, RuleFault};
pub use rule_file::{parse_rule_file, ParsedRules, RuleFileFormat};
