use thiserror::Error;

/// Errors surfaced by the moderation domain
#[derive(Error, Debug)]
pub enum ModerationError {
    /// Input rejected before any rule is evaluated
    #[error("Validation error: {0}")]
    Validation(String),

    /// Rule store unreachable while (re)loading the rule snapshot
    #[error("Rule store unavailable: {0}")]
    RuleStore(#[source] anyhow::Error),

    #[error("Rule not found: {0}")]
    RuleNotFound(i64),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}
