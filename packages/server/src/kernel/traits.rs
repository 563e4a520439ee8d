// Trait definitions for dependency injection
//
// These are INFRASTRUCTURE traits only - no business logic.
// Moderation and chat logic live in domains/ and talk to storage through these.
//
// Naming convention: Base* for trait names (e.g., BaseRuleStore, BaseMessageStore)

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domains::chat::models::ChatMessage;
use crate::domains::moderation::models::{
    AuditRecord, ModerationOutcome, NewAuditRecord, Rule, RuleInput, UpsertMode,
};

// =============================================================================
// Rule Store Trait (Infrastructure - moderation rule table)
// =============================================================================

#[async_trait]
pub trait BaseRuleStore: Send + Sync {
    /// Every rule with the active flag set
    async fn list_active_rules(&self) -> Result<Vec<Rule>>;

    /// Every rule, active or not (admin listing)
    async fn list_rules(&self) -> Result<Vec<Rule>>;

    async fn create_rule(&self, input: RuleInput) -> Result<Rule>;

    /// Replace a rule's fields. Returns None when the id is unknown.
    async fn update_rule(&self, id: i64, input: RuleInput) -> Result<Option<Rule>>;

    /// Insert or overwrite by word. `mode` decides whether an existing rule's
    /// active flag is replaced. Returns (rule, created).
    async fn upsert_rule(&self, input: RuleInput, mode: UpsertMode) -> Result<(Rule, bool)>;

    /// Bulk enable/disable. Returns number of rules changed.
    async fn set_rules_active(&self, ids: &[i64], active: bool) -> Result<u64>;
}

// =============================================================================
// Audit Log Trait (Infrastructure - append-only)
// =============================================================================

#[async_trait]
pub trait BaseAuditLog: Send + Sync {
    async fn append(&self, record: NewAuditRecord) -> Result<AuditRecord>;

    /// Newest first, optionally filtered by outcome
    async fn list_recent(
        &self,
        outcome: Option<ModerationOutcome>,
        limit: i64,
    ) -> Result<Vec<AuditRecord>>;
}

// =============================================================================
// Message Store Trait (Infrastructure - chat history)
// =============================================================================

#[async_trait]
pub trait BaseMessageStore: Send + Sync {
    /// Persist one message and return its sequence id
    async fn append(
        &self,
        room: &str,
        sender: &str,
        body: &str,
        timestamp: DateTime<Utc>,
    ) -> Result<i64>;

    /// One page of history, oldest first within the page.
    ///
    /// `offset` counts back from the newest message, so offset 0 is the
    /// latest page.
    async fn list_history(&self, room: &str, limit: i64, offset: i64) -> Result<Vec<ChatMessage>>;

    async fn delete_all(&self, room: &str) -> Result<u64>;

    async fn delete_by_sender(&self, room: &str, sender: &str) -> Result<u64>;
}
