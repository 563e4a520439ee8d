//! Postgres-backed store implementations.
//!
//! Thin adapters from the kernel traits onto the model query functions.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use super::{BaseAuditLog, BaseMessageStore, BaseRuleStore};
use crate::domains::chat::models::ChatMessage;
use crate::domains::moderation::models::{
    AuditRecord, ModerationOutcome, NewAuditRecord, Rule, RuleInput, UpsertMode,
};

// =============================================================================
// Rule Store
// =============================================================================

#[derive(Clone)]
pub struct PgRuleStore {
    pool: PgPool,
}

impl PgRuleStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl BaseRuleStore for PgRuleStore {
    async fn list_active_rules(&self) -> Result<Vec<Rule>> {
        Rule::find_active(&self.pool)
            .await
            .context("Failed to load active moderation rules")
    }

    async fn list_rules(&self) -> Result<Vec<Rule>> {
        Rule::find_all(&self.pool).await
    }

    async fn create_rule(&self, input: RuleInput) -> Result<Rule> {
        Rule::create(&input, &self.pool)
            .await
            .with_context(|| format!("Failed to create rule '{}'", input.word))
    }

    async fn update_rule(&self, id: i64, input: RuleInput) -> Result<Option<Rule>> {
        Rule::update(id, &input, &self.pool).await
    }

    async fn upsert_rule(&self, input: RuleInput, mode: UpsertMode) -> Result<(Rule, bool)> {
        Rule::upsert_by_word(&input, mode, &self.pool).await
    }

    async fn set_rules_active(&self, ids: &[i64], active: bool) -> Result<u64> {
        Rule::set_active(ids, active, &self.pool).await
    }
}

// =============================================================================
// Audit Log
// =============================================================================

#[derive(Clone)]
pub struct PgAuditLog {
    pool: PgPool,
}

impl PgAuditLog {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl BaseAuditLog for PgAuditLog {
    async fn append(&self, record: NewAuditRecord) -> Result<AuditRecord> {
        let record = record.into_record();
        AuditRecord::insert(&record, &self.pool)
            .await
            .context("Failed to write moderation audit record")?;
        Ok(record)
    }

    async fn list_recent(
        &self,
        outcome: Option<ModerationOutcome>,
        limit: i64,
    ) -> Result<Vec<AuditRecord>> {
        match outcome {
            Some(outcome) => AuditRecord::find_by_outcome(outcome, limit, &self.pool).await,
            None => AuditRecord::find_recent(limit, &self.pool).await,
        }
    }
}

// =============================================================================
// Message Store
// =============================================================================

#[derive(Clone)]
pub struct PgMessageStore {
    pool: PgPool,
}

impl PgMessageStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl BaseMessageStore for PgMessageStore {
    async fn append(
        &self,
        room: &str,
        sender: &str,
        body: &str,
        timestamp: DateTime<Utc>,
    ) -> Result<i64> {
        ChatMessage::create(room, sender, body, timestamp, &self.pool)
            .await
            .with_context(|| format!("Failed to store chat message for room {}", room))
    }

    async fn list_history(&self, room: &str, limit: i64, offset: i64) -> Result<Vec<ChatMessage>> {
        ChatMessage::find_page(room, limit, offset, &self.pool).await
    }

    async fn delete_all(&self, room: &str) -> Result<u64> {
        ChatMessage::delete_for_room(room, &self.pool).await
    }

    async fn delete_by_sender(&self, room: &str, sender: &str) -> Result<u64> {
        ChatMessage::delete_by_sender(room, sender, &self.pool).await
    }
}
