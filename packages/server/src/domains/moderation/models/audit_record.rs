use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use super::rule::RuleCategory;

/// Which part of a submission carried violations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "content_kind", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ContentKind {
    Title,
    Content,
    Both,
}

impl std::fmt::Display for ContentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ContentKind::Title => write!(f, "title"),
            ContentKind::Content => write!(f, "content"),
            ContentKind::Both => write!(f, "both"),
        }
    }
}

/// Outcome recorded for a moderation decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "moderation_outcome", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ModerationOutcome {
    Approved,
    Blocked,
    Warning,
}

impl std::fmt::Display for ModerationOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ModerationOutcome::Approved => write!(f, "approved"),
            ModerationOutcome::Blocked => write!(f, "blocked"),
            ModerationOutcome::Warning => write!(f, "warning"),
        }
    }
}

impl std::str::FromStr for ModerationOutcome {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "approved" => Ok(ModerationOutcome::Approved),
            "blocked" => Ok(ModerationOutcome::Blocked),
            "warning" => Ok(ModerationOutcome::Warning),
            _ => Err(anyhow::anyhow!("Invalid moderation outcome: {}", s)),
        }
    }
}

/// AuditRecord - immutable log row, one per moderation decision
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct AuditRecord {
    pub id: Uuid,
    pub actor: String,
    pub content_kind: ContentKind,
    pub original_content: String,
    /// JSON array of violations as seen by the engine
    pub detected_words: serde_json::Value,
    pub outcome: ModerationOutcome,
    pub violation_category: Option<RuleCategory>,
    pub created_at: DateTime<Utc>,
}

/// Fields supplied by the engine; id and timestamp are assigned on append.
#[derive(Debug, Clone, Serialize)]
pub struct NewAuditRecord {
    pub actor: String,
    pub content_kind: ContentKind,
    pub original_content: String,
    pub detected_words: serde_json::Value,
    pub outcome: ModerationOutcome,
    pub violation_category: Option<RuleCategory>,
}

impl NewAuditRecord {
    /// Materialize the record with a fresh time-ordered id.
    pub fn into_record(self) -> AuditRecord {
        AuditRecord {
            id: Uuid::now_v7(),
            actor: self.actor,
            content_kind: self.content_kind,
            original_content: self.original_content,
            detected_words: self.detected_words,
            outcome: self.outcome,
            violation_category: self.violation_category,
            created_at: Utc::now(),
        }
    }
}

// =============================================================================
// Audit Queries (insert + read only, rows are never updated)
// =============================================================================

impl AuditRecord {
    pub async fn insert(record: &AuditRecord, pool: &PgPool) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO moderation_audit_log
                (id, actor, content_kind, original_content, detected_words,
                 outcome, violation_category, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(record.id)
        .bind(&record.actor)
        .bind(record.content_kind)
        .bind(&record.original_content)
        .bind(&record.detected_words)
        .bind(record.outcome)
        .bind(record.violation_category)
        .bind(record.created_at)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Most recent decisions first
    pub async fn find_recent(limit: i64, pool: &PgPool) -> Result<Vec<Self>> {
        let records = sqlx::query_as::<_, AuditRecord>(
            "SELECT * FROM moderation_audit_log ORDER BY created_at DESC LIMIT $1",
        )
        .bind(limit)
        .fetch_all(pool)
        .await?;
        Ok(records)
    }

    pub async fn find_by_outcome(
        outcome: ModerationOutcome,
        limit: i64,
        pool: &PgPool,
    ) -> Result<Vec<Self>> {
        let records = sqlx::query_as::<_, AuditRecord>(
            r#"
            SELECT * FROM moderation_audit_log
            WHERE outcome = $1
            ORDER BY created_at DESC
            LIMIT $2
            "#,
        )
        .bind(outcome)
        .bind(limit)
        .fetch_all(pool)
        .await?;
        Ok(records)
    }
}
