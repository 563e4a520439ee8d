use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

use crate::domains::moderation::matcher::{compile_pattern, match_key};

// ============================================================================
// Enums
// ============================================================================

/// What kind of content a rule targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type, Default)]
#[sqlx(type_name = "rule_category", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum RuleCategory {
    Political,
    Adult,
    Violence,
    Advertisement,
    Abuse,
    #[default]
    Other,
}

impl RuleCategory {
    /// Stable user-facing name shown in rejection messages.
    pub fn display_name(&self) -> &'static str {
        match self {
            RuleCategory::Political => "政治敏感",
            RuleCategory::Adult => "成人内容",
            RuleCategory::Violence => "暴力血腥",
            RuleCategory::Advertisement => "广告推广",
            RuleCategory::Abuse => "恶意谩骂",
            RuleCategory::Other => "违规内容",
        }
    }
}

impl std::fmt::Display for RuleCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RuleCategory::Political => write!(f, "political"),
            RuleCategory::Adult => write!(f, "adult"),
            RuleCategory::Violence => write!(f, "violence"),
            RuleCategory::Advertisement => write!(f, "advertisement"),
            RuleCategory::Abuse => write!(f, "abuse"),
            RuleCategory::Other => write!(f, "other"),
        }
    }
}

impl std::str::FromStr for RuleCategory {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "political" => Ok(RuleCategory::Political),
            "adult" => Ok(RuleCategory::Adult),
            "violence" => Ok(RuleCategory::Violence),
            "advertisement" => Ok(RuleCategory::Advertisement),
            "abuse" => Ok(RuleCategory::Abuse),
            "other" => Ok(RuleCategory::Other),
            _ => Err(anyhow::anyhow!("Invalid rule category: {}", s)),
        }
    }
}

/// How a rule's word or pattern is compared against text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type, Default)]
#[sqlx(type_name = "match_strategy", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum MatchStrategy {
    Exact,
    #[default]
    Contains,
    Regex,
    Fuzzy,
}

impl std::fmt::Display for MatchStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MatchStrategy::Exact => write!(f, "exact"),
            MatchStrategy::Contains => write!(f, "contains"),
            MatchStrategy::Regex => write!(f, "regex"),
            MatchStrategy::Fuzzy => write!(f, "fuzzy"),
        }
    }
}

impl std::str::FromStr for MatchStrategy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "exact" => Ok(MatchStrategy::Exact),
            "contains" => Ok(MatchStrategy::Contains),
            "regex" => Ok(MatchStrategy::Regex),
            "fuzzy" => Ok(MatchStrategy::Fuzzy),
            _ => Err(anyhow::anyhow!("Invalid match strategy: {}", s)),
        }
    }
}

/// Rule severity: 1 warns, 2 rejects, 3 is severe.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, sqlx::Type,
)]
#[sqlx(transparent)]
#[serde(try_from = "i16", into = "i16")]
pub struct Severity(i16);

impl Severity {
    pub const WARN: Severity = Severity(1);
    pub const REJECT: Severity = Severity(2);
    pub const SEVERE: Severity = Severity(3);

    /// Severity 1 is advisory; anything at or above 2 blocks content.
    pub fn is_blocking(&self) -> bool {
        *self >= Severity::REJECT
    }

    pub fn as_i16(&self) -> i16 {
        self.0
    }
}

impl Default for Severity {
    fn default() -> Self {
        Severity::REJECT
    }
}

impl TryFrom<i16> for Severity {
    type Error = anyhow::Error;

    fn try_from(value: i16) -> Result<Self> {
        match value {
            1..=3 => Ok(Severity(value)),
            _ => Err(anyhow::anyhow!(
                "Invalid severity {}: expected 1 (warn), 2 (reject) or 3 (severe)",
                value
            )),
        }
    }
}

impl From<Severity> for i16 {
    fn from(severity: Severity) -> Self {
        severity.0
    }
}

// ============================================================================
// Rule Model
// ============================================================================

/// A single moderation criterion.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Rule {
    pub id: i64,
    pub word: String,
    /// Regular expression, only meaningful for `MatchStrategy::Regex`
    pub pattern: Option<String>,
    pub category: RuleCategory,
    pub severity: Severity,
    pub match_type: MatchStrategy,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for creating or replacing a rule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleInput {
    pub word: String,
    #[serde(default)]
    pub pattern: Option<String>,
    #[serde(default)]
    pub category: RuleCategory,
    #[serde(default)]
    pub severity: Severity,
    #[serde(default)]
    pub match_type: MatchStrategy,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_active() -> bool {
    true
}

/// How an upsert treats the active flag of a rule that already exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UpsertMode {
    /// Keep the stored flag so rules an admin disabled stay disabled
    #[default]
    PreserveActive,
    /// Take the flag from the input (seeding the built-in list)
    ResetActive,
}

impl RuleInput {
    /// Check the invariants a rule must satisfy before it is stored.
    pub fn validate(&self) -> Result<()> {
        if self.word.trim().is_empty() {
            anyhow::bail!("Rule word must not be empty");
        }
        if self.match_type == MatchStrategy::Regex {
            let pattern = self
                .pattern
                .as_deref()
                .filter(|p| !p.trim().is_empty())
                .ok_or_else(|| anyhow::anyhow!("Regex rule '{}' requires a pattern", self.word))?;
            compile_pattern(pattern).map_err(|e| {
                anyhow::anyhow!("Regex rule '{}' has invalid pattern: {}", self.word, e)
            })?;
        } else if match_key(&self.word, self.match_type).is_empty() {
            anyhow::bail!(
                "Rule word '{}' has nothing left to match after normalization",
                self.word
            );
        }
        Ok(())
    }

    /// Trim the word and drop blank patterns.
    pub fn normalized(mut self) -> Self {
        self.word = self.word.trim().to_string();
        self.pattern = self.pattern.filter(|p| !p.trim().is_empty());
        self
    }
}

// =============================================================================
// Rule Queries
// =============================================================================

impl Rule {
    /// All rules the engine should evaluate
    pub async fn find_active(pool: &PgPool) -> Result<Vec<Self>> {
        let rules = sqlx::query_as::<_, Rule>(
            "SELECT * FROM moderation_rules WHERE is_active = TRUE ORDER BY id",
        )
        .fetch_all(pool)
        .await?;
        Ok(rules)
    }

    /// All rules including disabled ones (admin listing)
    pub async fn find_all(pool: &PgPool) -> Result<Vec<Self>> {
        let rules = sqlx::query_as::<_, Rule>("SELECT * FROM moderation_rules ORDER BY id")
            .fetch_all(pool)
            .await?;
        Ok(rules)
    }

    pub async fn create(input: &RuleInput, pool: &PgPool) -> Result<Self> {
        let rule = sqlx::query_as::<_, Rule>(
            r#"
            INSERT INTO moderation_rules (word, pattern, category, severity, match_type, is_active)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(&input.word)
        .bind(&input.pattern)
        .bind(input.category)
        .bind(input.severity)
        .bind(input.match_type)
        .bind(input.is_active)
        .fetch_one(pool)
        .await?;
        Ok(rule)
    }

    pub async fn update(id: i64, input: &RuleInput, pool: &PgPool) -> Result<Option<Self>> {
        let rule = sqlx::query_as::<_, Rule>(
            r#"
            UPDATE moderation_rules
            SET word = $2,
                pattern = $3,
                category = $4,
                severity = $5,
                match_type = $6,
                is_active = $7,
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&input.word)
        .bind(&input.pattern)
        .bind(input.category)
        .bind(input.severity)
        .bind(input.match_type)
        .bind(input.is_active)
        .fetch_optional(pool)
        .await?;
        Ok(rule)
    }

    /// Insert a rule or overwrite the existing rule with the same word.
    ///
    /// The active flag of an existing rule only changes under
    /// `UpsertMode::ResetActive`. Returns the stored rule and whether it was
    /// newly created.
    pub async fn upsert_by_word(
        input: &RuleInput,
        mode: UpsertMode,
        pool: &PgPool,
    ) -> Result<(Self, bool)> {
        let row = sqlx::query_as::<_, (i64, bool)>(
            r#"
            INSERT INTO moderation_rules (word, pattern, category, severity, match_type, is_active)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (word) DO UPDATE
            SET pattern = EXCLUDED.pattern,
                category = EXCLUDED.category,
                severity = EXCLUDED.severity,
                match_type = EXCLUDED.match_type,
                is_active = CASE WHEN $7 THEN EXCLUDED.is_active
                                 ELSE moderation_rules.is_active END,
                updated_at = NOW()
            RETURNING id, (xmax = 0) AS inserted
            "#,
        )
        .bind(&input.word)
        .bind(&input.pattern)
        .bind(input.category)
        .bind(input.severity)
        .bind(input.match_type)
        .bind(input.is_active)
        .bind(mode == UpsertMode::ResetActive)
        .fetch_one(pool)
        .await?;

        let rule = sqlx::query_as::<_, Rule>("SELECT * FROM moderation_rules WHERE id = $1")
            .bind(row.0)
            .fetch_one(pool)
            .await?;
        Ok((rule, row.1))
    }

    /// Enable or disable a batch of rules. Returns number of rows changed.
    pub async fn set_active(ids: &[i64], active: bool, pool: &PgPool) -> Result<u64> {
        let result = sqlx::query(
            r#"
            UPDATE moderation_rules
            SET is_active = $2, updated_at = NOW()
            WHERE id = ANY($1)
            "#,
        )
        .bind(ids)
        .bind(active)
        .execute(pool)
        .await?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(word: &str, match_type: MatchStrategy, pattern: Option<&str>) -> RuleInput {
        RuleInput {
            word: word.to_string(),
            pattern: pattern.map(str::to_string),
            category: RuleCategory::Other,
            severity: Severity::REJECT,
            match_type,
            is_active: true,
        }
    }

    #[test]
    fn test_severity_bounds() {
        assert!(Severity::try_from(0).is_err());
        assert!(Severity::try_from(4).is_err());
        assert!(!Severity::WARN.is_blocking());
        assert!(Severity::REJECT.is_blocking());
        assert!(Severity::SEVERE.is_blocking());
    }

    #[test]
    fn test_severity_deserializes_from_integer() {
        let severity: Severity = serde_json::from_str("3").unwrap();
        assert_eq!(severity, Severity::SEVERE);
        assert!(serde_json::from_str::<Severity>("9").is_err());
    }

    #[test]
    fn test_regex_rule_requires_pattern() {
        assert!(input("qq广告", MatchStrategy::Regex, None).validate().is_err());
        assert!(input("qq广告", MatchStrategy::Regex, Some("  ")).validate().is_err());
        assert!(input("qq广告", MatchStrategy::Regex, Some(r"qq.*\d{5,}"))
            .validate()
            .is_ok());
    }

    #[test]
    fn test_regex_rule_rejects_malformed_pattern() {
        assert!(input("bad", MatchStrategy::Regex, Some("(unclosed"))
            .validate()
            .is_err());
    }

    #[test]
    fn test_blank_word_rejected() {
        assert!(input("   ", MatchStrategy::Contains, None).validate().is_err());
    }

    #[test]
    fn test_punctuation_only_word_rejected() {
        assert!(input("!!!", MatchStrategy::Contains, None).validate().is_err());
        assert!(input("-- --", MatchStrategy::Fuzzy, None).validate().is_err());
        assert!(input("广告!", MatchStrategy::Exact, None).validate().is_ok());
    }

    #[test]
    fn test_pattern_over_size_limit_rejected() {
        // Valid syntax, but compiles past the engine's size limit
        assert!(input("big", MatchStrategy::Regex, Some(r"\w{1000}\w{1000}\w{1000}"))
            .validate()
            .is_err());
    }

    #[test]
    fn test_rule_input_defaults() {
        let parsed: RuleInput = serde_json::from_str(r#"{"word": "加群"}"#).unwrap();
        assert_eq!(parsed.category, RuleCategory::Other);
        assert_eq!(parsed.severity, Severity::REJECT);
        assert_eq!(parsed.match_type, MatchStrategy::Contains);
        assert!(parsed.is_active);
    }

    #[test]
    fn test_category_round_trips_through_str() {
        for category in [
            RuleCategory::Political,
            RuleCategory::Adult,
            RuleCategory::Violence,
            RuleCategory::Advertisement,
            RuleCategory::Abuse,
            RuleCategory::Other,
        ] {
            let parsed: RuleCategory = category.to_string().parse().unwrap();
            assert_eq!(parsed, category);
        }
    }
}
