//! Text moderation engine.
//!
//! Evaluates post titles, post bodies and comments against the cached rule
//! snapshot and writes one audit record per submission decision.

use std::sync::Arc;

use serde::Serialize;

use super::cache::RuleCache;
use super::errors::ModerationError;
use super::matcher::RuleFault;
use super::models::{
    ContentKind, MatchStrategy, ModerationOutcome, NewAuditRecord, RuleCategory, Severity,
};
use crate::common::utils::{is_blank, normalize_text};
use crate::kernel::BaseAuditLog;

/// Longest comment accepted for moderation
pub const MAX_COMMENT_CHARS: usize = 1000;

/// Body characters kept in an audit snapshot
const AUDIT_BODY_PREVIEW_CHARS: usize = 200;

const UNAVAILABLE_MESSAGE: &str = "内容检测失败，请稍后重试";

/// One rule that matched a checked text.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Violation {
    pub rule_id: i64,
    pub word: String,
    pub category: RuleCategory,
    pub severity: Severity,
    pub match_type: MatchStrategy,
}

/// What the submitter is allowed to see about a violation (no matched word).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PublicViolation {
    pub category: RuleCategory,
    pub severity: Severity,
    pub match_type: MatchStrategy,
}

impl From<&Violation> for PublicViolation {
    fn from(v: &Violation) -> Self {
        Self {
            category: v.category,
            severity: v.severity,
            match_type: v.match_type,
        }
    }
}

/// Result of checking a single text.
#[derive(Debug, Clone, Default)]
pub struct TextCheck {
    pub is_valid: bool,
    pub violations: Vec<Violation>,
    /// Rules skipped because they could not be evaluated
    pub faults: Vec<RuleFault>,
}

impl TextCheck {
    fn clean() -> Self {
        Self {
            is_valid: true,
            ..Default::default()
        }
    }
}

/// Violation detail returned to the submitter on rejection.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ViolationDetails {
    pub title_violations: Vec<PublicViolation>,
    pub content_violations: Vec<PublicViolation>,
    pub violation_category: Option<RuleCategory>,
}

/// Decision for a title + body submission.
#[derive(Debug, Clone)]
pub struct SubmissionVerdict {
    pub accepted: bool,
    pub error_message: Option<String>,
    pub title_violations: Vec<Violation>,
    pub content_violations: Vec<Violation>,
    pub content_kind: ContentKind,
    pub primary_category: Option<RuleCategory>,
    pub outcome: ModerationOutcome,
}

impl SubmissionVerdict {
    pub fn details(&self) -> ViolationDetails {
        ViolationDetails {
            title_violations: self.title_violations.iter().map(Into::into).collect(),
            content_violations: self.content_violations.iter().map(Into::into).collect(),
            violation_category: self.primary_category,
        }
    }
}

/// Decision for a single comment.
#[derive(Debug, Clone)]
pub struct CommentVerdict {
    pub accepted: bool,
    pub error_message: Option<String>,
    pub violations: Vec<Violation>,
    pub primary_category: Option<RuleCategory>,
    pub outcome: ModerationOutcome,
}

impl CommentVerdict {
    pub fn public_violations(&self) -> Vec<PublicViolation> {
        self.violations.iter().map(Into::into).collect()
    }
}

pub struct ModerationEngine {
    cache: Arc<RuleCache>,
    audit: Arc<dyn BaseAuditLog>,
}

impl ModerationEngine {
    pub fn new(cache: Arc<RuleCache>, audit: Arc<dyn BaseAuditLog>) -> Self {
        Self { cache, audit }
    }

    pub fn cache(&self) -> &Arc<RuleCache> {
        &self.cache
    }

    /// Check one text against every active rule.
    ///
    /// Blank text is always valid. Fails only when the rule snapshot cannot be
    /// loaded; individual rule faults are skipped and reported in `faults`.
    pub async fn check_text(
        &self,
        text: &str,
        kind: ContentKind,
    ) -> Result<TextCheck, ModerationError> {
        if is_blank(text) {
            return Ok(TextCheck::clean());
        }

        let snapshot = self.cache.active_rules().await?;
        let normalized = normalize_text(text);

        let mut check = TextCheck::clean();
        for compiled in snapshot.rules() {
            match compiled.evaluate(&normalized) {
                Ok(true) => {
                    let rule = &compiled.rule;
                    check.violations.push(Violation {
                        rule_id: rule.id,
                        word: rule.word.clone(),
                        category: rule.category,
                        severity: rule.severity,
                        match_type: rule.match_type,
                    });
                }
                Ok(false) => {}
                Err(fault) => {
                    tracing::debug!(error = %fault, "Skipping moderation rule");
                    check.faults.push(fault);
                }
            }
        }

        check.is_valid = !check.violations.iter().any(|v| v.severity.is_blocking());

        tracing::debug!(
            kind = %kind,
            rules = snapshot.len(),
            violations = check.violations.len(),
            is_valid = check.is_valid,
            "Text checked"
        );

        Ok(check)
    }

    /// Moderate a post submission. Always writes exactly one audit record.
    ///
    /// A rule store outage fails closed: the submission is blocked.
    pub async fn check_submission(
        &self,
        actor: &str,
        title: &str,
        body: &str,
    ) -> SubmissionVerdict {
        let snapshot_text = submission_snapshot(title, body);

        let checks = match self.check_text(title, ContentKind::Title).await {
            Ok(title_check) => self
                .check_text(body, ContentKind::Content)
                .await
                .map(|body_check| (title_check, body_check)),
            Err(e) => Err(e),
        };

        let (title_check, body_check) = match checks {
            Ok(pair) => pair,
            Err(e) => {
                tracing::error!(error = %e, actor, "Moderation unavailable, blocking submission");
                self.record(
                    actor,
                    ContentKind::Both,
                    snapshot_text,
                    &[],
                    ModerationOutcome::Blocked,
                    Some(RuleCategory::Other),
                )
                .await;
                return SubmissionVerdict {
                    accepted: false,
                    error_message: Some(UNAVAILABLE_MESSAGE.to_string()),
                    title_violations: Vec::new(),
                    content_violations: Vec::new(),
                    content_kind: ContentKind::Both,
                    primary_category: Some(RuleCategory::Other),
                    outcome: ModerationOutcome::Blocked,
                };
            }
        };

        let accepted = title_check.is_valid && body_check.is_valid;
        let content_kind = match (
            title_check.violations.is_empty(),
            body_check.violations.is_empty(),
        ) {
            (false, false) => ContentKind::Both,
            (true, false) => ContentKind::Content,
            _ => ContentKind::Title,
        };

        let all: Vec<Violation> = title_check
            .violations
            .iter()
            .chain(body_check.violations.iter())
            .cloned()
            .collect();
        let primary_category = primary_category(&all);
        let outcome = outcome_for(accepted, &all);

        self.record(actor, content_kind, snapshot_text, &all, outcome, primary_category).await;

        if !accepted {
            tracing::info!(actor, category = ?primary_category, "Submission blocked by moderation");
        }

        SubmissionVerdict {
            accepted,
            error_message: (!accepted).then(|| submission_rejection_message(&all)),
            title_violations: title_check.violations,
            content_violations: body_check.violations,
            content_kind,
            primary_category,
            outcome,
        }
    }

    /// Moderate a comment. Blank or oversized comments are validation errors.
    pub async fn check_comment(
        &self,
        actor: &str,
        text: &str,
    ) -> Result<CommentVerdict, ModerationError> {
        let text = text.trim();
        if is_blank(text) {
            return Err(ModerationError::Validation("评论内容不能为空".to_string()));
        }
        if text.chars().count() > MAX_COMMENT_CHARS {
            return Err(ModerationError::Validation(format!(
                "评论内容不能超过{}个字符",
                MAX_COMMENT_CHARS
            )));
        }

        let snapshot_text = preview(text, AUDIT_BODY_PREVIEW_CHARS);
        let check = match self.check_text(text, ContentKind::Content).await {
            Ok(check) => check,
            Err(e) => {
                tracing::error!(error = %e, actor, "Moderation unavailable, blocking comment");
                self.record(
                    actor,
                    ContentKind::Content,
                    snapshot_text,
                    &[],
                    ModerationOutcome::Blocked,
                    Some(RuleCategory::Other),
                )
                .await;
                return Ok(CommentVerdict {
                    accepted: false,
                    error_message: Some(UNAVAILABLE_MESSAGE.to_string()),
                    violations: Vec::new(),
                    primary_category: Some(RuleCategory::Other),
                    outcome: ModerationOutcome::Blocked,
                });
            }
        };

        let primary_category = primary_category(&check.violations);
        let outcome = outcome_for(check.is_valid, &check.violations);
        self.record(
            actor,
            ContentKind::Content,
            snapshot_text,
            &check.violations,
            outcome,
            primary_category,
        )
        .await;

        Ok(CommentVerdict {
            accepted: check.is_valid,
            error_message: (!check.is_valid).then(|| comment_rejection_message(&check.violations)),
            violations: check.violations,
            primary_category,
            outcome,
        })
    }

    /// Best-effort audit write; failures are logged and swallowed.
    async fn record(
        &self,
        actor: &str,
        content_kind: ContentKind,
        original_content: String,
        violations: &[Violation],
        outcome: ModerationOutcome,
        violation_category: Option<RuleCategory>,
    ) {
        let detected_words = serde_json::to_value(violations).unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Failed to serialize violations for audit");
            serde_json::Value::Array(Vec::new())
        });

        let record = NewAuditRecord {
            actor: actor.to_string(),
            content_kind,
            original_content,
            detected_words,
            outcome,
            violation_category,
        };

        if let Err(e) = self.audit.append(record).await {
            tracing::error!(error = %e, actor, "Failed to write moderation audit record");
        }
    }
}

/// Category of the most severe violation; the earliest one wins ties.
pub fn primary_category(violations: &[Violation]) -> Option<RuleCategory> {
    let mut best: Option<&Violation> = None;
    for v in violations {
        if best.map_or(true, |b| v.severity > b.severity) {
            best = Some(v);
        }
    }
    best.map(|v| v.category)
}

/// Distinct violated categories in first-seen order.
pub fn distinct_categories(violations: &[Violation]) -> Vec<RuleCategory> {
    let mut seen = Vec::new();
    for v in violations {
        if !seen.contains(&v.category) {
            seen.push(v.category);
        }
    }
    seen
}

fn outcome_for(accepted: bool, violations: &[Violation]) -> ModerationOutcome {
    if !accepted {
        ModerationOutcome::Blocked
    } else if violations.is_empty() {
        ModerationOutcome::Approved
    } else {
        ModerationOutcome::Warning
    }
}

fn category_phrases(violations: &[Violation]) -> Vec<String> {
    distinct_categories(violations)
        .into_iter()
        .map(|c| format!("检测到{}相关内容", c.display_name()))
        .collect()
}

/// Rejection text for posts. Names categories, never matched words.
pub fn submission_rejection_message(violations: &[Violation]) -> String {
    if violations.is_empty() {
        return UNAVAILABLE_MESSAGE.to_string();
    }
    format!(
        "发布失败：{}。请修改后重新发布。",
        category_phrases(violations).join(", ")
    )
}

fn comment_rejection_message(violations: &[Violation]) -> String {
    format!(
        "评论内容包含违规内容：{}",
        category_phrases(violations).join(", ")
    )
}

fn submission_snapshot(title: &str, body: &str) -> String {
    format!(
        "标题: {}\n内容: {}",
        title,
        preview(body, AUDIT_BODY_PREVIEW_CHARS)
    )
}

fn preview(text: &str, max_chars: usize) -> String {
    let mut chars = text.chars();
    let head: String = chars.by_ref().take(max_chars).collect();
    if chars.next().is_some() {
        format!("{}...", head)
    } else {
        head
    }
}
