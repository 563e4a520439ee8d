//! Moderation engine behavior over in-memory stores.

mod common;

use campus_core::common::utils::normalize_text;
use campus_core::domains::moderation::defaults::default_rules;
use campus_core::domains::moderation::models::{
    ContentKind, MatchStrategy, ModerationOutcome, RuleCategory, Severity,
};
use campus_core::kernel::TestDependencies;
use common::rule;
use tokio_test::assert_ok;

#[tokio::test]
async fn exact_rule_does_not_flag_longer_word() {
    let stores = TestDependencies::with_rules(vec![rule(
        "垃圾",
        RuleCategory::Abuse,
        Severity::REJECT,
        MatchStrategy::Exact,
    )]);
    let deps = stores.server_deps();

    let check = assert_ok!(deps.moderation.check_text("垃圾分类", ContentKind::Content).await);
    assert!(check.is_valid);
    assert!(check.violations.is_empty());

    let check = assert_ok!(deps.moderation.check_text("垃圾", ContentKind::Content).await);
    assert!(!check.is_valid);
}

#[tokio::test]
async fn contains_rule_flags_longer_word() {
    let stores = TestDependencies::with_rules(vec![rule(
        "垃圾",
        RuleCategory::Abuse,
        Severity::REJECT,
        MatchStrategy::Contains,
    )]);
    let deps = stores.server_deps();

    let check = assert_ok!(deps.moderation.check_text("垃圾分类", ContentKind::Content).await);
    assert!(!check.is_valid);
    assert_eq!(check.violations.len(), 1);
}

#[tokio::test]
async fn fuzzy_rule_sees_through_separators() {
    let stores = TestDependencies::with_rules(vec![rule(
        "广告",
        RuleCategory::Advertisement,
        Severity::REJECT,
        MatchStrategy::Fuzzy,
    )]);
    let deps = stores.server_deps();

    for text in ["广 告", "广-告", "这是广告"] {
        let check = assert_ok!(deps.moderation.check_text(text, ContentKind::Content).await);
        assert!(!check.is_valid, "{} should be flagged", text);
    }
}

#[tokio::test]
async fn severity_boundary() {
    let stores = TestDependencies::with_rules(vec![
        rule("笨蛋", RuleCategory::Abuse, Severity::WARN, MatchStrategy::Contains),
        rule("刷单", RuleCategory::Other, Severity::REJECT, MatchStrategy::Contains),
    ]);
    let deps = stores.server_deps();

    let warn_only = assert_ok!(deps.moderation.check_text("你是笨蛋", ContentKind::Content).await);
    assert!(warn_only.is_valid);
    assert_eq!(warn_only.violations.len(), 1);

    let blocking = assert_ok!(deps.moderation.check_text("笨蛋刷单", ContentKind::Content).await);
    assert!(!blocking.is_valid);
    assert_eq!(blocking.violations.len(), 2);
}

#[tokio::test]
async fn check_text_is_deterministic() {
    let stores = TestDependencies::with_rules(default_rules());
    let deps = stores.server_deps();
    let text = "加我微信 123456 代写论文, 不是广-告";

    let first = assert_ok!(deps.moderation.check_text(text, ContentKind::Content).await);
    let second = assert_ok!(deps.moderation.check_text(text, ContentKind::Content).await);

    assert_eq!(first.is_valid, second.is_valid);
    assert_eq!(first.violations, second.violations);
}

#[test]
fn normalization_is_idempotent() {
    for text in ["  Hello,  World! ", "a - b", "广 - 告。。", "QQ：12345 加群"] {
        let once = normalize_text(text);
        assert_eq!(normalize_text(&once), once, "input {:?}", text);
    }
}

#[tokio::test]
async fn cache_reads_store_once_per_window() {
    let stores = TestDependencies::with_rules(default_rules());
    let deps = stores.server_deps();

    assert_ok!(deps.moderation.check_text("第一条", ContentKind::Content).await);
    assert_ok!(deps.moderation.check_text("第二条", ContentKind::Content).await);
    assert_eq!(stores.rule_store.list_calls(), 1);

    deps.rule_cache.invalidate();
    assert_ok!(deps.moderation.check_text("第三条", ContentKind::Content).await);
    assert_ok!(deps.moderation.check_text("第四条", ContentKind::Content).await);
    assert_eq!(stores.rule_store.list_calls(), 2);
}

#[tokio::test]
async fn advertisement_title_is_blocked_and_audited() {
    let stores = TestDependencies::with_rules(default_rules());
    let deps = stores.server_deps();

    let verdict = deps
        .moderation
        .check_submission("student_1", "加群 代写", "正文内容")
        .await;

    assert!(!verdict.accepted);
    let message = verdict.error_message.clone().unwrap_or_default();
    assert!(message.contains("广告推广"), "message was {}", message);
    assert!(!message.contains("加群"));
    assert!(!message.contains("代写"));
    assert_eq!(verdict.content_kind, ContentKind::Title);
    assert_eq!(verdict.primary_category, Some(RuleCategory::Advertisement));

    let records = stores.audit_log.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].outcome, ModerationOutcome::Blocked);
    assert_eq!(records[0].actor, "student_1");
    assert_eq!(records[0].content_kind, ContentKind::Title);
}

#[tokio::test]
async fn clean_submission_is_approved_and_audited() {
    let stores = TestDependencies::with_rules(default_rules());
    let deps = stores.server_deps();

    let verdict = deps
        .moderation
        .check_submission("student_2", "周末图书馆自习", "有人一起吗")
        .await;

    assert!(verdict.accepted);
    assert!(verdict.error_message.is_none());
    let records = stores.audit_log.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].outcome, ModerationOutcome::Approved);
}

#[tokio::test]
async fn rule_store_outage_fails_closed() {
    let stores = TestDependencies::with_rules(default_rules());
    stores.rule_store.set_unavailable(true);
    let deps = stores.server_deps();

    let verdict = deps
        .moderation
        .check_submission("student_3", "周末图书馆自习", "有人一起吗")
        .await;

    assert!(!verdict.accepted);
    assert_eq!(verdict.outcome, ModerationOutcome::Blocked);
    assert_eq!(
        stores.audit_log.records()[0].violation_category,
        Some(RuleCategory::Other)
    );
}

#[tokio::test]
async fn disabling_a_rule_takes_effect_immediately() {
    let stores = TestDependencies::with_rules(default_rules());
    let deps = stores.server_deps();

    let before = assert_ok!(deps.moderation.check_text("专业代写", ContentKind::Content).await);
    assert!(!before.is_valid);

    let id = stores
        .rule_store
        .rules()
        .iter()
        .find(|r| r.word == "代写")
        .map(|r| r.id)
        .expect("seeded rule");
    assert_ok!(deps.rule_admin.set_active(&[id], false).await);

    let after = assert_ok!(deps.moderation.check_text("专业代写", ContentKind::Content).await);
    assert!(after.is_valid);
}
