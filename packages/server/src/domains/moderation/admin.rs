//! Rule administration surface.
//!
//! The engine itself never mutates rules. Every mutation goes through
//! `RuleAdmin`, which invalidates the rule cache once the store accepts it.

use std::sync::Arc;

use serde::Serialize;

use super::cache::RuleCache;
use super::errors::ModerationError;
use super::models::{Rule, RuleInput, UpsertMode};
use crate::kernel::BaseRuleStore;

/// Counts reported after a bulk import
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImportSummary {
    pub created: usize,
    pub updated: usize,
    pub errors: Vec<String>,
    /// Active rules after the cache was refreshed
    pub active_total: usize,
}

impl ImportSummary {
    /// Fold a later import into this one. The later active total wins.
    pub fn merge(&mut self, later: ImportSummary) {
        self.created += later.created;
        self.updated += later.updated;
        self.errors.extend(later.errors);
        self.active_total = later.active_total;
    }
}

pub struct RuleAdmin {
    store: Arc<dyn BaseRuleStore>,
    cache: Arc<RuleCache>,
}

impl RuleAdmin {
    pub fn new(store: Arc<dyn BaseRuleStore>, cache: Arc<RuleCache>) -> Self {
        Self { store, cache }
    }

    pub async fn list_rules(&self) -> Result<Vec<Rule>, ModerationError> {
        Ok(self.store.list_rules().await?)
    }

    pub async fn create_rule(&self, input: RuleInput) -> Result<Rule, ModerationError> {
        let input = validated(input)?;
        let rule = self.store.create_rule(input).await?;
        self.cache.invalidate();
        tracing::info!(rule_id = rule.id, word = %rule.word, "Moderation rule created");
        Ok(rule)
    }

    pub async fn update_rule(&self, id: i64, input: RuleInput) -> Result<Rule, ModerationError> {
        let input = validated(input)?;
        let rule = self
            .store
            .update_rule(id, input)
            .await?
            .ok_or(ModerationError::RuleNotFound(id))?;
        self.cache.invalidate();
        tracing::info!(rule_id = id, "Moderation rule updated");
        Ok(rule)
    }

    /// Enable or disable many rules at once
    pub async fn set_active(&self, ids: &[i64], active: bool) -> Result<u64, ModerationError> {
        if ids.is_empty() {
            return Ok(0);
        }
        let changed = self.store.set_rules_active(ids, active).await?;
        self.cache.invalidate();
        tracing::info!(changed, active, "Moderation rules toggled");
        Ok(changed)
    }

    /// Upsert rules by word, then reload the cache eagerly.
    ///
    /// Invalid entries are reported in `errors` and do not stop the import.
    /// With `UpsertMode::PreserveActive` a rule an admin disabled stays disabled.
    pub async fn import_rules(
        &self,
        inputs: Vec<RuleInput>,
        mode: UpsertMode,
    ) -> Result<ImportSummary, ModerationError> {
        let mut summary = ImportSummary::default();

        for input in inputs {
            let input = match validated(input) {
                Ok(input) => input,
                Err(e) => {
                    summary.errors.push(e.to_string());
                    continue;
                }
            };
            let word = input.word.clone();
            match self.store.upsert_rule(input, mode).await {
                Ok((_, true)) => summary.created += 1,
                Ok((_, false)) => summary.updated += 1,
                Err(e) => summary.errors.push(format!("{}: {}", word, e)),
            }
        }

        let snapshot = self.cache.refresh().await?;
        summary.active_total = snapshot.len();

        tracing::info!(
            created = summary.created,
            updated = summary.updated,
            errors = summary.errors.len(),
            "Moderation rules imported"
        );
        Ok(summary)
    }
}

fn validated(input: RuleInput) -> Result<RuleInput, ModerationError> {
    let input = input.normalized();
    input
        .validate()
        .map_err(|e| ModerationError::Validation(e.to_string()))?;
    Ok(input)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domains::moderation::models::{MatchStrategy, RuleCategory, Severity};
    use crate::kernel::test_dependencies::MockRuleStore;
    use std::time::Duration;

    fn input(word: &str) -> RuleInput {
        RuleInput {
            word: word.to_string(),
            pattern: None,
            category: RuleCategory::Other,
            severity: Severity::REJECT,
            match_type: MatchStrategy::Contains,
            is_active: true,
        }
    }

    fn admin() -> (RuleAdmin, Arc<MockRuleStore>, Arc<RuleCache>) {
        let store = Arc::new(MockRuleStore::new());
        let cache = Arc::new(RuleCache::new(store.clone(), Duration::from_secs(3600)));
        (RuleAdmin::new(store.clone(), cache.clone()), store, cache)
    }

    #[tokio::test]
    async fn test_create_invalidates_cache() {
        let (admin, store, cache) = admin();
        assert!(cache.active_rules().await.unwrap().is_empty());

        admin.create_rule(input("刷单")).await.unwrap();
        let snapshot = cache.active_rules().await.unwrap();

        assert_eq!(snapshot.len(), 1);
        assert_eq!(store.list_calls(), 2);
    }

    #[tokio::test]
    async fn test_invalid_rule_is_rejected_and_cache_untouched() {
        let (admin, store, cache) = admin();
        cache.active_rules().await.unwrap();

        let bad = RuleInput {
            match_type: MatchStrategy::Regex,
            ..input("qq")
        };
        assert!(matches!(
            admin.create_rule(bad).await,
            Err(ModerationError::Validation(_))
        ));

        cache.active_rules().await.unwrap();
        assert_eq!(store.list_calls(), 1);
    }

    #[tokio::test]
    async fn test_update_unknown_rule() {
        let (admin, _, _) = admin();
        assert!(matches!(
            admin.update_rule(42, input("x")).await,
            Err(ModerationError::RuleNotFound(42))
        ));
    }

    #[tokio::test]
    async fn test_disable_removes_rule_from_snapshot() {
        let (admin, _, cache) = admin();
        let rule = admin.create_rule(input("代写")).await.unwrap();
        assert_eq!(cache.active_rules().await.unwrap().len(), 1);

        let changed = admin.set_active(&[rule.id], false).await.unwrap();

        assert_eq!(changed, 1);
        assert!(cache.active_rules().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_import_counts_created_updated_and_errors() {
        let (admin, _, _) = admin();
        admin.create_rule(input("代写")).await.unwrap();

        let summary = admin
            .import_rules(
                vec![input(" 代写 "), input("代考"), input("  ")],
                UpsertMode::PreserveActive,
            )
            .await
            .unwrap();

        assert_eq!(summary.created, 1);
        assert_eq!(summary.updated, 1);
        assert_eq!(summary.errors.len(), 1);
        assert_eq!(summary.active_total, 2);
    }

    #[tokio::test]
    async fn test_reimport_keeps_rule_disabled() {
        let (admin, store, cache) = admin();
        let rule = admin.create_rule(input("代写")).await.unwrap();
        admin.set_active(&[rule.id], false).await.unwrap();

        let summary = admin
            .import_rules(
                vec![RuleInput {
                    severity: Severity::SEVERE,
                    ..input("代写")
                }],
                UpsertMode::PreserveActive,
            )
            .await
            .unwrap();

        assert_eq!(summary.updated, 1);
        assert_eq!(summary.active_total, 0);
        let stored = &store.rules()[0];
        assert!(!stored.is_active);
        assert_eq!(stored.severity, Severity::SEVERE);
        assert!(cache.active_rules().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_seed_import_reenables_rule() {
        let (admin, store, _) = admin();
        let rule = admin.create_rule(input("代写")).await.unwrap();
        admin.set_active(&[rule.id], false).await.unwrap();

        let summary = admin
            .import_rules(vec![input("代写")], UpsertMode::ResetActive)
            .await
            .unwrap();

        assert_eq!(summary.active_total, 1);
        assert!(store.rules()[0].is_active);
    }

    #[test]
    fn test_summary_merge() {
        let mut first = ImportSummary {
            created: 2,
            updated: 1,
            errors: vec!["a".to_string()],
            active_total: 3,
        };
        first.merge(ImportSummary {
            created: 1,
            updated: 0,
            errors: vec!["b".to_string()],
            active_total: 4,
        });

        assert_eq!(first.created, 3);
        assert_eq!(first.updated, 1);
        assert_eq!(first.errors, vec!["a", "b"]);
        assert_eq!(first.active_total, 4);
    }
}
