//! Server dependencies (using traits for testability)
//!
//! This module provides the central dependency container. It owns the rule
//! cache, so every rule mutation and every moderation check share one
//! snapshot. All storage goes through trait objects so tests can swap in the
//! in-memory doubles from `test_dependencies`.

use std::sync::Arc;

use sqlx::PgPool;

use crate::config::Config;
use crate::domains::chat::{ChatDispatcher, ChatHistory, RoomRegistry};
use crate::domains::moderation::{ModerationEngine, RuleAdmin, RuleCache};
use crate::kernel::{
    BaseAuditLog, BaseMessageStore, BaseRuleStore, PgAuditLog, PgMessageStore, PgRuleStore,
};

// =============================================================================
// ServerDeps
// =============================================================================

#[derive(Clone)]
pub struct ServerDeps {
    pub rule_store: Arc<dyn BaseRuleStore>,
    pub audit_log: Arc<dyn BaseAuditLog>,
    pub message_store: Arc<dyn BaseMessageStore>,
    pub rule_cache: Arc<RuleCache>,
    pub moderation: Arc<ModerationEngine>,
    pub rule_admin: Arc<RuleAdmin>,
    /// In-process room table shared by every chat connection
    pub rooms: RoomRegistry,
    pub chat: ChatDispatcher,
    pub chat_history: ChatHistory,
}

impl ServerDeps {
    /// Production wiring on top of a Postgres pool
    pub fn new(pool: PgPool, config: &Config) -> Self {
        Self::from_stores(
            Arc::new(PgRuleStore::new(pool.clone())),
            Arc::new(PgAuditLog::new(pool.clone())),
            Arc::new(PgMessageStore::new(pool)),
            config,
        )
    }

    /// Wire the domain services around the given stores
    pub fn from_stores(
        rule_store: Arc<dyn BaseRuleStore>,
        audit_log: Arc<dyn BaseAuditLog>,
        message_store: Arc<dyn BaseMessageStore>,
        config: &Config,
    ) -> Self {
        let rule_cache = Arc::new(RuleCache::new(rule_store.clone(), config.rule_cache_ttl));
        let moderation = Arc::new(ModerationEngine::new(rule_cache.clone(), audit_log.clone()));
        let rule_admin = Arc::new(RuleAdmin::new(rule_store.clone(), rule_cache.clone()));

        let rooms = RoomRegistry::new();
        let chat = ChatDispatcher::new(rooms.clone(), message_store.clone());
        let chat_history = ChatHistory::new(message_store.clone(), config.chat_history_max);

        Self {
            rule_store,
            audit_log,
            message_store,
            rule_cache,
            moderation,
            rule_admin,
            rooms,
            chat,
            chat_history,
        }
    }
}
