//! Time-bounded cache of the active rule set.
//!
//! The cache holds one immutable `RuleSnapshot` behind an `Arc`. Readers clone
//! the `Arc` and evaluate without holding any lock. Reloads happen outside the
//! lock and swap the slot in one short write. A generation counter bumped by
//! `invalidate()` keeps a reload that started earlier from installing its
//! snapshot afterward.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use super::errors::ModerationError;
use super::matcher::CompiledRule;
use super::models::Rule;
use crate::kernel::BaseRuleStore;

/// Immutable list of compiled active rules as of one load.
#[derive(Debug)]
pub struct RuleSnapshot {
    rules: Vec<CompiledRule>,
    loaded_at: Instant,
}

impl RuleSnapshot {
    pub fn new(rules: Vec<Rule>) -> Self {
        Self {
            rules: rules.into_iter().map(CompiledRule::compile).collect(),
            loaded_at: Instant::now(),
        }
    }

    pub fn rules(&self) -> &[CompiledRule] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Rules that could not be compiled and will always be skipped
    pub fn faulty_count(&self) -> usize {
        self.rules.iter().filter(|r| r.is_faulty()).count()
    }

    pub fn loaded_at(&self) -> Instant {
        self.loaded_at
    }
}

struct CacheSlot {
    snapshot: Arc<RuleSnapshot>,
    expires_at: Instant,
}

/// Lazily loading rule cache owned by the moderation engine's composition root.
pub struct RuleCache {
    store: Arc<dyn BaseRuleStore>,
    ttl: Duration,
    slot: RwLock<Option<CacheSlot>>,
    generation: AtomicU64,
}

impl RuleCache {
    pub fn new(store: Arc<dyn BaseRuleStore>, ttl: Duration) -> Self {
        Self {
            store,
            ttl,
            slot: RwLock::new(None),
            generation: AtomicU64::new(0),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Current snapshot, reloading from the store if missing or expired.
    pub async fn active_rules(&self) -> Result<Arc<RuleSnapshot>, ModerationError> {
        if let Some(snapshot) = self.current() {
            return Ok(snapshot);
        }
        self.reload().await
    }

    /// Drop the cached snapshot so the next read reloads.
    ///
    /// Every rule mutation must call this after it succeeds.
    pub fn invalidate(&self) {
        let mut slot = self.slot.write().unwrap_or_else(|e| e.into_inner());
        self.generation.fetch_add(1, Ordering::SeqCst);
        if slot.take().is_some() {
            tracing::info!("Moderation rule cache invalidated");
        }
    }

    /// Invalidate and reload immediately.
    pub async fn refresh(&self) -> Result<Arc<RuleSnapshot>, ModerationError> {
        self.invalidate();
        self.reload().await
    }

    fn current(&self) -> Option<Arc<RuleSnapshot>> {
        let slot = self.slot.read().unwrap_or_else(|e| e.into_inner());
        slot.as_ref()
            .filter(|cached| Instant::now() < cached.expires_at)
            .map(|cached| cached.snapshot.clone())
    }

    /// Load from the store. The snapshot is always returned to the caller but
    /// only cached when no invalidation happened while the store was read.
    async fn reload(&self) -> Result<Arc<RuleSnapshot>, ModerationError> {
        let generation = self.generation.load(Ordering::SeqCst);
        let rules = self
            .store
            .list_active_rules()
            .await
            .map_err(ModerationError::RuleStore)?;

        let snapshot = Arc::new(RuleSnapshot::new(rules));
        tracing::info!(
            rules = snapshot.len(),
            faulty = snapshot.faulty_count(),
            ttl_secs = self.ttl.as_secs(),
            "Moderation rules loaded"
        );

        let mut slot = self.slot.write().unwrap_or_else(|e| e.into_inner());
        if self.generation.load(Ordering::SeqCst) == generation {
            *slot = Some(CacheSlot {
                snapshot: snapshot.clone(),
                expires_at: snapshot.loaded_at() + self.ttl,
            });
        } else {
            tracing::debug!("Rule cache invalidated during reload, snapshot not cached");
        }

        Ok(snapshot)
    }
}
