// TestDependencies - in-memory implementations for testing
//
// Provides stores that can be injected into ServerDeps for tests. Each double
// can be switched into an "unavailable" mode to simulate an outage.

use anyhow::{bail, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use super::{BaseAuditLog, BaseMessageStore, BaseRuleStore, ServerDeps};
use crate::domains::chat::models::ChatMessage;
use crate::domains::moderation::models::{
    AuditRecord, ModerationOutcome, NewAuditRecord, Rule, RuleInput, UpsertMode,
};

// =============================================================================
// Mock Rule Store
// =============================================================================

pub struct MockRuleStore {
    rules: Mutex<Vec<Rule>>,
    list_calls: AtomicUsize,
    unavailable: AtomicBool,
}

impl MockRuleStore {
    pub fn new() -> Self {
        Self {
            rules: Mutex::new(Vec::new()),
            list_calls: AtomicUsize::new(0),
            unavailable: AtomicBool::new(false),
        }
    }

    /// Add a rule; ids are assigned in insertion order starting at 1
    pub fn with_rule(self, input: RuleInput) -> Self {
        {
            let mut rules = self.rules.lock().unwrap();
            let id = rules.len() as i64 + 1;
            rules.push(rule_from_input(id, input));
        }
        self
    }

    /// Number of times the active rule set was read
    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub fn rules(&self) -> Vec<Rule> {
        self.rules.lock().unwrap().clone()
    }

    fn check_available(&self) -> Result<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            bail!("rule store unavailable");
        }
        Ok(())
    }
}

impl Default for MockRuleStore {
    fn default() -> Self {
        Self::new()
    }
}

fn rule_from_input(id: i64, input: RuleInput) -> Rule {
    let now = Utc::now();
    Rule {
        id,
        word: input.word,
        pattern: input.pattern,
        category: input.category,
        severity: input.severity,
        match_type: input.match_type,
        is_active: input.is_active,
        created_at: now,
        updated_at: now,
    }
}

#[async_trait]
impl BaseRuleStore for MockRuleStore {
    async fn list_active_rules(&self) -> Result<Vec<Rule>> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        self.check_available()?;
        Ok(self
            .rules
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.is_active)
            .cloned()
            .collect())
    }

    async fn list_rules(&self) -> Result<Vec<Rule>> {
        self.check_available()?;
        Ok(self.rules())
    }

    async fn create_rule(&self, input: RuleInput) -> Result<Rule> {
        self.check_available()?;
        let mut rules = self.rules.lock().unwrap();
        if rules.iter().any(|r| r.word == input.word) {
            bail!("duplicate rule word: {}", input.word);
        }
        let rule = rule_from_input(rules.len() as i64 + 1, input);
        rules.push(rule.clone());
        Ok(rule)
    }

    async fn update_rule(&self, id: i64, input: RuleInput) -> Result<Option<Rule>> {
        self.check_available()?;
        let mut rules = self.rules.lock().unwrap();
        let Some(existing) = rules.iter_mut().find(|r| r.id == id) else {
            return Ok(None);
        };
        let created_at = existing.created_at;
        *existing = Rule {
            created_at,
            ..rule_from_input(id, input)
        };
        Ok(Some(existing.clone()))
    }

    async fn upsert_rule(&self, input: RuleInput, mode: UpsertMode) -> Result<(Rule, bool)> {
        self.check_available()?;
        let mut rules = self.rules.lock().unwrap();
        if let Some(existing) = rules.iter_mut().find(|r| r.word == input.word) {
            let created_at = existing.created_at;
            let is_active = match mode {
                UpsertMode::PreserveActive => existing.is_active,
                UpsertMode::ResetActive => input.is_active,
            };
            *existing = Rule {
                created_at,
                is_active,
                ..rule_from_input(existing.id, input)
            };
            return Ok((existing.clone(), false));
        }
        let rule = rule_from_input(rules.len() as i64 + 1, input);
        rules.push(rule.clone());
        Ok((rule, true))
    }

    async fn set_rules_active(&self, ids: &[i64], active: bool) -> Result<u64> {
        self.check_available()?;
        let mut changed = 0;
        for rule in self.rules.lock().unwrap().iter_mut() {
            if ids.contains(&rule.id) {
                rule.is_active = active;
                rule.updated_at = Utc::now();
                changed += 1;
            }
        }
        Ok(changed)
    }
}

// =============================================================================
// In-Memory Audit Log
// =============================================================================

pub struct InMemoryAuditLog {
    records: Mutex<Vec<AuditRecord>>,
    unavailable: AtomicBool,
}

impl InMemoryAuditLog {
    pub fn new() -> Self {
        Self {
            records: Mutex::new(Vec::new()),
            unavailable: AtomicBool::new(false),
        }
    }

    /// Records in append order
    pub fn records(&self) -> Vec<AuditRecord> {
        self.records.lock().unwrap().clone()
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }
}

impl Default for InMemoryAuditLog {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BaseAuditLog for InMemoryAuditLog {
    async fn append(&self, record: NewAuditRecord) -> Result<AuditRecord> {
        if self.unavailable.load(Ordering::SeqCst) {
            bail!("audit log unavailable");
        }
        let record = record.into_record();
        self.records.lock().unwrap().push(record.clone());
        Ok(record)
    }

    async fn list_recent(
        &self,
        outcome: Option<ModerationOutcome>,
        limit: i64,
    ) -> Result<Vec<AuditRecord>> {
        Ok(self
            .records
            .lock()
            .unwrap()
            .iter()
            .rev()
            .filter(|r| outcome.map_or(true, |o| r.outcome == o))
            .take(limit.max(0) as usize)
            .cloned()
            .collect())
    }
}

// =============================================================================
// In-Memory Message Store
// =============================================================================

pub struct InMemoryMessageStore {
    messages: Mutex<Vec<ChatMessage>>,
    unavailable: AtomicBool,
}

impl InMemoryMessageStore {
    pub fn new() -> Self {
        Self {
            messages: Mutex::new(Vec::new()),
            unavailable: AtomicBool::new(false),
        }
    }

    /// Every stored message in append order
    pub fn messages(&self) -> Vec<ChatMessage> {
        self.messages.lock().unwrap().clone()
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check_available(&self) -> Result<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            bail!("message store unavailable");
        }
        Ok(())
    }
}

impl Default for InMemoryMessageStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BaseMessageStore for InMemoryMessageStore {
    async fn append(
        &self,
        room: &str,
        sender: &str,
        body: &str,
        timestamp: DateTime<Utc>,
    ) -> Result<i64> {
        self.check_available()?;
        let mut messages = self.messages.lock().unwrap();
        let id = messages.last().map_or(1, |m| m.id + 1);
        messages.push(ChatMessage {
            id,
            room_name: room.to_string(),
            sender: sender.to_string(),
            content: body.to_string(),
            timestamp,
        });
        Ok(id)
    }

    async fn list_history(&self, room: &str, limit: i64, offset: i64) -> Result<Vec<ChatMessage>> {
        self.check_available()?;
        let mut page: Vec<ChatMessage> = self
            .messages
            .lock()
            .unwrap()
            .iter()
            .rev()
            .filter(|m| m.room_name == room)
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .cloned()
            .collect();
        page.reverse();
        Ok(page)
    }

    async fn delete_all(&self, room: &str) -> Result<u64> {
        self.check_available()?;
        let mut messages = self.messages.lock().unwrap();
        let before = messages.len();
        messages.retain(|m| m.room_name != room);
        Ok((before - messages.len()) as u64)
    }

    async fn delete_by_sender(&self, room: &str, sender: &str) -> Result<u64> {
        self.check_available()?;
        let mut messages = self.messages.lock().unwrap();
        let before = messages.len();
        messages.retain(|m| !(m.room_name == room && m.sender == sender));
        Ok((before - messages.len()) as u64)
    }
}

// =============================================================================
// TestDependencies
// =============================================================================

/// In-memory doubles wired into a ServerDeps
pub struct TestDependencies {
    pub rule_store: Arc<MockRuleStore>,
    pub audit_log: Arc<InMemoryAuditLog>,
    pub message_store: Arc<InMemoryMessageStore>,
}

impl TestDependencies {
    pub fn new() -> Self {
        Self {
            rule_store: Arc::new(MockRuleStore::new()),
            audit_log: Arc::new(InMemoryAuditLog::new()),
            message_store: Arc::new(InMemoryMessageStore::new()),
        }
    }

    /// Seed the rule store before building deps
    pub fn with_rules(rules: Vec<RuleInput>) -> Self {
        let store = rules
            .into_iter()
            .fold(MockRuleStore::new(), |store, rule| store.with_rule(rule));
        Self {
            rule_store: Arc::new(store),
            ..Self::new()
        }
    }

    pub fn server_deps(&self) -> ServerDeps {
        ServerDeps::from_stores(
            self.rule_store.clone(),
            self.audit_log.clone(),
            self.message_store.clone(),
            &crate::Config::for_tests(),
        )
    }
}

impl Default for TestDependencies {
    fn default() -> Self {
        Self::new()
    }
}
