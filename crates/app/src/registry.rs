//! Rule registry — the in-memory table of rule definitions.
//!
//! Read-mostly: the trigger matcher scans it on every event, while
//! mutations only happen on admin operations. Insertion order is
//! preserved so rule evaluation order is deterministic.

use std::collections::HashMap;
use std::sync::RwLock;

use driphub_domain::event::EventType;
use driphub_domain::id::RuleId;
use driphub_domain::rule::AutomationRule;

/// Thread-safe, insertion-ordered store of [`AutomationRule`]s.
#[derive(Default)]
pub struct RuleRegistry {
    inner: RwLock<Inner>,
}

#[derive(Default)]
struct Inner {
    rules: HashMap<RuleId, AutomationRule>,
    order: Vec<RuleId>,
}

impl RuleRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a rule, or replace it in place if the id already exists.
    ///
    /// Replacement keeps the rule's original position in evaluation order.
    pub fn upsert(&self, rule: AutomationRule) {
        let mut inner = self.inner.write().expect("registry lock poisoned");
        if !inner.rules.contains_key(&rule.id) {
            inner.order.push(rule.id);
        }
        inner.rules.insert(rule.id, rule);
    }

    /// Remove a rule. Returns the removed rule, if any.
    pub fn remove(&self, id: RuleId) -> Option<AutomationRule> {
        let mut inner = self.inner.write().expect("registry lock poisoned");
        let removed = inner.rules.remove(&id);
        if removed.is_some() {
            inner.order.retain(|r| *r != id);
        }
        removed
    }

    /// Get a rule by id.
    #[must_use]
    pub fn get(&self, id: RuleId) -> Option<AutomationRule> {
        let inner = self.inner.read().expect("registry lock poisoned");
        inner.rules.get(&id).cloned()
    }

    /// All rules in insertion order.
    #[must_use]
    pub fn all(&self) -> Vec<AutomationRule> {
        self.collect(|_| true)
    }

    /// Enabled rules in insertion order.
    #[must_use]
    pub fn enabled(&self) -> Vec<AutomationRule> {
        self.collect(|rule| rule.enabled)
    }

    /// Rules carrying the given tag, in insertion order.
    #[must_use]
    pub fn with_tag(&self, tag: &str) -> Vec<AutomationRule> {
        self.collect(|rule| rule.has_tag(tag))
    }

    /// Enabled rules listening for the given event kind, in insertion
    /// order. This is the trigger matcher's index.
    #[must_use]
    pub fn for_event(&self, event_type: EventType) -> Vec<AutomationRule> {
        self.collect(|rule| rule.enabled && rule.trigger.listens_for(event_type))
    }

    /// Number of rules held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.read().expect("registry lock poisoned").rules.len()
    }

    /// Whether the registry is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn collect(&self, keep: impl Fn(&AutomationRule) -> bool) -> Vec<AutomationRule> {
        let inner = self.inner.read().expect("registry lock poisoned");
        inner
            .order
            .iter()
            .filter_map(|id| inner.rules.get(id))
            .filter(|rule| keep(rule))
            .cloned()
            .collect()
    }
}
