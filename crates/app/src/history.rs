//! Event history tracker — per-user, time-windowed log of past events.
//!
//! Feeds two things: the `event_count` / `last_event` condition variants,
//! and the cooldown / max-trigger accounting (kept as a separate firing
//! log per user and rule). Events are capped per user by count at insert
//! time and by age during background maintenance.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use driphub_domain::event::{EventRecord, EventType};
use driphub_domain::id::{RuleId, UserId};
use driphub_domain::time::Timestamp;

/// Default per-user ring capacity.
pub const DEFAULT_MAX_EVENTS: usize = 100;
/// Default retention window in days.
pub const DEFAULT_MAX_AGE_DAYS: i64 = 90;

/// Thread-safe per-user event history with capped retention.
pub struct EventHistoryTracker {
    inner: Mutex<Inner>,
    max_events: usize,
    max_age: chrono::Duration,
}

#[derive(Default)]
struct Inner {
    events: HashMap<UserId, VecDeque<EventRecord>>,
    firings: HashMap<UserId, HashMap<RuleId, Vec<Timestamp>>>,
}

impl Default for EventHistoryTracker {
    fn default() -> Self {
        Self::new(
            DEFAULT_MAX_EVENTS,
            chrono::Duration::days(DEFAULT_MAX_AGE_DAYS),
        )
    }
}

impl EventHistoryTracker {
    /// Create a tracker with the given per-user cap and retention window.
    #[must_use]
    pub fn new(max_events: usize, max_age: chrono::Duration) -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            max_events,
            max_age,
        }
    }

    /// Append an event to a user's history, enforcing the per-user cap.
    pub fn record_event(
        &self,
        user_id: &UserId,
        event_type: EventType,
        data: serde_json::Value,
        now: Timestamp,
    ) {
        let mut inner = self.inner.lock().expect("history lock poisoned");
        let ring = inner.events.entry(user_id.clone()).or_default();
        ring.push_back(EventRecord {
            event_type,
            data,
            recorded_at: now,
        });
        while ring.len() > self.max_events {
            ring.pop_front();
        }
    }

    /// A user's history, oldest-first.
    #[must_use]
    pub fn history(&self, user_id: &UserId) -> Vec<EventRecord> {
        let inner = self.inner.lock().expect("history lock poisoned");
        inner
            .events
            .get(user_id)
            .map(|ring| ring.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Count events of a kind recorded at or after `since`.
    #[must_use]
    pub fn count_events_since(
        &self,
        user_id: &UserId,
        event_type: EventType,
        since: Timestamp,
    ) -> usize {
        let inner = self.inner.lock().expect("history lock poisoned");
        inner
            .events
            .get(user_id)
            .map(|ring| {
                ring.iter()
                    .filter(|r| r.event_type == event_type && r.recorded_at >= since)
                    .count()
            })
            .unwrap_or_default()
    }

    /// When a kind of event last occurred for a user, if ever.
    #[must_use]
    pub fn last_event_time(&self, user_id: &UserId, event_type: EventType) -> Option<Timestamp> {
        let inner = self.inner.lock().expect("history lock poisoned");
        inner
            .events
            .get(user_id)?
            .iter()
            .rev()
            .find(|r| r.event_type == event_type)
            .map(|r| r.recorded_at)
    }

    /// Record that a rule fired for a user.
    pub fn record_firing(&self, user_id: &UserId, rule_id: RuleId, now: Timestamp) {
        let mut inner = self.inner.lock().expect("history lock poisoned");
        inner
            .firings
            .entry(user_id.clone())
            .or_default()
            .entry(rule_id)
            .or_default()
            .push(now);
    }

    /// How many times a rule has fired for a user.
    #[must_use]
    pub fn firing_count(&self, user_id: &UserId, rule_id: RuleId) -> usize {
        let inner = self.inner.lock().expect("history lock poisoned");
        inner
            .firings
            .get(user_id)
            .and_then(|rules| rules.get(&rule_id))
            .map(Vec::len)
            .unwrap_or_default()
    }

    /// When a rule last fired for a user, if ever.
    #[must_use]
    pub fn last_firing(&self, user_id: &UserId, rule_id: RuleId) -> Option<Timestamp> {
        let inner = self.inner.lock().expect("history lock poisoned");
        inner
            .firings
            .get(user_id)?
            .get(&rule_id)?
            .last()
            .copied()
    }

    /// Drop events older than the retention window. Returns the number of
    /// records removed. Firing timestamps are kept: max-trigger caps are
    /// lifetime counts, not windowed ones.
    pub fn prune(&self, now: Timestamp) -> usize {
        let cutoff = now - self.max_age;
        let mut removed = 0;
        let mut inner = self.inner.lock().expect("history lock poisoned");
        inner.events.retain(|_, ring| {
            while ring.front().is_some_and(|r| r.recorded_at < cutoff) {
                ring.pop_front();
                removed += 1;
            }
            !ring.is_empty()
        });
        removed
    }
}
