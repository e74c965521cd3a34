//! Condition evaluator — predicate evaluation over events, profiles, and
//! history.
//!
//! Evaluation is fail-closed: a missing field, an unknown user, a
//! profile-store error, or a non-comparable value all yield `false`. A
//! broken condition silently disables a rule path; it never crashes the
//! engine.

use driphub_domain::id::UserId;
use driphub_domain::rule::{CompareOp, Condition, lookup_path};
use driphub_domain::time::Timestamp;

use crate::history::EventHistoryTracker;
use crate::ports::ProfileStore;

/// Evaluates [`Condition`]s against the current event payload, the user's
/// profile, and the user's event history.
pub struct ConditionEvaluator<'a, P> {
    profiles: &'a P,
    history: &'a EventHistoryTracker,
}

impl<'a, P: ProfileStore> ConditionEvaluator<'a, P> {
    /// Create an evaluator borrowing the profile port and history tracker.
    pub fn new(profiles: &'a P, history: &'a EventHistoryTracker) -> Self {
        Self { profiles, history }
    }

    /// Whether every condition holds (logical AND, short-circuit).
    /// An empty set holds trivially.
    pub async fn all_hold(
        &self,
        conditions: &[Condition],
        user_id: &UserId,
        event_data: &serde_json::Value,
        now: Timestamp,
    ) -> bool {
        for condition in conditions {
            if !self.holds(condition, user_id, event_data, now).await {
                return false;
            }
        }
        true
    }

    /// Whether a single condition holds.
    pub async fn holds(
        &self,
        condition: &Condition,
        user_id: &UserId,
        event_data: &serde_json::Value,
        now: Timestamp,
    ) -> bool {
        match condition {
            Condition::Event { field, op, value } => lookup_path(event_data, field)
                .is_some_and(|actual| op.compare(actual, value)),
            Condition::User { field, value } => match self.profiles.get_user_data(user_id).await {
                Ok(attributes) => attributes
                    .get(field)
                    .is_some_and(|actual| CompareOp::Eq.compare(actual, value)),
                Err(err) => {
                    tracing::debug!(%user_id, %field, %err, "profile lookup failed, condition fails closed");
                    false
                }
            },
            Condition::EventCount {
                event_type,
                within_days,
                at_least,
            } => {
                let since = now - chrono::Duration::days(i64::from(*within_days));
                self.history.count_events_since(user_id, *event_type, since) >= *at_least
            }
            Condition::LastEvent {
                event_type,
                within_hours,
            } => {
                let cutoff = now - chrono::Duration::hours(i64::from(*within_hours));
                self.history
                    .last_event_time(user_id, *event_type)
                    .is_some_and(|ts| ts >= cutoff)
            }
        }
    }
}
