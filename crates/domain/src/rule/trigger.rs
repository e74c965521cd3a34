//! Trigger — the event gate that decides whether a rule starts a run.

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::event::EventType;
use crate::rule::Condition;

/// Describes which events activate a rule and how often it may fire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trigger {
    /// The event kind this rule listens for.
    pub event_type: EventType,
    /// Custom conditions, all of which must hold (logical AND).
    #[serde(default)]
    pub conditions: Vec<Condition>,
    /// Delay before the rule's first action runs after a match.
    #[serde(default)]
    pub delay_minutes: u32,
    /// Maximum number of firings per user; 0 means unlimited.
    #[serde(default)]
    pub max_triggers: u32,
    /// Minimum hours between two firings for the same user; 0 disables.
    #[serde(default)]
    pub cooldown_hours: u32,
}

impl Trigger {
    /// Trigger on an event kind with no conditions and no rate limits.
    #[must_use]
    pub fn on(event_type: EventType) -> Self {
        Self {
            event_type,
            conditions: Vec::new(),
            delay_minutes: 0,
            max_triggers: 0,
            cooldown_hours: 0,
        }
    }

    /// Add a custom condition.
    #[must_use]
    pub fn when(mut self, condition: Condition) -> Self {
        self.conditions.push(condition);
        self
    }

    /// Delay the first action by `minutes` after a match.
    #[must_use]
    pub fn delayed_minutes(mut self, minutes: u32) -> Self {
        self.delay_minutes = minutes;
        self
    }

    /// Cap firings per user.
    #[must_use]
    pub fn at_most(mut self, times: u32) -> Self {
        self.max_triggers = times;
        self
    }

    /// Require `hours` between firings for the same user.
    #[must_use]
    pub fn cooldown_hours(mut self, hours: u32) -> Self {
        self.cooldown_hours = hours;
        self
    }

    /// Whether this trigger listens for the given event kind.
    ///
    /// Rate limits and conditions are checked separately by the matcher;
    /// this is only the cheap type gate.
    #[must_use]
    pub fn listens_for(&self, event_type: EventType) -> bool {
        self.event_type == event_type
    }

    /// Cooldown window as a duration, if one is configured.
    #[must_use]
    pub fn cooldown(&self) -> Option<chrono::Duration> {
        (self.cooldown_hours > 0).then(|| chrono::Duration::hours(i64::from(self.cooldown_hours)))
    }

    /// Check definition invariants of the custom conditions.
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] when a condition is invalid.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.conditions.iter().try_for_each(Condition::validate)
    }
}

impl std::fmt::Display for Trigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "on({})", self.event_type)?;
        if !self.conditions.is_empty() {
            write!(f, " with {} condition(s)", self.conditions.len())?;
        }
        if self.cooldown_hours > 0 {
            write!(f, " cooldown {}h", self.cooldown_hours)?;
        }
        if self.max_triggers > 0 {
            write!(f, " max {}", self.max_triggers)?;
        }
        Ok(())
    }
}
