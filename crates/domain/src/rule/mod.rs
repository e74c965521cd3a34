//! Rule — trigger → condition → action sequences.
//!
//! Rules are the unit of configuration: each one names the event that
//! activates it, the conditions that must hold, how often it may fire per
//! user, and the ordered [`ActionStep`]s to run once it does.

mod action;
mod condition;
mod trigger;

pub use action::{ActionKind, ActionStep};
pub use condition::{CompareOp, Condition, lookup_path};
pub use trigger::Trigger;

use serde::{Deserialize, Serialize};

use crate::error::{DripHubError, ValidationError};
use crate::id::RuleId;
use crate::time::Timestamp;

/// A named trigger plus an ordered list of action steps.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutomationRule {
    pub id: RuleId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub enabled: bool,
    pub trigger: Trigger,
    pub actions: Vec<ActionStep>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub created_by: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl AutomationRule {
    /// Create a builder for constructing an [`AutomationRule`].
    #[must_use]
    pub fn builder() -> AutomationRuleBuilder {
        AutomationRuleBuilder::default()
    }

    /// Check domain invariants.
    ///
    /// An empty action list is deliberately legal: such a rule completes
    /// immediately when its trigger matches.
    ///
    /// # Errors
    ///
    /// Returns [`DripHubError::Validation`] when the name is empty or any
    /// trigger condition or action step is malformed.
    pub fn validate(&self) -> Result<(), DripHubError> {
        if self.name.is_empty() {
            return Err(ValidationError::EmptyName.into());
        }
        self.trigger.validate()?;
        for action in &self.actions {
            action.validate()?;
        }
        Ok(())
    }

    /// Whether the rule carries the given tag.
    #[must_use]
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }
}

/// Step-by-step builder for [`AutomationRule`].
#[derive(Debug, Default)]
pub struct AutomationRuleBuilder {
    id: Option<RuleId>,
    name: Option<String>,
    description: Option<String>,
    enabled: Option<bool>,
    trigger: Option<Trigger>,
    actions: Vec<ActionStep>,
    tags: Vec<String>,
    created_by: Option<String>,
    created_at: Option<Timestamp>,
}

impl AutomationRuleBuilder {
    #[must_use]
    pub fn id(mut self, id: RuleId) -> Self {
        self.id = Some(id);
        self
    }

    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    #[must_use]
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = Some(enabled);
        self
    }

    #[must_use]
    pub fn trigger(mut self, trigger: Trigger) -> Self {
        self.trigger = Some(trigger);
        self
    }

    #[must_use]
    pub fn action(mut self, action: ActionStep) -> Self {
        self.actions.push(action);
        self
    }

    #[must_use]
    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    #[must_use]
    pub fn created_by(mut self, author: impl Into<String>) -> Self {
        self.created_by = Some(author.into());
        self
    }

    #[must_use]
    pub fn created_at(mut self, ts: Timestamp) -> Self {
        self.created_at = Some(ts);
        self
    }

    /// Consume the builder, validate, and return an [`AutomationRule`].
    ///
    /// # Errors
    ///
    /// Returns [`DripHubError::Validation`] if required fields are missing
    /// or malformed.
    pub fn build(self) -> Result<AutomationRule, DripHubError> {
        let created_at = self.created_at.unwrap_or_else(crate::time::now);
        let rule = AutomationRule {
            id: self.id.unwrap_or_default(),
            name: self.name.unwrap_or_default(),
            description: self.description.unwrap_or_default(),
            enabled: self.enabled.unwrap_or(true),
            trigger: self
                .trigger
                .unwrap_or_else(|| Trigger::on(crate::event::EventType::UserSignup)),
            actions: self.actions,
            tags: self.tags,
            created_by: self.created_by,
            created_at,
            updated_at: created_at,
        };
        rule.validate()?;
        Ok(rule)
    }
}
