//! Action — one step in a rule's sequence.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::id::RuleId;
use crate::rule::Condition;

/// The effect a step performs when it is dispatched.
///
/// The set is closed: a rule referencing an unknown action kind fails to
/// deserialize at save time, and the dispatcher's match is exhaustive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ActionKind {
    /// Send a templated email to the user's profile address.
    SendEmail {
        template_id: String,
        #[serde(default)]
        subject: Option<String>,
    },
    /// Do nothing; the step's `delay_minutes` is the whole point.
    Wait,
    /// Succeed iff the embedded conditions hold at dispatch time.
    ConditionCheck { conditions: Vec<Condition> },
    /// Merge attribute updates into the user's profile.
    UpdateProfile {
        updates: HashMap<String, serde_json::Value>,
    },
    /// Add the user to a segment.
    AddToSegment { segment_id: String },
    /// Remove the user from a segment.
    RemoveFromSegment { segment_id: String },
    /// Call an outbound webhook with a JSON payload.
    TriggerWebhook {
        url: String,
        #[serde(default)]
        payload: serde_json::Value,
    },
    /// Start a brand-new execution of a rule after a delay.
    ///
    /// `rule_id` defaults to the rule this step belongs to. The new
    /// execution gets its own id and does not count against the origin
    /// rule's trigger caps.
    ScheduleFollowup {
        #[serde(default)]
        rule_id: Option<RuleId>,
        delay_minutes: u32,
    },
    /// Push a notification to the user.
    SendNotification {
        message: String,
        #[serde(default)]
        title: Option<String>,
    },
    /// Record a named activity entry for the user.
    LogEvent {
        name: String,
        #[serde(default)]
        data: serde_json::Value,
    },
}

impl ActionKind {
    /// Stable snake_case name, matching the serialized tag.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::SendEmail { .. } => "send_email",
            Self::Wait => "wait",
            Self::ConditionCheck { .. } => "condition_check",
            Self::UpdateProfile { .. } => "update_profile",
            Self::AddToSegment { .. } => "add_to_segment",
            Self::RemoveFromSegment { .. } => "remove_from_segment",
            Self::TriggerWebhook { .. } => "trigger_webhook",
            Self::ScheduleFollowup { .. } => "schedule_followup",
            Self::SendNotification { .. } => "send_notification",
            Self::LogEvent { .. } => "log_event",
        }
    }

    /// Check definition invariants.
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] when a required parameter is empty.
    pub fn validate(&self) -> Result<(), ValidationError> {
        match self {
            Self::SendEmail { template_id, .. } if template_id.is_empty() => {
                Err(ValidationError::EmptyTemplate)
            }
            Self::AddToSegment { segment_id } | Self::RemoveFromSegment { segment_id }
                if segment_id.is_empty() =>
            {
                Err(ValidationError::EmptySegment)
            }
            Self::TriggerWebhook { url, .. } if url.is_empty() => {
                Err(ValidationError::EmptyWebhookUrl)
            }
            Self::SendNotification { message, .. } if message.is_empty() => {
                Err(ValidationError::EmptyNotificationMessage)
            }
            Self::LogEvent { name, .. } if name.is_empty() => {
                Err(ValidationError::EmptyLogEventName)
            }
            Self::ConditionCheck { conditions } => {
                conditions.iter().try_for_each(Condition::validate)
            }
            _ => Ok(()),
        }
    }
}

impl std::fmt::Display for ActionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// One step of a rule: an effect plus its scheduling and failure policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionStep {
    #[serde(flatten)]
    pub kind: ActionKind,
    /// Delay before this step runs, relative to the previous step's
    /// completion (or the trigger match for step 0).
    #[serde(default)]
    pub delay_minutes: u32,
    /// Guard conditions; when unsatisfied the step is skipped and counts
    /// as a success.
    #[serde(default)]
    pub condition: Vec<Condition>,
    /// Whether a failure of this step fails the whole execution.
    #[serde(default = "default_required")]
    pub required: bool,
}

fn default_required() -> bool {
    true
}

impl ActionStep {
    /// Create a required, undelayed, unguarded step.
    #[must_use]
    pub fn new(kind: ActionKind) -> Self {
        Self {
            kind,
            delay_minutes: 0,
            condition: Vec::new(),
            required: true,
        }
    }

    /// Set the pre-dispatch delay.
    #[must_use]
    pub fn after_minutes(mut self, minutes: u32) -> Self {
        self.delay_minutes = minutes;
        self
    }

    /// Add a guard condition.
    #[must_use]
    pub fn guarded_by(mut self, condition: Condition) -> Self {
        self.condition.push(condition);
        self
    }

    /// Mark the step optional: failures are ignored and the execution
    /// proceeds.
    #[must_use]
    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    /// Check definition invariants of the kind and the guard.
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] when a parameter or guard is invalid.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.kind.validate()?;
        self.condition.iter().try_for_each(Condition::validate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::EventType;
    use crate::rule::CompareOp;
    use serde_json::json;

    #[test]
    fn should_default_to_required_undelayed_step() {
        let step = ActionStep::new(ActionKind::Wait);
        assert!(step.required);
        assert_eq!(step.delay_minutes, 0);
        assert!(step.condition.is_empty());
    }

    #[test]
    fn should_build_optional_delayed_guarded_step() {
        let step = ActionStep::new(ActionKind::LogEvent {
            name: "welcome_sent".to_string(),
            data: json!({}),
        })
        .after_minutes(30)
        .guarded_by(Condition::User {
            field: "plan".to_string(),
            value: json!("pro"),
        })
        .optional();

        assert!(!step.required);
        assert_eq!(step.delay_minutes, 30);
        assert_eq!(step.condition.len(), 1);
    }

    #[test]
    fn should_reject_empty_template_id() {
        let step = ActionStep::new(ActionKind::SendEmail {
            template_id: String::new(),
            subject: None,
        });
        assert_eq!(step.validate(), Err(ValidationError::EmptyTemplate));
    }

    #[test]
    fn should_reject_empty_segment_id() {
        let step = ActionStep::new(ActionKind::AddToSegment {
            segment_id: String::new(),
        });
        assert_eq!(step.validate(), Err(ValidationError::EmptySegment));
    }

    #[test]
    fn should_reject_empty_webhook_url() {
        let step = ActionStep::new(ActionKind::TriggerWebhook {
            url: String::new(),
            payload: json!({}),
        });
        assert_eq!(step.validate(), Err(ValidationError::EmptyWebhookUrl));
    }

    #[test]
    fn should_reject_invalid_embedded_condition_check() {
        let step = ActionStep::new(ActionKind::ConditionCheck {
            conditions: vec![Condition::Event {
                field: String::new(),
                op: CompareOp::Eq,
                value: json!(1),
            }],
        });
        assert_eq!(step.validate(), Err(ValidationError::EmptyConditionField));
    }

    #[test]
    fn should_deserialize_step_with_flattened_kind() {
        let json = json!({
            "type": "send_email",
            "template_id": "welcome",
            "delay_minutes": 15,
            "required": false
        });
        let step: ActionStep = serde_json::from_value(json).unwrap();
        assert!(matches!(
            step.kind,
            ActionKind::SendEmail { ref template_id, .. } if template_id == "welcome"
        ));
        assert_eq!(step.delay_minutes, 15);
        assert!(!step.required);
    }

    #[test]
    fn should_reject_unknown_action_kind_in_json() {
        let json = json!({"type": "make_coffee"});
        let result: Result<ActionStep, _> = serde_json::from_value(json);
        assert!(result.is_err());
    }

    #[test]
    fn should_roundtrip_all_action_kinds_through_serde_json() {
        let steps = vec![
            ActionStep::new(ActionKind::SendEmail {
                template_id: "welcome".to_string(),
                subject: Some("Hi there".to_string()),
            }),
            ActionStep::new(ActionKind::Wait).after_minutes(60),
            ActionStep::new(ActionKind::ConditionCheck {
                conditions: vec![Condition::LastEvent {
                    event_type: EventType::EmailOpened,
                    within_hours: 24,
                }],
            }),
            ActionStep::new(ActionKind::UpdateProfile {
                updates: [("plan".to_string(), json!("pro"))].into_iter().collect(),
            }),
            ActionStep::new(ActionKind::AddToSegment {
                segment_id: "vip".to_string(),
            }),
            ActionStep::new(ActionKind::RemoveFromSegment {
                segment_id: "trial".to_string(),
            }),
            ActionStep::new(ActionKind::TriggerWebhook {
                url: "https://example.com/hook".to_string(),
                payload: json!({"source": "driphub"}),
            }),
            ActionStep::new(ActionKind::ScheduleFollowup {
                rule_id: None,
                delay_minutes: 1440,
            }),
            ActionStep::new(ActionKind::SendNotification {
                message: "Your cart misses you".to_string(),
                title: None,
            })
            .optional(),
            ActionStep::new(ActionKind::LogEvent {
                name: "nudge_sent".to_string(),
                data: json!({"channel": "email"}),
            })
            .optional(),
        ];

        for step in &steps {
            let json = serde_json::to_string(step).unwrap();
            let parsed: ActionStep = serde_json::from_str(&json).unwrap();
            assert_eq!(&parsed, step);
        }
    }

    #[test]
    fn should_name_every_action_kind() {
        assert_eq!(ActionKind::Wait.name(), "wait");
        assert_eq!(
            ActionKind::ScheduleFollowup {
                rule_id: None,
                delay_minutes: 10,
            }
            .name(),
            "schedule_followup"
        );
    }
}
