//! Action executors — one handler per action kind.
//!
//! Dispatch is an exhaustive match over the closed [`ActionKind`] enum,
//! so every kind has exactly one handler and an unknown kind cannot reach
//! the dispatcher in the first place. Collaborator failures are folded
//! into an [`ActionOutcome`]; nothing here panics or propagates errors
//! into the dispatch loop.

use std::time::Duration;

use driphub_domain::execution::Execution;
use driphub_domain::id::RuleId;
use driphub_domain::rule::{ActionKind, AutomationRule};
use driphub_domain::time;

use crate::evaluator::ConditionEvaluator;
use crate::history::EventHistoryTracker;
use crate::ports::{ActivityLog, Mailer, Notifier, ProfileStore, WebhookCaller};
use crate::registry::RuleRegistry;

/// Result of running (or skipping) one action step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionOutcome {
    /// The side effect ran and reported success.
    Completed,
    /// A guard condition was unsatisfied; the step was skipped without
    /// invoking its side effect. Counts as success.
    Skipped,
    /// The side effect failed; the message explains why.
    Failed(String),
}

impl ActionOutcome {
    /// Whether the execution may advance past this step regardless of the
    /// step's `required` flag.
    #[must_use]
    pub fn succeeded(&self) -> bool {
        !matches!(self, Self::Failed(_))
    }
}

/// A request to start a brand-new execution, produced by the
/// `schedule_followup` action and carried out by the engine.
#[derive(Debug, Clone)]
pub struct FollowupRequest {
    pub rule: AutomationRule,
    pub delay_minutes: u32,
}

/// Borrowed bundle of everything a single action dispatch needs.
pub struct ActionExecutors<'a, P, M, W, N, A> {
    pub profiles: &'a P,
    pub mailer: &'a M,
    pub webhook: &'a W,
    pub notifier: &'a N,
    pub activity: &'a A,
    pub registry: &'a RuleRegistry,
    pub history: &'a EventHistoryTracker,
    pub webhook_timeout: Duration,
}

impl<P, M, W, N, A> ActionExecutors<'_, P, M, W, N, A>
where
    P: ProfileStore,
    M: Mailer,
    W: WebhookCaller,
    N: Notifier,
    A: ActivityLog,
{
    /// Run one action kind for an execution.
    ///
    /// Returns the outcome plus, for `schedule_followup`, the follow-up
    /// the engine should start once the step is accounted for.
    pub async fn execute(
        &self,
        kind: &ActionKind,
        execution: &Execution,
    ) -> (ActionOutcome, Option<FollowupRequest>) {
        match kind {
            ActionKind::SendEmail {
                template_id,
                subject,
            } => (
                self.send_email(execution, template_id, subject.as_deref())
                    .await,
                None,
            ),
            ActionKind::Wait => (ActionOutcome::Completed, None),
            ActionKind::ConditionCheck { conditions } => {
                let evaluator = ConditionEvaluator::new(self.profiles, self.history);
                let held = evaluator
                    .all_hold(
                        conditions,
                        &execution.user_id,
                        &execution.trigger_data,
                        time::now(),
                    )
                    .await;
                let outcome = if held {
                    ActionOutcome::Completed
                } else {
                    ActionOutcome::Failed("conditions not satisfied".to_string())
                };
                (outcome, None)
            }
            ActionKind::UpdateProfile { updates } => {
                let outcome = match self
                    .profiles
                    .update_profile(&execution.user_id, updates.clone())
                    .await
                {
                    Ok(()) => ActionOutcome::Completed,
                    Err(err) => ActionOutcome::Failed(err.to_string()),
                };
                (outcome, None)
            }
            ActionKind::AddToSegment { segment_id } => {
                let outcome = match self
                    .profiles
                    .add_to_segment(&execution.user_id, segment_id)
                    .await
                {
                    Ok(()) => ActionOutcome::Completed,
                    Err(err) => ActionOutcome::Failed(err.to_string()),
                };
                (outcome, None)
            }
            ActionKind::RemoveFromSegment { segment_id } => {
                let outcome = match self
                    .profiles
                    .remove_from_segment(&execution.user_id, segment_id)
                    .await
                {
                    Ok(()) => ActionOutcome::Completed,
                    Err(err) => ActionOutcome::Failed(err.to_string()),
                };
                (outcome, None)
            }
            ActionKind::TriggerWebhook { url, payload } => {
                (self.trigger_webhook(url, payload).await, None)
            }
            ActionKind::ScheduleFollowup {
                rule_id,
                delay_minutes,
            } => self.schedule_followup(execution, *rule_id, *delay_minutes),
            ActionKind::SendNotification { message, title } => {
                let outcome = match self
                    .notifier
                    .notify(&execution.user_id, title.as_deref(), message)
                    .await
                {
                    Ok(()) => ActionOutcome::Completed,
                    Err(err) => ActionOutcome::Failed(err.to_string()),
                };
                (outcome, None)
            }
            ActionKind::LogEvent { name, data } => {
                let outcome = match self.activity.record(&execution.user_id, name, data).await {
                    Ok(()) => ActionOutcome::Completed,
                    Err(err) => ActionOutcome::Failed(err.to_string()),
                };
                (outcome, None)
            }
        }
    }

    async fn send_email(
        &self,
        execution: &Execution,
        template_id: &str,
        subject: Option<&str>,
    ) -> ActionOutcome {
        let attributes = match self.profiles.get_user_data(&execution.user_id).await {
            Ok(attributes) => attributes,
            Err(err) => return ActionOutcome::Failed(err.to_string()),
        };
        let Some(recipient) = attributes.get("email").and_then(|v| v.as_str()) else {
            return ActionOutcome::Failed(format!(
                "no email address on profile for user {}",
                execution.user_id
            ));
        };
        let context = serde_json::json!({
            "subject": subject,
            "trigger": execution.trigger_data,
        });
        match self.mailer.send(recipient, template_id, &context).await {
            Ok(()) => ActionOutcome::Completed,
            Err(err) => ActionOutcome::Failed(err.to_string()),
        }
    }

    async fn trigger_webhook(&self, url: &str, payload: &serde_json::Value) -> ActionOutcome {
        match tokio::time::timeout(self.webhook_timeout, self.webhook.call(url, payload)).await {
            Ok(Ok(())) => ActionOutcome::Completed,
            Ok(Err(err)) => ActionOutcome::Failed(err.to_string()),
            Err(_) => ActionOutcome::Failed(format!("webhook {url} timed out")),
        }
    }

    fn schedule_followup(
        &self,
        execution: &Execution,
        rule_id: Option<RuleId>,
        delay_minutes: u32,
    ) -> (ActionOutcome, Option<FollowupRequest>) {
        let target = rule_id.unwrap_or(execution.rule_id);
        match self.registry.get(target) {
            Some(rule) if rule.enabled => (
                ActionOutcome::Completed,
                Some(FollowupRequest {
                    rule,
                    delay_minutes,
                }),
            ),
            Some(rule) => (
                ActionOutcome::Failed(format!("followup rule disabled: {}", rule.name)),
                None,
            ),
            None => (
                ActionOutcome::Failed(format!("followup rule not found: {target}")),
                None,
            ),
        }
    }
}
