//! Common error types used across the workspace.
//!
//! Each layer defines its own typed errors and converts into
//! [`DripHubError`] via `#[from]`. Adapters wrap their infrastructure
//! errors (e.g. sqlx) in the boxed `Storage` variant so the domain crate
//! never names an IO dependency.

use crate::id::ExecutionId;

/// Top-level error for all driphub operations.
#[derive(Debug, thiserror::Error)]
pub enum DripHubError {
    /// A domain invariant was violated at rule-save time.
    #[error("validation error")]
    Validation(#[from] ValidationError),

    /// A referenced aggregate does not exist.
    #[error(transparent)]
    NotFound(#[from] NotFoundError),

    /// The persistence layer failed.
    #[error("storage error")]
    Storage(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// A delivery collaborator (mailer, webhook, …) failed.
    #[error("delivery error")]
    Delivery(#[from] DeliveryError),

    /// An execution state transition was rejected.
    #[error("execution error")]
    Execution(#[from] ExecutionError),
}

/// Rule-definition invariant violations, reported at save time.
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    /// The rule name is empty.
    #[error("rule name must not be empty")]
    EmptyName,
    /// A condition references an empty field path.
    #[error("condition field must not be empty")]
    EmptyConditionField,
    /// A `send_email` action has an empty template id.
    #[error("email template id must not be empty")]
    EmptyTemplate,
    /// A segment action has an empty segment id.
    #[error("segment id must not be empty")]
    EmptySegment,
    /// A `trigger_webhook` action has an empty URL.
    #[error("webhook url must not be empty")]
    EmptyWebhookUrl,
    /// A `send_notification` action has an empty message.
    #[error("notification message must not be empty")]
    EmptyNotificationMessage,
    /// A `log_event` action has an empty event name.
    #[error("log event name must not be empty")]
    EmptyLogEventName,
}

/// A lookup by id found nothing.
#[derive(Debug, thiserror::Error)]
#[error("{entity} not found: {id}")]
pub struct NotFoundError {
    /// Aggregate kind, e.g. `"Rule"` or `"Execution"`.
    pub entity: &'static str,
    /// The id that was looked up.
    pub id: String,
}

/// Failures reported by delivery collaborators.
#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    /// The mailer rejected or failed to send an email.
    #[error("mailer failure: {0}")]
    Mailer(String),
    /// An outbound webhook call failed or returned a server-class error.
    #[error("webhook failure: {0}")]
    Webhook(String),
    /// The notifier failed to deliver.
    #[error("notification failure: {0}")]
    Notification(String),
    /// The user-profile store rejected a read or write.
    #[error("profile store failure: {0}")]
    Profile(String),
    /// The activity log rejected a write.
    #[error("activity log failure: {0}")]
    Activity(String),
}

/// Rejected execution state transitions.
#[derive(Debug, thiserror::Error)]
pub enum ExecutionError {
    /// A terminal execution was asked to transition again.
    #[error("execution {id} is already terminal")]
    AlreadyTerminal {
        /// The execution that refused the transition.
        id: ExecutionId,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_convert_validation_error_into_top_level_error() {
        let err: DripHubError = ValidationError::EmptyName.into();
        assert!(matches!(
            err,
            DripHubError::Validation(ValidationError::EmptyName)
        ));
    }

    #[test]
    fn should_display_not_found_with_entity_and_id() {
        let err = NotFoundError {
            entity: "Rule",
            id: "abc".to_string(),
        };
        assert_eq!(err.to_string(), "Rule not found: abc");
    }

    #[test]
    fn should_display_delivery_error_with_reason() {
        let err = DeliveryError::Mailer("smtp timeout".to_string());
        assert_eq!(err.to_string(), "mailer failure: smtp timeout");
    }

    #[test]
    fn should_display_already_terminal_with_execution_id() {
        let id = ExecutionId::new();
        let err = ExecutionError::AlreadyTerminal { id };
        assert!(err.to_string().contains(&id.to_string()));
    }
}
