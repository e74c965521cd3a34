//! Events — the business occurrences that feed the engine.
//!
//! An [`IncomingEvent`] is what external callers (checkout hooks, form
//! handlers, tracking pixels) hand to the engine. Once processed, the
//! payload is kept per user as an [`EventRecord`] so conditions can look
//! back at recent behaviour.

use serde::{Deserialize, Serialize};

use crate::id::{EventId, UserId};
use crate::time::Timestamp;

/// The closed set of business events rules can trigger on.
///
/// Keeping this closed means a rule referencing an unknown event kind is
/// rejected when the rule is saved, not when it is dispatched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    UserSignup,
    PurchaseComplete,
    CartAbandoned,
    EmailOpened,
    EmailClicked,
    FormSubmitted,
    PageViewed,
    SubscriptionStarted,
    SubscriptionCancelled,
}

impl EventType {
    /// Stable snake_case name, matching the serialized form.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::UserSignup => "user_signup",
            Self::PurchaseComplete => "purchase_complete",
            Self::CartAbandoned => "cart_abandoned",
            Self::EmailOpened => "email_opened",
            Self::EmailClicked => "email_clicked",
            Self::FormSubmitted => "form_submitted",
            Self::PageViewed => "page_viewed",
            Self::SubscriptionStarted => "subscription_started",
            Self::SubscriptionCancelled => "subscription_cancelled",
        }
    }
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for EventType {
    type Err = UnknownEventType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user_signup" => Ok(Self::UserSignup),
            "purchase_complete" => Ok(Self::PurchaseComplete),
            "cart_abandoned" => Ok(Self::CartAbandoned),
            "email_opened" => Ok(Self::EmailOpened),
            "email_clicked" => Ok(Self::EmailClicked),
            "form_submitted" => Ok(Self::FormSubmitted),
            "page_viewed" => Ok(Self::PageViewed),
            "subscription_started" => Ok(Self::SubscriptionStarted),
            "subscription_cancelled" => Ok(Self::SubscriptionCancelled),
            other => Err(UnknownEventType(other.to_string())),
        }
    }
}

/// Parse error for [`EventType`].
#[derive(Debug, thiserror::Error)]
#[error("unknown event type: {0}")]
pub struct UnknownEventType(pub String);

/// A business event as handed to the engine by an external caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IncomingEvent {
    pub id: EventId,
    pub event_type: EventType,
    pub user_id: UserId,
    /// Free-form payload; condition fields resolve into this.
    pub data: serde_json::Value,
    pub occurred_at: Timestamp,
}

impl IncomingEvent {
    /// Create an event stamped with the given time.
    #[must_use]
    pub fn new(
        event_type: EventType,
        user_id: UserId,
        data: serde_json::Value,
        occurred_at: Timestamp,
    ) -> Self {
        Self {
            id: EventId::new(),
            event_type,
            user_id,
            data,
            occurred_at,
        }
    }
}

/// One entry in a user's event history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventRecord {
    pub event_type: EventType,
    pub data: serde_json::Value,
    pub recorded_at: Timestamp,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_roundtrip_event_type_through_str() {
        for ty in [
            EventType::UserSignup,
            EventType::PurchaseComplete,
            EventType::CartAbandoned,
            EventType::EmailOpened,
            EventType::EmailClicked,
            EventType::FormSubmitted,
            EventType::PageViewed,
            EventType::SubscriptionStarted,
            EventType::SubscriptionCancelled,
        ] {
            let parsed: EventType = ty.as_str().parse().unwrap();
            assert_eq!(parsed, ty);
        }
    }

    #[test]
    fn should_reject_unknown_event_type_string() {
        let result: Result<EventType, _> = "coffee_brewed".parse();
        assert!(result.is_err());
    }

    #[test]
    fn should_serialize_event_type_as_snake_case() {
        let json = serde_json::to_string(&EventType::PurchaseComplete).unwrap();
        assert_eq!(json, "\"purchase_complete\"");
    }

    #[test]
    fn should_reject_unknown_event_type_in_json() {
        let result: Result<EventType, _> = serde_json::from_str("\"coffee_brewed\"");
        assert!(result.is_err());
    }

    #[test]
    fn should_create_incoming_event_with_fresh_id() {
        let ts = crate::time::now();
        let a = IncomingEvent::new(
            EventType::UserSignup,
            UserId::from("u1"),
            serde_json::json!({}),
            ts,
        );
        let b = IncomingEvent::new(
            EventType::UserSignup,
            UserId::from("u1"),
            serde_json::json!({}),
            ts,
        );
        assert_ne!(a.id, b.id);
        assert_eq!(a.occurred_at, ts);
    }

    #[test]
    fn should_roundtrip_incoming_event_through_serde_json() {
        let event = IncomingEvent::new(
            EventType::PurchaseComplete,
            UserId::from("u1"),
            serde_json::json!({"amount": 150}),
            crate::time::now(),
        );
        let json = serde_json::to_string(&event).unwrap();
        let parsed: IncomingEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.id, event.id);
        assert_eq!(parsed.event_type, event.event_type);
        assert_eq!(parsed.data["amount"], 150);
    }
}
