//! Delivery collaborator ports — mailer, webhooks, notifications, and the
//! activity log.
//!
//! Each collaborator exposes a single call returning success or failure.
//! The engine treats them as opaque boundaries: a failure is folded into
//! the action outcome, never propagated into the dispatch loop.

use std::future::Future;

use driphub_domain::error::DripHubError;
use driphub_domain::id::UserId;

/// Sends templated emails.
pub trait Mailer {
    /// Deliver `template_id` to `recipient`, rendering with `context`.
    fn send(
        &self,
        recipient: &str,
        template_id: &str,
        context: &serde_json::Value,
    ) -> impl Future<Output = Result<(), DripHubError>> + Send;
}

/// Issues outbound webhook calls.
pub trait WebhookCaller {
    /// POST `payload` to `url`. Implementations should treat server-class
    /// responses as errors; the engine additionally bounds the call with
    /// a timeout.
    fn call(
        &self,
        url: &str,
        payload: &serde_json::Value,
    ) -> impl Future<Output = Result<(), DripHubError>> + Send;
}

/// Pushes user-facing notifications.
pub trait Notifier {
    /// Deliver a notification to the user.
    fn notify(
        &self,
        user_id: &UserId,
        title: Option<&str>,
        message: &str,
    ) -> impl Future<Output = Result<(), DripHubError>> + Send;
}

/// Records named activity entries for reporting.
pub trait ActivityLog {
    /// Append an activity entry for the user.
    fn record(
        &self,
        user_id: &UserId,
        name: &str,
        data: &serde_json::Value,
    ) -> impl Future<Output = Result<(), DripHubError>> + Send;
}
