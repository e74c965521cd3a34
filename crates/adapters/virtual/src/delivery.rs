//! Logging stand-ins for the delivery collaborator ports.
//!
//! Each one emits a `tracing` line and reports success, so a demo
//! deployment can run full drip sequences without an SMTP server, an
//! HTTP egress, or a push gateway.

use std::future::Future;

use driphub_app::ports::{ActivityLog, Mailer, Notifier, WebhookCaller};
use driphub_domain::error::DripHubError;
use driphub_domain::id::UserId;

/// Mailer that logs instead of sending.
#[derive(Default, Clone, Copy)]
pub struct LogMailer;

impl Mailer for LogMailer {
    fn send(
        &self,
        recipient: &str,
        template_id: &str,
        _context: &serde_json::Value,
    ) -> impl Future<Output = Result<(), DripHubError>> + Send {
        tracing::info!(recipient, template_id, "virtual mailer: email sent");
        async { Ok(()) }
    }
}

/// Webhook caller that logs instead of calling out.
#[derive(Default, Clone, Copy)]
pub struct LogWebhook;

impl WebhookCaller for LogWebhook {
    fn call(
        &self,
        url: &str,
        payload: &serde_json::Value,
    ) -> impl Future<Output = Result<(), DripHubError>> + Send {
        tracing::info!(url, %payload, "virtual webhook: delivered");
        async { Ok(()) }
    }
}

/// Notifier that logs instead of pushing.
#[derive(Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(
        &self,
        user_id: &UserId,
        title: Option<&str>,
        message: &str,
    ) -> impl Future<Output = Result<(), DripHubError>> + Send {
        tracing::info!(%user_id, title, message, "virtual notifier: delivered");
        async { Ok(()) }
    }
}

/// Activity sink that logs instead of persisting.
#[derive(Default, Clone, Copy)]
pub struct LogActivity;

impl ActivityLog for LogActivity {
    fn record(
        &self,
        user_id: &UserId,
        name: &str,
        data: &serde_json::Value,
    ) -> impl Future<Output = Result<(), DripHubError>> + Send {
        tracing::info!(%user_id, name, %data, "virtual activity: recorded");
        async { Ok(()) }
    }
}
