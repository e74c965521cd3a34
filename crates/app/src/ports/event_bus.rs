//! Event bus port — how event sources feed the engine.

use std::future::Future;

use driphub_domain::error::DripHubError;
use driphub_domain::event::IncomingEvent;

/// Publishes incoming business events to the engine's ingest loop.
pub trait EventPublisher {
    /// Publish an event to all current subscribers.
    fn publish(
        &self,
        event: IncomingEvent,
    ) -> impl Future<Output = Result<(), DripHubError>> + Send;
}

impl<T: EventPublisher + Send + Sync> EventPublisher for std::sync::Arc<T> {
    fn publish(
        &self,
        event: IncomingEvent,
    ) -> impl Future<Output = Result<(), DripHubError>> + Send {
        (**self).publish(event)
    }
}
