//! Simulated visitor traffic for demos.
//!
//! Cycles a small pool of users through a fixed shopping script
//! (signup → browse → abandon → purchase) and publishes each step as an
//! [`IncomingEvent`]. Deterministic on purpose: the same tick count
//! always produces the same event sequence.

use std::time::Duration;

use tokio::sync::watch;

use driphub_app::ports::EventPublisher;
use driphub_domain::event::{EventType, IncomingEvent};
use driphub_domain::id::UserId;
use driphub_domain::time;

/// Emits a scripted stream of demo events through an [`EventPublisher`].
pub struct VirtualTraffic<P> {
    publisher: P,
    users: Vec<UserId>,
    interval: Duration,
}

impl<P: EventPublisher> VirtualTraffic<P> {
    /// Create a traffic source over the given publisher.
    pub fn new(publisher: P, users: Vec<UserId>, interval: Duration) -> Self {
        Self {
            publisher,
            users,
            interval,
        }
    }

    /// The event emitted at a given tick, or `None` when the user pool is
    /// empty.
    #[must_use]
    pub fn event_at(&self, tick: u64) -> Option<IncomingEvent> {
        if self.users.is_empty() {
            return None;
        }
        let user = &self.users[usize::try_from(tick).unwrap_or(usize::MAX) % self.users.len()];
        let phase = (tick / self.users.len() as u64) % 4;
        let amount = 40 + (tick % 8) * 20;
        let event = match phase {
            0 => IncomingEvent::new(
                EventType::UserSignup,
                user.clone(),
                serde_json::json!({"source": "virtual"}),
                time::now(),
            ),
            1 => IncomingEvent::new(
                EventType::PageViewed,
                user.clone(),
                serde_json::json!({"page": "/pricing"}),
                time::now(),
            ),
            2 => IncomingEvent::new(
                EventType::CartAbandoned,
                user.clone(),
                serde_json::json!({"cart_value": amount}),
                time::now(),
            ),
            _ => IncomingEvent::new(
                EventType::PurchaseComplete,
                user.clone(),
                serde_json::json!({"amount": amount}),
                time::now(),
            ),
        };
        Some(event)
    }

    /// Publish one event per interval until shutdown is signalled.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        let mut tick: u64 = 0;
        tracing::info!(users = self.users.len(), "virtual traffic started");
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Some(event) = self.event_at(tick) {
                        tracing::debug!(event_type = %event.event_type, user = %event.user_id, "virtual traffic event");
                        if let Err(err) = self.publisher.publish(event).await {
                            tracing::warn!(%err, "virtual traffic failed to publish");
                        }
                    }
                    tick += 1;
                }
                _ = shutdown.changed() => break,
            }
        }
        tracing::info!("virtual traffic stopped");
    }
}
