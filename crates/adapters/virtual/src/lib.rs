//! # driphub-adapter-virtual
//!
//! Virtual/demo adapter that lets the engine run end-to-end without any
//! external service: an in-memory profile store, delivery collaborators
//! that log instead of delivering, and a simulated stream of visitor
//! events.
//!
//! ## Provided pieces
//!
//! | Piece | Stands in for |
//! |-------|---------------|
//! | [`MemoryProfileStore`] | A CRM / CDP profile service |
//! | [`LogMailer`] | An SMTP or email-API provider |
//! | [`LogWebhook`] | An outbound HTTP caller |
//! | [`LogNotifier`] | A push/SMS gateway |
//! | [`LogActivity`] | An analytics event sink |
//! | [`VirtualTraffic`] | Real visitors producing events |
//!
//! ## Dependency rule
//!
//! Depends on `driphub-app` (port traits) and `driphub-domain` only.

mod delivery;
mod profile;
mod traffic;

pub use delivery::{LogActivity, LogMailer, LogNotifier, LogWebhook};
pub use profile::MemoryProfileStore;
pub use traffic::VirtualTraffic;
