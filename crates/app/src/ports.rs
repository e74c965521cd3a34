//! Port definitions — traits that adapters implement.
//!
//! Ports are the boundaries between the application core and the outside
//! world. They are defined here (in `app`) so that both the engine and
//! the adapter layer can depend on them without creating circular
//! dependencies.

pub mod delivery;
pub mod event_bus;
pub mod execution_log;
pub mod profile;
pub mod rule_repo;

pub use delivery::{ActivityLog, Mailer, Notifier, WebhookCaller};
pub use event_bus::EventPublisher;
pub use execution_log::ExecutionLog;
pub use profile::ProfileStore;
pub use rule_repo::RuleRepository;
