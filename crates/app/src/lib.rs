//! # driphub-app
//!
//! Application layer — the automation engine and **port definitions**
//! (traits).
//!
//! ## Responsibilities
//! - Define **port traits** that adapters must implement (driven/outbound
//!   ports):
//!   - `RuleRepository` — persistence for rule definitions
//!   - `ProfileStore` — user attributes and segment membership
//!   - `Mailer` / `WebhookCaller` / `Notifier` / `ActivityLog` — delivery
//!     collaborators
//!   - `ExecutionLog` — audit trail of execution lifecycles
//!   - `EventPublisher` — how event sources feed the engine
//! - Run the **automation engine**: match incoming events against rules,
//!   drive executions through their state machine, schedule delayed
//!   actions, and reap stale runs
//! - Provide **in-process infrastructure** (event bus) that doesn't need IO
//!
//! ## Dependency rule
//! Depends on `driphub-domain` only (plus `tokio::sync`/`tokio::time` for
//! channels and timers). Never imports adapter crates. Adapters depend on
//! *this* crate, not the reverse.

pub mod engine;
pub mod evaluator;
pub mod event_bus;
pub mod executor;
pub mod history;
pub mod ports;
pub mod registry;
pub mod scheduler;
