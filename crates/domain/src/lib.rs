//! # driphub-domain
//!
//! Pure domain model for the driphub marketing automation engine.
//!
//! ## Responsibilities
//! - Foundational types: typed identifiers, error conventions, timestamps
//! - Define **Events** (the business occurrences that feed the engine)
//! - Define **Rules** (trigger → condition → action sequences)
//! - Define **Executions** (one live run of a rule for one user, tracked
//!   through a state machine)
//! - Contain all invariant enforcement and domain logic
//!
//! ## Dependency rule
//! This crate has **no internal dependencies**.
//! It must never import anything from `app`, adapters, or external IO crates.
//! All IO boundaries are expressed as traits in the `app` crate (ports).

pub mod error;
pub mod id;
pub mod time;

pub mod event;
pub mod execution;
pub mod rule;
