//! # driphub-adapter-storage-sqlite-sqlx
//!
//! `SQLite` persistence adapter using [sqlx](https://docs.rs/sqlx).
//!
//! ## Responsibilities
//! - Implement the `RuleRepository` and `ExecutionLog` port traits defined
//!   in `driphub-app`
//! - Manage the `SQLite` connection pool lifecycle
//! - Run database migrations (using sqlx embedded migrations)
//! - Map between domain types and database rows
//!
//! ## Dependency rule
//! Depends on `driphub-app` (for port traits) and `driphub-domain` (for
//! domain types). The `app` and `domain` crates must never reference this
//! adapter.

mod error;
mod execution_log;
mod pool;
mod rule_repo;

pub use error::StorageError;
pub use execution_log::SqliteExecutionLog;
pub use pool::{Config, Database};
pub use rule_repo::SqliteRuleRepository;
