//! Execution log port — audit trail of execution lifecycles.

use std::future::Future;

use driphub_domain::error::DripHubError;
use driphub_domain::execution::Execution;
use driphub_domain::id::{ExecutionId, UserId};

/// Records execution lifecycle transitions for audit and reporting.
///
/// The engine's live table is authoritative while an execution is
/// `Active`; this log is where terminal runs remain queryable.
pub trait ExecutionLog {
    /// Record a freshly started execution.
    fn record_start(
        &self,
        execution: &Execution,
    ) -> impl Future<Output = Result<(), DripHubError>> + Send;

    /// Record a terminal transition (completed, failed, or cancelled).
    fn record_end(
        &self,
        execution: &Execution,
    ) -> impl Future<Output = Result<(), DripHubError>> + Send;

    /// Get a logged execution by id.
    fn get_by_id(
        &self,
        id: ExecutionId,
    ) -> impl Future<Output = Result<Option<Execution>, DripHubError>> + Send;

    /// Find logged executions for a user, newest-first.
    fn find_by_user(
        &self,
        user_id: &UserId,
        limit: usize,
    ) -> impl Future<Output = Result<Vec<Execution>, DripHubError>> + Send;

    /// Get the most recent logged executions, newest-first.
    fn get_recent(
        &self,
        limit: usize,
    ) -> impl Future<Output = Result<Vec<Execution>, DripHubError>> + Send;
}
