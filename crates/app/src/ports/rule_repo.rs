//! Rule repository port — persistence for rule definitions.

use std::future::Future;

use driphub_domain::error::DripHubError;
use driphub_domain::id::RuleId;
use driphub_domain::rule::AutomationRule;

/// Repository for persisting and querying [`AutomationRule`]s.
///
/// The in-memory registry is authoritative at runtime; this port exists
/// so rules survive restarts (`get_all` at startup, `save`/`delete` on
/// mutation).
pub trait RuleRepository {
    /// Insert or replace a rule definition.
    fn save(
        &self,
        rule: AutomationRule,
    ) -> impl Future<Output = Result<AutomationRule, DripHubError>> + Send;

    /// Get a rule by its unique identifier.
    fn get_by_id(
        &self,
        id: RuleId,
    ) -> impl Future<Output = Result<Option<AutomationRule>, DripHubError>> + Send;

    /// Get all rules.
    fn get_all(&self) -> impl Future<Output = Result<Vec<AutomationRule>, DripHubError>> + Send;

    /// Delete a rule by its unique identifier.
    fn delete(&self, id: RuleId) -> impl Future<Output = Result<(), DripHubError>> + Send;
}
