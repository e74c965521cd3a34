//! Execution — one live run of a rule for one user.
//!
//! An execution is created when a rule's trigger matches an event and is
//! then advanced step by step as scheduled actions resolve. It ends in
//! exactly one of three terminal states; after that, `current_step` is
//! frozen and further transitions are rejected.

use serde::{Deserialize, Serialize};

use crate::error::ExecutionError;
use crate::id::{ExecutionId, RuleId, UserId};
use crate::time::Timestamp;

/// Lifecycle state of an [`Execution`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    /// Steps are still being scheduled and dispatched.
    Active,
    /// Every step resolved successfully (or was skipped / optional).
    Completed,
    /// A required step failed; see `error_message`.
    Failed,
    /// Stopped by an operator, a rule deletion, or the lifetime reaper.
    Cancelled,
}

impl ExecutionStatus {
    /// Whether this state admits no further transitions.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Active)
    }
}

impl std::fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Active => "active",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        };
        f.write_str(name)
    }
}

impl std::str::FromStr for ExecutionStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(Self::Active),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            "cancelled" => Ok(Self::Cancelled),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

/// Parse error for [`ExecutionStatus`].
#[derive(Debug, thiserror::Error)]
#[error("unknown execution status: {0}")]
pub struct UnknownStatus(pub String);

/// One live (or archived) run of a rule for one user.
///
/// Holds only the rule's id — never the rule itself — so a rule can be
/// edited, disabled, or deleted while executions are in flight.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Execution {
    pub id: ExecutionId,
    pub rule_id: RuleId,
    pub user_id: UserId,
    /// Immutable snapshot of the event payload that started this run.
    pub trigger_data: serde_json::Value,
    /// 0-based index into the owning rule's action list.
    pub current_step: usize,
    pub status: ExecutionStatus,
    pub started_at: Timestamp,
    pub completed_at: Option<Timestamp>,
    pub error_message: Option<String>,
}

impl Execution {
    /// Create a fresh `Active` execution at step 0.
    #[must_use]
    pub fn new(
        rule_id: RuleId,
        user_id: UserId,
        trigger_data: serde_json::Value,
        now: Timestamp,
    ) -> Self {
        Self {
            id: ExecutionId::new(),
            rule_id,
            user_id,
            trigger_data,
            current_step: 0,
            status: ExecutionStatus::Active,
            started_at: now,
            completed_at: None,
            error_message: None,
        }
    }

    /// Whether the execution is still live.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.status == ExecutionStatus::Active
    }

    /// Move to the next step. Only meaningful while `Active`.
    pub fn advance(&mut self) {
        debug_assert!(self.is_active(), "advance on terminal execution");
        self.current_step += 1;
    }

    /// Transition to `Completed`.
    ///
    /// # Errors
    ///
    /// Returns [`ExecutionError::AlreadyTerminal`] if the execution has
    /// already left the `Active` state.
    pub fn complete(&mut self, now: Timestamp) -> Result<(), ExecutionError> {
        self.terminate(ExecutionStatus::Completed, None, now)
    }

    /// Transition to `Failed`, recording the reason.
    ///
    /// # Errors
    ///
    /// Returns [`ExecutionError::AlreadyTerminal`] if the execution has
    /// already left the `Active` state.
    pub fn fail(&mut self, message: impl Into<String>, now: Timestamp) -> Result<(), ExecutionError> {
        self.terminate(ExecutionStatus::Failed, Some(message.into()), now)
    }

    /// Transition to `Cancelled`.
    ///
    /// # Errors
    ///
    /// Returns [`ExecutionError::AlreadyTerminal`] if the execution has
    /// already left the `Active` state.
    pub fn cancel(&mut self, now: Timestamp) -> Result<(), ExecutionError> {
        self.terminate(ExecutionStatus::Cancelled, None, now)
    }

    fn terminate(
        &mut self,
        status: ExecutionStatus,
        message: Option<String>,
        now: Timestamp,
    ) -> Result<(), ExecutionError> {
        if self.status.is_terminal() {
            return Err(ExecutionError::AlreadyTerminal { id: self.id });
        }
        self.status = status;
        self.completed_at = Some(now);
        self.error_message = message;
        Ok(())
    }
}
