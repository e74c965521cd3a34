//! `SQLite` implementation of [`ExecutionLog`].

use std::str::FromStr;

use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, Row, SqlitePool};

use driphub_app::ports::ExecutionLog;
use driphub_domain::error::DripHubError;
use driphub_domain::execution::{Execution, ExecutionStatus};
use driphub_domain::id::{ExecutionId, RuleId, UserId};

use crate::error::StorageError;

struct Wrapper(Execution);

impl Wrapper {
    fn maybe(value: Option<Self>) -> Option<Execution> {
        value.map(|w| w.0)
    }
}

impl<'r> FromRow<'r, SqliteRow> for Wrapper {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        let id: String = row.try_get("id")?;
        let rule_id: String = row.try_get("rule_id")?;
        let user_id: String = row.try_get("user_id")?;
        let trigger_json: String = row.try_get("trigger_data")?;
        let current_step: i64 = row.try_get("current_step")?;
        let status: String = row.try_get("status")?;
        let started_at: String = row.try_get("started_at")?;
        let completed_at: Option<String> = row.try_get("completed_at")?;
        let error_message: Option<String> = row.try_get("error_message")?;

        let id = ExecutionId::from_str(&id).map_err(|err| sqlx::Error::Decode(Box::new(err)))?;
        let rule_id =
            RuleId::from_str(&rule_id).map_err(|err| sqlx::Error::Decode(Box::new(err)))?;
        let trigger_data: serde_json::Value = serde_json::from_str(&trigger_json)
            .map_err(|err| sqlx::Error::Decode(Box::new(err)))?;
        let status = ExecutionStatus::from_str(&status)
            .map_err(|err| sqlx::Error::Decode(Box::new(err)))?;
        let current_step = usize::try_from(current_step)
            .map_err(|err| sqlx::Error::Decode(Box::new(err)))?;
        let started_at = parse_timestamp(&started_at)?;
        let completed_at = completed_at.as_deref().map(parse_timestamp).transpose()?;

        Ok(Self(Execution {
            id,
            rule_id,
            user_id: UserId::from(user_id),
            trigger_data,
            current_step,
            status,
            started_at,
            completed_at,
            error_message,
        }))
    }
}

fn parse_timestamp(value: &str) -> Result<chrono::DateTime<chrono::Utc>, sqlx::Error> {
    chrono::DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.to_utc())
        .map_err(|err| sqlx::Error::Decode(Box::new(err)))
}

/// `SQLite`-backed execution log.
pub struct SqliteExecutionLog {
    pool: SqlitePool,
}

impl SqliteExecutionLog {
    /// Create a new log backed by the given connection pool.
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

impl ExecutionLog for SqliteExecutionLog {
    async fn record_start(&self, execution: &Execution) -> Result<(), DripHubError> {
        let trigger_json =
            serde_json::to_string(&execution.trigger_data).map_err(StorageError::from)?;
        let current_step = i64::try_from(execution.current_step).unwrap_or(i64::MAX);

        sqlx::query(
            "INSERT INTO executions (id, rule_id, user_id, trigger_data, current_step, status, started_at, completed_at, error_message) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(execution.id.to_string())
        .bind(execution.rule_id.to_string())
        .bind(execution.user_id.as_str())
        .bind(&trigger_json)
        .bind(current_step)
        .bind(execution.status.to_string())
        .bind(execution.started_at.to_rfc3339())
        .bind(execution.completed_at.map(|ts| ts.to_rfc3339()))
        .bind(&execution.error_message)
        .execute(&self.pool)
        .await
        .map_err(StorageError::from)?;

        Ok(())
    }

    async fn record_end(&self, execution: &Execution) -> Result<(), DripHubError> {
        let current_step = i64::try_from(execution.current_step).unwrap_or(i64::MAX);

        sqlx::query(
            "UPDATE executions SET current_step = ?, status = ?, completed_at = ?, error_message = ? WHERE id = ?",
        )
        .bind(current_step)
        .bind(execution.status.to_string())
        .bind(execution.completed_at.map(|ts| ts.to_rfc3339()))
        .bind(&execution.error_message)
        .bind(execution.id.to_string())
        .execute(&self.pool)
        .await
        .map_err(StorageError::from)?;

        Ok(())
    }

    async fn get_by_id(&self, id: ExecutionId) -> Result<Option<Execution>, DripHubError> {
        let row: Option<Wrapper> = sqlx::query_as("SELECT * FROM executions WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(StorageError::from)?;
        Ok(Wrapper::maybe(row))
    }

    async fn find_by_user(
        &self,
        user_id: &UserId,
        limit: usize,
    ) -> Result<Vec<Execution>, DripHubError> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let rows: Vec<Wrapper> = sqlx::query_as(
            "SELECT * FROM executions WHERE user_id = ? ORDER BY started_at DESC LIMIT ?",
        )
        .bind(user_id.as_str())
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(StorageError::from)?;
        Ok(rows.into_iter().map(|w| w.0).collect())
    }

    async fn get_recent(&self, limit: usize) -> Result<Vec<Execution>, DripHubError> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let rows: Vec<Wrapper> =
            sqlx::query_as("SELECT * FROM executions ORDER BY started_at DESC LIMIT ?")
                .bind(limit)
                .fetch_all(&self.pool)
                .await
                .map_err(StorageError::from)?;
        Ok(rows.into_iter().map(|w| w.0).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::Config;
    use driphub_domain::time::now;
    use serde_json::json;

    async fn setup() -> SqliteExecutionLog {
        let db = Config {
            database_url: "sqlite::memory:".to_string(),
        }
        .build()
        .await
        .unwrap();
        SqliteExecutionLog::new(db.pool().clone())
    }

    fn active_execution(user: &str) -> Execution {
        Execution::new(
            RuleId::new(),
            UserId::from(user),
            json!({"amount": 150}),
            now(),
        )
    }

    #[tokio::test]
    async fn should_record_start_and_fetch_by_id() {
        let log = setup().await;
        let execution = active_execution("u1");
        let id = execution.id;

        log.record_start(&execution).await.unwrap();
        let fetched = log.get_by_id(id).await.unwrap().unwrap();

        assert_eq!(fetched.id, id);
        assert_eq!(fetched.status, ExecutionStatus::Active);
        assert_eq!(fetched.current_step, 0);
        assert_eq!(fetched.trigger_data["amount"], 150);
        assert!(fetched.completed_at.is_none());
    }

    #[tokio::test]
    async fn should_return_none_when_execution_not_logged() {
        let log = setup().await;
        let result = log.get_by_id(ExecutionId::new()).await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn should_update_row_on_record_end() {
        let log = setup().await;
        let mut execution = active_execution("u1");
        let id = execution.id;
        log.record_start(&execution).await.unwrap();

        execution.advance();
        execution.fail("step 1 (send_email) failed: smtp rejected", now()).unwrap();
        log.record_end(&execution).await.unwrap();

        let fetched = log.get_by_id(id).await.unwrap().unwrap();
        assert_eq!(fetched.status, ExecutionStatus::Failed);
        assert_eq!(fetched.current_step, 1);
        assert!(fetched.completed_at.is_some());
        assert!(fetched.error_message.unwrap().contains("send_email"));
    }

    #[tokio::test]
    async fn should_find_executions_by_user_newest_first() {
        let log = setup().await;
        let mut first = active_execution("u1");
        first.started_at = now() - chrono::Duration::hours(2);
        let mut second = active_execution("u1");
        second.started_at = now() - chrono::Duration::hours(1);
        let other = active_execution("u2");

        log.record_start(&first).await.unwrap();
        log.record_start(&second).await.unwrap();
        log.record_start(&other).await.unwrap();

        let found = log.find_by_user(&UserId::from("u1"), 10).await.unwrap();
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].id, second.id);
        assert_eq!(found[1].id, first.id);
    }

    #[tokio::test]
    async fn should_limit_user_query_results() {
        let log = setup().await;
        for i in 0..5 {
            let mut execution = active_execution("u1");
            execution.started_at = now() - chrono::Duration::hours(i);
            log.record_start(&execution).await.unwrap();
        }

        let found = log.find_by_user(&UserId::from("u1"), 3).await.unwrap();
        assert_eq!(found.len(), 3);
    }

    #[tokio::test]
    async fn should_list_recent_executions_across_users() {
        let log = setup().await;
        log.record_start(&active_execution("u1")).await.unwrap();
        log.record_start(&active_execution("u2")).await.unwrap();

        let recent = log.get_recent(10).await.unwrap();
        assert_eq!(recent.len(), 2);
    }
}
