//! Execution records, one per trigger event.

use super::decode_error;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use nodeflow_core::{ExecutionId, TriggerEventId, WorkflowId};
use nodeflow_workflow::{
    BeginOutcome, ExecutionRecord, ExecutionStatus, ExecutionStore, ExecutionStoreError,
    TerminalOutcome,
};
use serde_json::Value as JsonValue;
use sqlx::{FromRow, PgPool};
use std::str::FromStr;
use tracing::instrument;

/// Row type for execution queries.
#[derive(FromRow)]
struct ExecutionRow {
    id: String,
    workflow_id: String,
    trigger_event_id: String,
    status: String,
    started_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
    output: Option<JsonValue>,
    error: Option<String>,
    error_stack: Option<String>,
}

impl ExecutionRow {
    fn try_into_record(self) -> Result<ExecutionRecord, sqlx::Error> {
        let id = ExecutionId::from_str(&self.id)
            .map_err(|e| decode_error("execution id", &self.id, e))?;
        let workflow_id = WorkflowId::from_str(&self.workflow_id)
            .map_err(|e| decode_error("workflow id", &self.workflow_id, e))?;
        let trigger_event_id = TriggerEventId::from_str(&self.trigger_event_id)
            .map_err(|e| decode_error("trigger event id", &self.trigger_event_id, e))?;
        let status = ExecutionStatus::from_str(&self.status)
            .map_err(|e| decode_error("status", &self.status, e))?;

        Ok(ExecutionRecord {
            id,
            workflow_id,
            trigger_event_id,
            status,
            started_at: self.started_at,
            completed_at: self.completed_at,
            output: self.output,
            error: self.error,
            error_stack: self.error_stack,
        })
    }
}

const SELECT_COLUMNS: &str = "SELECT id, workflow_id, trigger_event_id, status, started_at, \
     completed_at, output, error, error_stack FROM executions";

fn storage(e: sqlx::Error) -> ExecutionStoreError {
    ExecutionStoreError::Storage {
        message: e.to_string(),
    }
}

/// Repository for execution records.
#[derive(Clone)]
pub struct PgExecutionStore {
    pool: PgPool,
}

impl PgExecutionStore {
    /// Creates a new repository.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn fetch_one_where(
        &self,
        column: &str,
        value: String,
    ) -> Result<Option<ExecutionRecord>, ExecutionStoreError> {
        let row: Option<ExecutionRow> =
            sqlx::query_as(&format!("{SELECT_COLUMNS} WHERE {column} = $1"))
                .bind(value)
                .fetch_optional(&self.pool)
                .await
                .map_err(storage)?;

        row.map(ExecutionRow::try_into_record)
            .transpose()
            .map_err(storage)
    }
}

#[async_trait]
impl ExecutionStore for PgExecutionStore {
    #[instrument(skip(self, record), fields(trigger_event_id = %record.trigger_event_id))]
    async fn begin(&self, record: ExecutionRecord) -> Result<BeginOutcome, ExecutionStoreError> {
        let inserted = sqlx::query(
            r#"
            INSERT INTO executions
                (id, workflow_id, trigger_event_id, status, started_at,
                 completed_at, output, error, error_stack)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (trigger_event_id) DO NOTHING
            "#,
        )
        .bind(record.id.to_string())
        .bind(record.workflow_id.to_string())
        .bind(record.trigger_event_id.to_string())
        .bind(record.status.as_str())
        .bind(record.started_at)
        .bind(record.completed_at)
        .bind(&record.output)
        .bind(&record.error)
        .bind(&record.error_stack)
        .execute(&self.pool)
        .await
        .map_err(storage)?
        .rows_affected();

        if inserted == 1 {
            return Ok(BeginOutcome::Created(record));
        }

        self.find_by_trigger_event(record.trigger_event_id)
            .await?
            .map(BeginOutcome::Existing)
            .ok_or(ExecutionStoreError::NotFound {
                trigger_event_id: record.trigger_event_id,
            })
    }

    #[instrument(skip(self, outcome))]
    async fn finish(
        &self,
        trigger_event_id: TriggerEventId,
        outcome: TerminalOutcome,
    ) -> Result<ExecutionRecord, ExecutionStoreError> {
        let (status, output, error, error_stack) = match outcome {
            TerminalOutcome::Success { output } => (ExecutionStatus::Success, Some(output), None, None),
            TerminalOutcome::Failed { error, error_stack } => {
                (ExecutionStatus::Failed, None, Some(error), Some(error_stack))
            }
        };

        // Terminal records are immutable; the status guard makes this a no-op for them.
        sqlx::query(
            r#"
            UPDATE executions
            SET status = $2, completed_at = $3, output = $4, error = $5, error_stack = $6
            WHERE trigger_event_id = $1 AND status = 'RUNNING'
            "#,
        )
        .bind(trigger_event_id.to_string())
        .bind(status.as_str())
        .bind(Utc::now())
        .bind(&output)
        .bind(&error)
        .bind(&error_stack)
        .execute(&self.pool)
        .await
        .map_err(storage)?;

        self.find_by_trigger_event(trigger_event_id)
            .await?
            .ok_or(ExecutionStoreError::NotFound { trigger_event_id })
    }

    async fn get(&self, id: ExecutionId) -> Result<Option<ExecutionRecord>, ExecutionStoreError> {
        self.fetch_one_where("id", id.to_string()).await
    }

    async fn find_by_trigger_event(
        &self,
        trigger_event_id: TriggerEventId,
    ) -> Result<Option<ExecutionRecord>, ExecutionStoreError> {
        self.fetch_one_where("trigger_event_id", trigger_event_id.to_string())
            .await
    }
}
