//! Memoized outputs of durable steps.

use async_trait::async_trait;
use nodeflow_workflow::{StepKey, StepStore, StepStoreError};
use serde_json::Value as JsonValue;
use sqlx::PgPool;

/// Repository for completed step outputs.
#[derive(Clone)]
pub struct PgStepStore {
    pool: PgPool,
}

impl PgStepStore {
    /// Creates a new repository.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl StepStore for PgStepStore {
    async fn load(&self, key: &StepKey) -> Result<Option<JsonValue>, StepStoreError> {
        let output: Option<(JsonValue,)> = sqlx::query_as(
            r#"
            SELECT output
            FROM step_outputs
            WHERE trigger_event_id = $1 AND node_id = $2 AND step_name = $3
            "#,
        )
        .bind(key.trigger_event_id.to_string())
        .bind(key.node_id.as_str())
        .bind(&key.step_name)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StepStoreError::LoadFailed {
            message: e.to_string(),
        })?;

        Ok(output.map(|(output,)| output))
    }

    async fn save(&self, key: &StepKey, output: &JsonValue) -> Result<(), StepStoreError> {
        sqlx::query(
            r#"
            INSERT INTO step_outputs (trigger_event_id, node_id, step_name, output)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (trigger_event_id, node_id, step_name) DO NOTHING
            "#,
        )
        .bind(key.trigger_event_id.to_string())
        .bind(key.node_id.as_str())
        .bind(&key.step_name)
        .bind(output)
        .execute(&self.pool)
        .await
        .map_err(|e| StepStoreError::SaveFailed {
            message: e.to_string(),
        })?;

        Ok(())
    }
}
