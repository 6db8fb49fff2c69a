//! Credential secrets referenced by node configuration.

use async_trait::async_trait;
use nodeflow_core::CredentialId;
use nodeflow_nodes::{CredentialError, CredentialStore};
use sqlx::PgPool;

/// Repository for credential secrets.
#[derive(Clone)]
pub struct PgCredentialStore {
    pool: PgPool,
}

impl PgCredentialStore {
    /// Creates a new repository.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CredentialStore for PgCredentialStore {
    async fn secret(&self, id: CredentialId) -> Result<String, CredentialError> {
        let row: Option<(String,)> = sqlx::query_as(
            r#"
            SELECT value
            FROM credentials
            WHERE id = $1
            "#,
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| CredentialError::StorageFailed {
            reason: e.to_string(),
        })?;

        match row {
            Some((value,)) if value.trim().is_empty() => Err(CredentialError::InvalidFormat {
                reason: format!("credential {id} has an empty value"),
            }),
            Some((value,)) => Ok(value),
            None => Err(CredentialError::NotFound { id }),
        }
    }
}
