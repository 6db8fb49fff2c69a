//! Credential lookup for nodes that call authenticated APIs.

use async_trait::async_trait;
use nodeflow_core::CredentialId;
use nodeflow_workflow::NodeError;
use std::collections::HashMap;
use std::fmt;
use std::sync::Mutex;

/// Errors from credential operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialError {
    /// Credential not found.
    NotFound { id: CredentialId },
    /// The stored credential cannot be used.
    InvalidFormat { reason: String },
    /// Storage operation failed.
    StorageFailed { reason: String },
}

impl fmt::Display for CredentialError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound { id } => write!(f, "credential not found: {id}"),
            Self::InvalidFormat { reason } => write!(f, "invalid credential: {reason}"),
            Self::StorageFailed { reason } => write!(f, "credential storage failed: {reason}"),
        }
    }
}

impl std::error::Error for CredentialError {}

impl From<CredentialError> for NodeError {
    fn from(e: CredentialError) -> Self {
        match e {
            CredentialError::NotFound { .. } | CredentialError::InvalidFormat { .. } => {
                Self::validation(e.to_string())
            }
            CredentialError::StorageFailed { .. } => Self::transient(e.to_string()),
        }
    }
}

/// Read access to credential secrets.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Returns the secret value of a credential.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the credential does not exist.
    async fn secret(&self, id: CredentialId) -> Result<String, CredentialError>;
}

/// In-memory credential store.
#[derive(Default)]
pub struct InMemoryCredentialStore {
    secrets: Mutex<HashMap<CredentialId, String>>,
}

impl InMemoryCredentialStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a secret under a new id and returns the id.
    pub fn insert(&self, secret: impl Into<String>) -> CredentialId {
        let id = CredentialId::new();
        if let Ok(mut secrets) = self.secrets.lock() {
            secrets.insert(id, secret.into());
        }
        id
    }
}

#[async_trait]
impl CredentialStore for InMemoryCredentialStore {
    async fn secret(&self, id: CredentialId) -> Result<String, CredentialError> {
        let secrets = self
            .secrets
            .lock()
            .map_err(|e| CredentialError::StorageFailed {
                reason: e.to_string(),
            })?;
        secrets
            .get(&id)
            .cloned()
            .ok_or(CredentialError::NotFound { id })
    }
}
