//! Execution records.
//!
//! One record exists per trigger event. It is created RUNNING when the run
//! starts and written once more when the run reaches SUCCESS or FAILED.
//! After that it never changes, even if the run is driven again.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use nodeflow_core::{ExecutionId, TriggerEventId, WorkflowId};
use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Mutex;

/// Status of a workflow execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExecutionStatus {
    /// The run is in progress.
    Running,
    /// Every node completed.
    Success,
    /// The run stopped at an error.
    Failed,
}

impl ExecutionStatus {
    /// Returns the persisted name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Running => "RUNNING",
            Self::Success => "SUCCESS",
            Self::Failed => "FAILED",
        }
    }

    /// Returns true for SUCCESS and FAILED.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Success | Self::Failed)
    }
}

impl fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExecutionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "RUNNING" => Ok(Self::Running),
            "SUCCESS" => Ok(Self::Success),
            "FAILED" => Ok(Self::Failed),
            other => Err(format!("unknown execution status: {other}")),
        }
    }
}

/// The persisted record of one workflow run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionRecord {
    /// Record id.
    pub id: ExecutionId,
    /// The workflow that ran.
    pub workflow_id: WorkflowId,
    /// Idempotency key of the trigger event.
    pub trigger_event_id: TriggerEventId,
    /// Current status.
    pub status: ExecutionStatus,
    /// When the run started.
    pub started_at: DateTime<Utc>,
    /// When the run reached a terminal status.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    /// Final context of a successful run.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<JsonValue>,
    /// Error message of a failed run.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Full error report of a failed run.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_stack: Option<String>,
}

impl ExecutionRecord {
    /// Creates a RUNNING record.
    #[must_use]
    pub fn start(workflow_id: WorkflowId, trigger_event_id: TriggerEventId) -> Self {
        Self {
            id: ExecutionId::new(),
            workflow_id,
            trigger_event_id,
            status: ExecutionStatus::Running,
            started_at: Utc::now(),
            completed_at: None,
            output: None,
            error: None,
            error_stack: None,
        }
    }

    /// Applies a terminal outcome if the record is still RUNNING.
    ///
    /// Returns false and leaves the record unchanged otherwise.
    pub fn finish(&mut self, outcome: &TerminalOutcome, at: DateTime<Utc>) -> bool {
        if self.status.is_terminal() {
            return false;
        }
        match outcome {
            TerminalOutcome::Success { output } => {
                self.status = ExecutionStatus::Success;
                self.output = Some(output.clone());
            }
            TerminalOutcome::Failed { error, error_stack } => {
                self.status = ExecutionStatus::Failed;
                self.error = Some(error.clone());
                self.error_stack = Some(error_stack.clone());
            }
        }
        self.completed_at = Some(at);
        true
    }
}

/// How a run ended.
#[derive(Debug, Clone, PartialEq)]
pub enum TerminalOutcome {
    /// All nodes completed with this final context.
    Success { output: JsonValue },
    /// The run failed.
    Failed { error: String, error_stack: String },
}

/// Result of starting a run.
#[derive(Debug, Clone, PartialEq)]
pub enum BeginOutcome {
    /// A new RUNNING record was stored.
    Created(ExecutionRecord),
    /// A record for the trigger event already existed.
    Existing(ExecutionRecord),
}

impl BeginOutcome {
    /// Returns the record regardless of outcome.
    #[must_use]
    pub fn record(&self) -> &ExecutionRecord {
        match self {
            Self::Created(record) | Self::Existing(record) => record,
        }
    }
}

/// Errors from execution record persistence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionStoreError {
    /// No record exists for the trigger event.
    NotFound { trigger_event_id: TriggerEventId },
    /// The backing store failed.
    Storage { message: String },
}

impl fmt::Display for ExecutionStoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound { trigger_event_id } => {
                write!(f, "no execution for trigger event {trigger_event_id}")
            }
            Self::Storage { message } => write!(f, "execution store error: {message}"),
        }
    }
}

impl std::error::Error for ExecutionStoreError {}

/// Persistence for execution records, keyed by trigger event id.
#[async_trait]
pub trait ExecutionStore: Send + Sync {
    /// Stores `record` unless a record for its trigger event exists.
    async fn begin(&self, record: ExecutionRecord) -> Result<BeginOutcome, ExecutionStoreError>;

    /// Moves the record for `trigger_event_id` to a terminal status.
    ///
    /// Has no effect on a record that is already terminal. Returns the
    /// record as stored after the call.
    async fn finish(
        &self,
        trigger_event_id: TriggerEventId,
        outcome: TerminalOutcome,
    ) -> Result<ExecutionRecord, ExecutionStoreError>;

    /// Returns a record by id.
    async fn get(&self, id: ExecutionId) -> Result<Option<ExecutionRecord>, ExecutionStoreError>;

    /// Returns the record for a trigger event.
    async fn find_by_trigger_event(
        &self,
        trigger_event_id: TriggerEventId,
    ) -> Result<Option<ExecutionRecord>, ExecutionStoreError>;
}

/// In-memory execution store.
#[derive(Default)]
pub struct InMemoryExecutionStore {
    records: Mutex<HashMap<TriggerEventId, ExecutionRecord>>,
}

impl InMemoryExecutionStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of stored records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.lock().map(|r| r.len()).unwrap_or_default()
    }

    /// Returns true if nothing is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(
        &self,
    ) -> Result<std::sync::MutexGuard<'_, HashMap<TriggerEventId, ExecutionRecord>>, ExecutionStoreError>
    {
        self.records.lock().map_err(|e| ExecutionStoreError::Storage {
            message: e.to_string(),
        })
    }
}

#[async_trait]
impl ExecutionStore for InMemoryExecutionStore {
    async fn begin(&self, record: ExecutionRecord) -> Result<BeginOutcome, ExecutionStoreError> {
        let mut records = self.lock()?;
        if let Some(existing) = records.get(&record.trigger_event_id) {
            return Ok(BeginOutcome::Existing(existing.clone()));
        }
        records.insert(record.trigger_event_id, record.clone());
        Ok(BeginOutcome::Created(record))
    }

    async fn finish(
        &self,
        trigger_event_id: TriggerEventId,
        outcome: TerminalOutcome,
    ) -> Result<ExecutionRecord, ExecutionStoreError> {
        let mut records = self.lock()?;
        let record = records
            .get_mut(&trigger_event_id)
            .ok_or(ExecutionStoreError::NotFound { trigger_event_id })?;
        record.finish(&outcome, Utc::now());
        Ok(record.clone())
    }

    async fn get(&self, id: ExecutionId) -> Result<Option<ExecutionRecord>, ExecutionStoreError> {
        let records = self.lock()?;
        Ok(records.values().find(|r| r.id == id).cloned())
    }

    async fn find_by_trigger_event(
        &self,
        trigger_event_id: TriggerEventId,
    ) -> Result<Option<ExecutionRecord>, ExecutionStoreError> {
        let records = self.lock()?;
        Ok(records.get(&trigger_event_id).cloned())
    }
}
