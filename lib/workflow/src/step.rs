//! Durable, memoized steps.
//!
//! Executors wrap each side effect in a named step. The first successful
//! result of a step is saved in a [`StepStore`] keyed by trigger event, node
//! and step name; when the same trigger event is delivered again the saved
//! output is returned and the work is not repeated. Transient failures are
//! retried according to the runner's [`RetryPolicy`].

use crate::error::NodeError;
use crate::node::NodeId;
use crate::retry::{RetryPolicy, retry_with_policy};
use async_trait::async_trait;
use futures::FutureExt;
use futures::future::BoxFuture;
use nodeflow_core::TriggerEventId;
use serde_json::Value as JsonValue;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex};
use tracing::instrument;

/// The work performed by one step. Called once per attempt.
pub type StepWork<'a> =
    Box<dyn FnMut() -> BoxFuture<'a, Result<JsonValue, NodeError>> + Send + 'a>;

/// Boxes a closure producing a future into [`StepWork`].
pub fn step_fn<'a, F, Fut>(mut f: F) -> StepWork<'a>
where
    F: FnMut() -> Fut + Send + 'a,
    Fut: Future<Output = Result<JsonValue, NodeError>> + Send + 'a,
{
    Box::new(move || f().boxed())
}

/// Identity of a step's saved output.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StepKey {
    /// The trigger event whose run executes the step.
    pub trigger_event_id: TriggerEventId,
    /// The node the step belongs to.
    pub node_id: NodeId,
    /// The step name, unique within the node.
    pub step_name: String,
}

/// Errors from step persistence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepStoreError {
    /// Failed to read a saved step.
    LoadFailed { message: String },
    /// Failed to save a step.
    SaveFailed { message: String },
}

impl fmt::Display for StepStoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LoadFailed { message } => write!(f, "step load failed: {message}"),
            Self::SaveFailed { message } => write!(f, "step save failed: {message}"),
        }
    }
}

impl std::error::Error for StepStoreError {}

/// Persistence for completed step outputs.
#[async_trait]
pub trait StepStore: Send + Sync {
    /// Returns the saved output of a step, if it completed before.
    async fn load(&self, key: &StepKey) -> Result<Option<JsonValue>, StepStoreError>;

    /// Saves the output of a completed step.
    ///
    /// Saving a key that already exists keeps the first output.
    async fn save(&self, key: &StepKey, output: &JsonValue) -> Result<(), StepStoreError>;
}

/// The step capability handed to executors.
#[async_trait]
pub trait StepRunner: Send + Sync {
    /// Runs `work` as the step `name` and returns its output.
    ///
    /// # Errors
    ///
    /// Returns the error of the last attempt, or an internal error if `name`
    /// was already used within this node.
    async fn run<'a>(&'a self, name: &'a str, work: StepWork<'a>) -> Result<JsonValue, NodeError>;
}

/// Step runner scoped to one node of one run.
pub struct DurableStepRunner {
    store: Arc<dyn StepStore>,
    trigger_event_id: TriggerEventId,
    node_id: NodeId,
    policy: RetryPolicy,
    used_names: Mutex<HashSet<String>>,
}

impl DurableStepRunner {
    /// Creates a runner for `node_id` in the run of `trigger_event_id`.
    #[must_use]
    pub fn new(
        store: Arc<dyn StepStore>,
        trigger_event_id: TriggerEventId,
        node_id: NodeId,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            store,
            trigger_event_id,
            node_id,
            policy,
            used_names: Mutex::new(HashSet::new()),
        }
    }

    fn claim_name(&self, name: &str) -> Result<(), NodeError> {
        let mut used = self
            .used_names
            .lock()
            .map_err(|e| NodeError::internal(format!("step registry poisoned: {e}")))?;
        if !used.insert(name.to_string()) {
            return Err(NodeError::internal(format!(
                "step name '{name}' used more than once in node {}",
                self.node_id
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl StepRunner for DurableStepRunner {
    #[instrument(skip(self, work), fields(trigger_event_id = %self.trigger_event_id, node_id = %self.node_id))]
    async fn run<'a>(&'a self, name: &'a str, mut work: StepWork<'a>) -> Result<JsonValue, NodeError> {
        self.claim_name(name)?;

        let key = StepKey {
            trigger_event_id: self.trigger_event_id,
            node_id: self.node_id.clone(),
            step_name: name.to_string(),
        };

        match self.store.load(&key).await {
            Ok(Some(output)) => {
                tracing::debug!(step = name, "Replaying memoized step output");
                return Ok(output);
            }
            Ok(None) => {}
            Err(e) => {
                return Err(NodeError::internal(format!(
                    "could not read step '{name}': {e}"
                )));
            }
        }

        let output = retry_with_policy(self.policy, |attempt| {
            tracing::debug!(step = name, attempt, "Running step");
            work()
        })
        .await?;

        if let Err(e) = self.store.save(&key, &output).await {
            tracing::warn!(error = %e, step = name, "Failed to save step output; it will run again on redelivery");
        }

        Ok(output)
    }
}

/// In-memory step store.
#[derive(Default)]
pub struct InMemoryStepStore {
    outputs: Mutex<HashMap<StepKey, JsonValue>>,
}

impl InMemoryStepStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of saved steps.
    #[must_use]
    pub fn len(&self) -> usize {
        self.outputs.lock().map(|o| o.len()).unwrap_or_default()
    }

    /// Returns true if no step has been saved.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl StepStore for InMemoryStepStore {
    async fn load(&self, key: &StepKey) -> Result<Option<JsonValue>, StepStoreError> {
        let outputs = self.outputs.lock().map_err(|e| StepStoreError::LoadFailed {
            message: e.to_string(),
        })?;
        Ok(outputs.get(key).cloned())
    }

    async fn save(&self, key: &StepKey, output: &JsonValue) -> Result<(), StepStoreError> {
        let mut outputs = self.outputs.lock().map_err(|e| StepStoreError::SaveFailed {
            message: e.to_string(),
        })?;
        outputs
            .entry(key.clone())
            .or_insert_with(|| output.clone());
        Ok(())
    }
}
