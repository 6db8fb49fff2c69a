//! Trigger events.
//!
//! A trigger event asks for one run of a workflow. Its id is the idempotency
//! key of the run: every delivery of the same event maps to the same
//! execution record.

use nodeflow_core::{TriggerEventId, WorkflowId};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use std::fmt;

/// Wire format version of queued trigger events.
pub const TRIGGER_EVENT_VERSION: u32 = 1;

/// What produced a trigger event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TriggerSource {
    /// A user started the workflow from the editor or API.
    #[default]
    Manual,
    /// A Telegram bot update.
    Telegram,
    /// A Google Form submission.
    GoogleForm,
}

impl fmt::Display for TriggerSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Manual => "manual",
            Self::Telegram => "telegram",
            Self::GoogleForm => "google_form",
        };
        f.write_str(name)
    }
}

/// A request to run a workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TriggerEvent {
    /// Idempotency key.
    pub id: TriggerEventId,
    /// The workflow to run.
    pub workflow_id: WorkflowId,
    /// Data that seeds the execution context.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initial_data: Option<Map<String, JsonValue>>,
    /// Origin of the event.
    #[serde(default)]
    pub source: TriggerSource,
}

impl TriggerEvent {
    /// Creates an event with a fresh id.
    #[must_use]
    pub fn new(workflow_id: WorkflowId, source: TriggerSource) -> Self {
        Self {
            id: TriggerEventId::new(),
            workflow_id,
            initial_data: None,
            source,
        }
    }

    /// Sets the initial data.
    #[must_use]
    pub fn with_initial_data(mut self, initial_data: Map<String, JsonValue>) -> Self {
        self.initial_data = Some(initial_data);
        self
    }

    /// Serializes the event for a queue.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_message_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(&QueuedTrigger {
            version: TRIGGER_EVENT_VERSION,
            event: self.clone(),
        })
    }

    /// Parses an event produced by [`TriggerEvent::to_message_bytes`].
    ///
    /// # Errors
    ///
    /// Returns an error if the bytes are not a trigger message or carry a
    /// version this build cannot read.
    pub fn from_message_bytes(bytes: &[u8]) -> Result<Self, TriggerDecodeError> {
        let queued: QueuedTrigger =
            serde_json::from_slice(bytes).map_err(|e| TriggerDecodeError::Malformed {
                message: e.to_string(),
            })?;
        if queued.version != TRIGGER_EVENT_VERSION {
            return Err(TriggerDecodeError::UnsupportedVersion {
                version: queued.version,
            });
        }
        Ok(queued.event)
    }
}

#[derive(Serialize, Deserialize)]
struct QueuedTrigger {
    version: u32,
    #[serde(flatten)]
    event: TriggerEvent,
}

/// Errors from decoding a queued trigger event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TriggerDecodeError {
    /// The payload is not valid JSON for a trigger event.
    Malformed { message: String },
    /// The payload uses an unknown wire version.
    UnsupportedVersion { version: u32 },
}

impl fmt::Display for TriggerDecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Malformed { message } => write!(f, "malformed trigger event: {message}"),
            Self::UnsupportedVersion { version } => {
                write!(f, "unsupported trigger event version {version}")
            }
        }
    }
}

impl std::error::Error for TriggerDecodeError {}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn message_bytes_carry_a_version() {
        let mut data = Map::new();
        data.insert("telegram".to_string(), json!({ "content": "hi" }));
        let event = TriggerEvent::new(WorkflowId::new(), TriggerSource::Telegram)
            .with_initial_data(data);

        let bytes = event.to_message_bytes().expect("serialize");
        let raw: JsonValue = serde_json::from_slice(&bytes).expect("json");
        assert_eq!(raw["version"], 1);
        assert_eq!(raw["source"], "telegram");

        let decoded = TriggerEvent::from_message_bytes(&bytes).expect("decode");
        assert_eq!(decoded, event);
    }

    #[test]
    fn rejects_future_versions() {
        let event = TriggerEvent::new(WorkflowId::new(), TriggerSource::Manual);
        let mut raw = serde_json::to_value(&event).expect("serialize");
        raw["version"] = json!(2);
        let bytes = serde_json::to_vec(&raw).expect("bytes");

        assert_eq!(
            TriggerEvent::from_message_bytes(&bytes),
            Err(TriggerDecodeError::UnsupportedVersion { version: 2 })
        );
    }

    #[test]
    fn rejects_garbage() {
        let result = TriggerEvent::from_message_bytes(b"not json");
        assert!(matches!(result, Err(TriggerDecodeError::Malformed { .. })));
    }
}
