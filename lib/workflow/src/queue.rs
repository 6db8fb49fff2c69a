//! The trigger event queue.
//!
//! Producers (HTTP handlers, webhooks) enqueue [`TriggerEvent`]s; a worker
//! takes each delivery, hands it to the [`RunDriver`] and settles it
//! according to [`Settlement`].

use crate::driver::{RunDriver, RunOutcome};
use crate::trigger::TriggerEvent;
use async_trait::async_trait;
use std::fmt;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

/// Errors from enqueueing a trigger event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueueError {
    /// The event could not be encoded.
    Encode { message: String },
    /// The queue did not accept the event.
    PublishFailed { message: String },
}

impl fmt::Display for QueueError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Encode { message } => write!(f, "failed to encode trigger event: {message}"),
            Self::PublishFailed { message } => {
                write!(f, "failed to enqueue trigger event: {message}")
            }
        }
    }
}

impl std::error::Error for QueueError {}

/// Accepts trigger events for asynchronous execution.
#[async_trait]
pub trait TriggerQueue: Send + Sync {
    /// Enqueues an event. Returns once the queue has accepted it.
    async fn enqueue(&self, event: &TriggerEvent) -> Result<(), QueueError>;
}

/// In-process queue backed by a tokio channel.
#[derive(Clone)]
pub struct ChannelTriggerQueue {
    sender: mpsc::Sender<TriggerEvent>,
}

impl ChannelTriggerQueue {
    /// Creates a queue and the receiver its events arrive on.
    #[must_use]
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<TriggerEvent>) {
        let (sender, receiver) = mpsc::channel(capacity);
        (Self { sender }, receiver)
    }
}

#[async_trait]
impl TriggerQueue for ChannelTriggerQueue {
    async fn enqueue(&self, event: &TriggerEvent) -> Result<(), QueueError> {
        self.sender
            .send(event.clone())
            .await
            .map_err(|e| QueueError::PublishFailed {
                message: e.to_string(),
            })
    }
}

/// What to do with a delivery once it has been handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Settlement {
    /// The run reached a terminal state; remove the message.
    Ack,
    /// Infrastructure failed; deliver the message again.
    Redeliver,
    /// The message can never be handled; drop it.
    Reject,
}

/// Decodes and handles one queued message.
pub async fn handle_delivery(driver: &RunDriver, payload: &[u8]) -> Settlement {
    let event = match TriggerEvent::from_message_bytes(payload) {
        Ok(event) => event,
        Err(e) => {
            error!(error = %e, "Dropping undecodable trigger event");
            return Settlement::Reject;
        }
    };

    match driver.handle(&event).await {
        Ok(RunOutcome::Succeeded(record) | RunOutcome::Failed(record)) => {
            info!(
                trigger_event_id = %event.id,
                execution_id = %record.id,
                status = %record.status,
                "Trigger event handled"
            );
            Settlement::Ack
        }
        Ok(RunOutcome::AlreadyFinished(_)) => Settlement::Ack,
        Err(report) => {
            warn!(trigger_event_id = %event.id, error = ?report, "Run interrupted; requesting redelivery");
            Settlement::Redeliver
        }
    }
}

/// Drives every event received on `receiver` to completion, one at a time.
///
/// Events that hit an infrastructure error are dropped with a warning; the
/// channel has no redelivery.
pub async fn drain_channel(driver: &RunDriver, mut receiver: mpsc::Receiver<TriggerEvent>) {
    while let Some(event) = receiver.recv().await {
        if let Err(report) = driver.handle(&event).await {
            warn!(trigger_event_id = %event.id, error = ?report, "Run interrupted");
        }
    }
}
