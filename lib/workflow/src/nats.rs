//! NATS transports for the engine.
//!
//! - Trigger events travel through a JetStream work-queue stream. The
//!   consumer acks a message only once its run is terminal, so a crash mid-run
//!   leads to redelivery and the durable steps pick up where they left off.
//! - Node status events are published with core NATS on
//!   `workflow.status.<channel>`; subscribers that are not listening miss them.

use crate::driver::RunDriver;
use crate::queue::{QueueError, Settlement, TriggerQueue, handle_delivery};
use crate::status::{NodeStatusEvent, PublishError, StatusPublisher};
use crate::trigger::TriggerEvent;
use async_nats::jetstream;
use async_nats::jetstream::AckKind;
use async_trait::async_trait;
use futures::StreamExt;
use serde::Deserialize;
use std::fmt;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

/// Subject trigger events are published on.
const TRIGGER_SUBJECT: &str = "workflow.trigger.events";

/// Stream name for trigger events.
const TRIGGER_STREAM_NAME: &str = "WORKFLOW_TRIGGERS";

/// Durable consumer name of the run workers.
const CONSUMER_NAME: &str = "workflow-runner";

/// Subject prefix for node status events.
const STATUS_SUBJECT_PREFIX: &str = "workflow.status";

/// Deliveries of one trigger event before the consumer gives up on it.
const MAX_DELIVER: i64 = 10;

/// Delay before a nak'd trigger event is delivered again.
const REDELIVERY_DELAY: Duration = Duration::from_secs(5);

/// Configuration for the NATS transports.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NatsConfig {
    /// NATS server URL.
    pub url: String,
    /// Stream name for trigger events (defaults to WORKFLOW_TRIGGERS).
    #[serde(default)]
    pub trigger_stream_name: Option<String>,
    /// Subject for trigger events (defaults to workflow.trigger.events).
    #[serde(default)]
    pub trigger_subject: Option<String>,
    /// Durable consumer name (defaults to workflow-runner).
    #[serde(default)]
    pub consumer_name: Option<String>,
    /// Prefix of status subjects (defaults to workflow.status).
    #[serde(default)]
    pub status_subject_prefix: Option<String>,
    /// Deliveries per trigger event (defaults to 10).
    #[serde(default)]
    pub max_deliver: Option<i64>,
    /// Delay before a failed delivery is retried, in milliseconds
    /// (defaults to 5000).
    #[serde(default)]
    pub redelivery_delay_ms: Option<u64>,
}

impl NatsConfig {
    /// Creates a new config with the given NATS URL.
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            trigger_stream_name: None,
            trigger_subject: None,
            consumer_name: None,
            status_subject_prefix: None,
            max_deliver: None,
            redelivery_delay_ms: None,
        }
    }

    fn trigger_stream(&self) -> &str {
        self.trigger_stream_name
            .as_deref()
            .unwrap_or(TRIGGER_STREAM_NAME)
    }

    fn trigger_subject(&self) -> &str {
        self.trigger_subject.as_deref().unwrap_or(TRIGGER_SUBJECT)
    }

    fn consumer(&self) -> &str {
        self.consumer_name.as_deref().unwrap_or(CONSUMER_NAME)
    }

    fn max_deliver(&self) -> i64 {
        self.max_deliver.filter(|n| *n > 0).unwrap_or(MAX_DELIVER)
    }

    fn redelivery_delay(&self) -> Duration {
        self.redelivery_delay_ms
            .map_or(REDELIVERY_DELAY, Duration::from_millis)
    }

    fn status_prefix(&self) -> &str {
        self.status_subject_prefix
            .as_deref()
            .unwrap_or(STATUS_SUBJECT_PREFIX)
    }

    /// Returns the subject status events for `topic` are published on.
    #[must_use]
    pub fn status_subject(&self, topic: &str) -> String {
        format!("{}.{topic}", self.status_prefix())
    }
}

impl Default for NatsConfig {
    fn default() -> Self {
        Self::new("nats://localhost:4222")
    }
}

/// Errors from NATS setup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NatsSetupError {
    /// Could not connect to the server.
    Connect { message: String },
    /// Could not create or open the trigger stream.
    Stream { message: String },
    /// Could not create or open the consumer.
    Consumer { message: String },
}

impl fmt::Display for NatsSetupError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connect { message } => write!(f, "failed to connect to NATS: {message}"),
            Self::Stream { message } => write!(f, "trigger stream setup failed: {message}"),
            Self::Consumer { message } => write!(f, "trigger consumer setup failed: {message}"),
        }
    }
}

impl std::error::Error for NatsSetupError {}

/// Connects to the server named in `config`.
///
/// # Errors
///
/// Returns an error if the connection fails.
pub async fn connect(config: &NatsConfig) -> Result<async_nats::Client, NatsSetupError> {
    async_nats::connect(&config.url)
        .await
        .map_err(|e| NatsSetupError::Connect {
            message: e.to_string(),
        })
}

/// Status publisher over core NATS.
pub struct NatsStatusPublisher {
    client: async_nats::Client,
    config: NatsConfig,
}

impl NatsStatusPublisher {
    /// Creates a publisher on an existing connection.
    #[must_use]
    pub fn new(client: async_nats::Client, config: NatsConfig) -> Self {
        Self { client, config }
    }
}

#[async_trait]
impl StatusPublisher for NatsStatusPublisher {
    async fn publish(&self, topic: &str, event: NodeStatusEvent) -> Result<(), PublishError> {
        let bytes = serde_json::to_vec(&event).map_err(|e| PublishError {
            message: format!("failed to serialize status event: {e}"),
        })?;

        self.client
            .publish(self.config.status_subject(topic), bytes.into())
            .await
            .map_err(|e| PublishError {
                message: e.to_string(),
            })
    }
}

/// Trigger queue on a JetStream work-queue stream.
pub struct NatsTriggerQueue {
    jetstream: jetstream::Context,
    config: NatsConfig,
}

impl NatsTriggerQueue {
    /// Opens the queue, creating the stream if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the stream cannot be created.
    pub async fn new(client: async_nats::Client, config: NatsConfig) -> Result<Self, NatsSetupError> {
        let jetstream = jetstream::new(client);

        let stream_config = jetstream::stream::Config {
            name: config.trigger_stream().to_string(),
            subjects: vec![config.trigger_subject().to_string()],
            storage: jetstream::stream::StorageType::File,
            retention: jetstream::stream::RetentionPolicy::WorkQueue,
            ..Default::default()
        };

        jetstream
            .get_or_create_stream(stream_config)
            .await
            .map_err(|e| NatsSetupError::Stream {
                message: e.to_string(),
            })?;

        Ok(Self { jetstream, config })
    }

    /// Consumes trigger events until the message stream ends.
    ///
    /// Each message is handled to completion before the next is taken.
    ///
    /// # Errors
    ///
    /// Returns an error if the consumer cannot be created.
    #[instrument(skip(self, driver), fields(stream = self.config.trigger_stream(), consumer = self.config.consumer()))]
    pub async fn consume(&self, driver: &RunDriver) -> Result<(), NatsSetupError> {
        let stream = self
            .jetstream
            .get_stream(self.config.trigger_stream())
            .await
            .map_err(|e| NatsSetupError::Stream {
                message: e.to_string(),
            })?;

        let consumer = stream
            .get_or_create_consumer(
                self.config.consumer(),
                jetstream::consumer::pull::Config {
                    durable_name: Some(self.config.consumer().to_string()),
                    ack_policy: jetstream::consumer::AckPolicy::Explicit,
                    max_deliver: self.config.max_deliver(),
                    ..Default::default()
                },
            )
            .await
            .map_err(|e| NatsSetupError::Consumer {
                message: e.to_string(),
            })?;

        let mut messages = consumer
            .messages()
            .await
            .map_err(|e| NatsSetupError::Consumer {
                message: e.to_string(),
            })?;

        info!("Consuming trigger events");
        while let Some(message) = messages.next().await {
            let message = match message {
                Ok(message) => message,
                Err(e) => {
                    warn!(error = %e, "Failed to receive trigger event");
                    continue;
                }
            };

            let settlement = handle_delivery(driver, &message.payload).await;
            debug!(?settlement, "Settling trigger event");
            let result = match settlement {
                Settlement::Ack => message.ack().await,
                Settlement::Redeliver => {
                    message
                        .ack_with(AckKind::Nak(Some(self.config.redelivery_delay())))
                        .await
                }
                Settlement::Reject => message.ack_with(AckKind::Term).await,
            };
            if let Err(e) = result {
                warn!(error = %e, ?settlement, "Failed to settle trigger event");
            }
        }

        Ok(())
    }
}

#[async_trait]
impl TriggerQueue for NatsTriggerQueue {
    async fn enqueue(&self, event: &TriggerEvent) -> Result<(), QueueError> {
        let bytes = event.to_message_bytes().map_err(|e| QueueError::Encode {
            message: e.to_string(),
        })?;

        self.jetstream
            .publish(self.config.trigger_subject().to_string(), bytes.into())
            .await
            .map_err(|e| QueueError::PublishFailed {
                message: e.to_string(),
            })?
            .await
            .map_err(|e| QueueError::PublishFailed {
                message: e.to_string(),
            })?;

        debug!(trigger_event_id = %event.id, "Trigger event enqueued");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nats_config_defaults() {
        let config = NatsConfig::new("nats://localhost:4222");

        assert_eq!(config.trigger_stream(), TRIGGER_STREAM_NAME);
        assert_eq!(config.trigger_subject(), TRIGGER_SUBJECT);
        assert_eq!(config.consumer(), CONSUMER_NAME);
        assert_eq!(config.max_deliver(), MAX_DELIVER);
        assert_eq!(config.redelivery_delay(), REDELIVERY_DELAY);
        assert_eq!(
            config.status_subject("http-request-execution"),
            "workflow.status.http-request-execution"
        );
    }

    #[test]
    fn nats_config_custom() {
        let config = NatsConfig {
            url: "nats://localhost:4222".to_string(),
            trigger_stream_name: Some("CUSTOM_TRIGGERS".to_string()),
            trigger_subject: Some("custom.triggers".to_string()),
            consumer_name: Some("custom-runner".to_string()),
            status_subject_prefix: Some("custom.status".to_string()),
            max_deliver: Some(3),
            redelivery_delay_ms: Some(250),
        };

        assert_eq!(config.trigger_stream(), "CUSTOM_TRIGGERS");
        assert_eq!(config.trigger_subject(), "custom.triggers");
        assert_eq!(config.consumer(), "custom-runner");
        assert_eq!(config.status_subject("x"), "custom.status.x");
        assert_eq!(config.max_deliver(), 3);
        assert_eq!(config.redelivery_delay(), Duration::from_millis(250));
    }

    #[test]
    fn unbounded_redelivery_is_not_configurable() {
        let config = NatsConfig {
            max_deliver: Some(-1),
            ..NatsConfig::new("nats://localhost:4222")
        };
        assert_eq!(config.max_deliver(), MAX_DELIVER);
    }

    #[test]
    fn nats_config_deserializes_with_only_url() {
        let config: NatsConfig =
            serde_json::from_value(serde_json::json!({ "url": "nats://nats:4222" }))
                .expect("deserialize");
        assert_eq!(config, NatsConfig::new("nats://nats:4222"));
    }
}
