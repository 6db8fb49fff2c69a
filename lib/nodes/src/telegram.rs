//! The TELEGRAM_TRIGGER node.
//!
//! The webhook stores the classified message under `telegram` in the initial
//! data. This node normalizes it into `telegramNode`, resolving a download
//! URL through the Bot API when the message carries a file and the node has
//! a `botToken`.

use crate::http::{request_error, status_error};
use async_trait::async_trait;
use chrono::Utc;
use nodeflow_workflow::{ExecutionContext, NodeError, NodeExecutor, NodeInvocation, step_fn};
use reqwest::Client;
use serde::Deserialize;
use serde_json::{Value as JsonValue, json};
use tracing::{debug, instrument};

const STEP_NAME: &str = "process-telegram-payload";

/// Context key the webhook writes the message under.
pub const TELEGRAM_CONTEXT_KEY: &str = "telegram";

/// Base URL of the Telegram Bot API.
pub const DEFAULT_API_BASE: &str = "https://api.telegram.org";

/// Configuration of the Telegram executor.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TelegramConfig {
    /// Bot API base URL.
    #[serde(default = "default_api_base")]
    pub api_base: String,
}

fn default_api_base() -> String {
    DEFAULT_API_BASE.to_string()
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            api_base: default_api_base(),
        }
    }
}

/// The message as stored by the webhook.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TelegramMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    chat_id: JsonValue,
    #[serde(default)]
    username: Option<String>,
    #[serde(default)]
    file_id: Option<String>,
    #[serde(default)]
    media_type: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GetFileResponse {
    ok: bool,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    result: Option<TelegramFile>,
}

#[derive(Debug, Deserialize)]
struct TelegramFile {
    file_path: String,
    #[serde(default)]
    file_size: Option<u64>,
}

/// Executor for TELEGRAM_TRIGGER nodes.
#[derive(Debug)]
pub struct TelegramTriggerExecutor {
    client: Client,
    api_base: String,
}

impl TelegramTriggerExecutor {
    /// Creates an executor.
    #[must_use]
    pub fn new(client: Client, config: &TelegramConfig) -> Self {
        Self {
            client,
            api_base: config.api_base.trim_end_matches('/').to_string(),
        }
    }

    async fn process(
        &self,
        message: &TelegramMessage,
        bot_token: Option<&str>,
    ) -> Result<JsonValue, NodeError> {
        let file = match (message.file_id.as_deref(), bot_token) {
            (Some(file_id), Some(token)) => Some(self.resolve_file(file_id, token).await?),
            _ => None,
        };

        Ok(json!({
            "chatId": message.chat_id,
            "username": message.username,
            "sentAt": Utc::now().to_rfc3339(),
            "mediaType": message.media_type.as_deref().unwrap_or("text"),
            "isMedia": file.is_some(),
            "text": message.content,
            "file": file,
        }))
    }

    async fn resolve_file(&self, file_id: &str, token: &str) -> Result<JsonValue, NodeError> {
        debug!(file_id, "Resolving Telegram file");
        let response = self
            .client
            .get(format!("{}/bot{token}/getFile", self.api_base))
            .query(&[("file_id", file_id)])
            .send()
            .await
            .map_err(request_error)?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| NodeError::transient(format!("failed to read getFile response: {e}")))?;
        if status.is_server_error() || status.as_u16() == 429 {
            return Err(status_error(status, &text));
        }

        let body: GetFileResponse = serde_json::from_str(&text)
            .map_err(|e| NodeError::internal(format!("malformed getFile response: {e}")))?;
        let file = match body.result {
            Some(file) if body.ok && status.is_success() => file,
            _ => {
                return Err(NodeError::internal(format!(
                    "Telegram API error: {}",
                    body.description.as_deref().unwrap_or("unknown error")
                )));
            }
        };

        let extension = file.file_path.rsplit('.').next().unwrap_or_default();
        Ok(json!({
            "url": format!("{}/file/bot{token}/{}", self.api_base, file.file_path),
            "fileId": file_id,
            "filePath": file.file_path,
            "extension": extension,
            "size": file.file_size,
        }))
    }
}

#[async_trait]
impl NodeExecutor for TelegramTriggerExecutor {
    #[instrument(skip_all, fields(node_id = %invocation.node_id()))]
    async fn execute(&self, invocation: NodeInvocation<'_>) -> Result<ExecutionContext, NodeError> {
        invocation
            .run_with_status(|| async {
                let raw = invocation.context.get(TELEGRAM_CONTEXT_KEY).ok_or_else(|| {
                    NodeError::validation(format!(
                        "{} node {}: no '{TELEGRAM_CONTEXT_KEY}' data in the trigger payload",
                        invocation.node_type(),
                        invocation.node_id()
                    ))
                })?;
                let message: TelegramMessage = serde_json::from_value(raw.clone())
                    .map_err(|e| NodeError::validation(format!("malformed telegram payload: {e}")))?;
                let bot_token = invocation.optional_str("botToken");

                let message = &message;
                let output = invocation
                    .steps
                    .run(STEP_NAME, step_fn(move || self.process(message, bot_token)))
                    .await?;

                let key = invocation.node.output_key().unwrap_or("telegramNode");
                Ok(invocation.context.with_output(key, output))
            })
            .await
    }
}
