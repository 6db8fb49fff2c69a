//! Webhook ingress for external trigger sources.
//!
//! Each handler turns the provider payload into the initial data of a
//! [`TriggerEvent`] and enqueues it. Runs happen asynchronously in the
//! worker; the response only confirms the event was queued.
//!
//! [`connect_telegram`] registers the Telegram webhook of a bot so that its
//! updates reach [`telegram`].

use crate::app::AppState;
use crate::error::ApiError;
use axum::Json;
use axum::extract::{Query, State};
use nodeflow_core::WorkflowId;
use nodeflow_nodes::telegram::DEFAULT_API_BASE;
use nodeflow_workflow::{TriggerEvent, TriggerSource};
use serde::Deserialize;
use serde_json::{Map, Value as JsonValue, json};
use tracing::{debug, info, instrument};

/// What the connect route needs to call `setWebhook`.
#[derive(Debug, Clone)]
pub struct TelegramConnect {
    client: reqwest::Client,
    api_base: String,
    public_base_url: Option<String>,
}

impl TelegramConnect {
    /// Creates the settings from the shared client, the Bot API base URL
    /// and this server's public base URL.
    #[must_use]
    pub fn new(
        client: reqwest::Client,
        api_base: impl Into<String>,
        public_base_url: Option<String>,
    ) -> Self {
        Self {
            client,
            api_base: api_base.into(),
            public_base_url,
        }
    }

    fn webhook_url(&self, workflow_id: WorkflowId) -> Result<String, ApiError> {
        let base = self
            .public_base_url
            .as_deref()
            .map(|url| url.trim_end_matches('/'))
            .filter(|url| !url.is_empty())
            .ok_or(ApiError::NotConfigured {
                setting: "public_base_url",
            })?;
        Ok(format!("{base}/api/webhooks/telegram?workflowId={workflow_id}"))
    }

    async fn set_webhook(&self, bot_token: &str, url: &str) -> Result<(), ApiError> {
        let endpoint = format!(
            "{}/bot{bot_token}/setWebhook",
            self.api_base.trim_end_matches('/')
        );
        // Telegram answers rejected calls with a 4xx and an `ok: false` body.
        let reply: SetWebhookReply = self
            .client
            .get(&endpoint)
            .query(&[("url", url)])
            .send()
            .await
            .map_err(|e| ApiError::TelegramUnavailable {
                reason: e.without_url().to_string(),
            })?
            .json()
            .await
            .map_err(|e| ApiError::TelegramUnavailable {
                reason: e.without_url().to_string(),
            })?;

        if reply.ok {
            Ok(())
        } else {
            Err(ApiError::TelegramRejected {
                description: reply
                    .description
                    .unwrap_or_else(|| "unknown error".to_string()),
            })
        }
    }
}

impl Default for TelegramConnect {
    fn default() -> Self {
        Self::new(reqwest::Client::new(), DEFAULT_API_BASE, None)
    }
}

#[derive(Debug, Deserialize)]
struct SetWebhookReply {
    ok: bool,
    #[serde(default)]
    description: Option<String>,
}

/// Body of the Telegram connect route.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectTelegramRequest {
    #[serde(default)]
    workflow_id: Option<String>,
    #[serde(default)]
    bot_token: Option<String>,
}

/// Query parameters shared by the webhook routes.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookParams {
    workflow_id: Option<String>,
}

impl WebhookParams {
    fn workflow_id(&self) -> Result<WorkflowId, ApiError> {
        let raw = self
            .workflow_id
            .as_deref()
            .filter(|id| !id.is_empty())
            .ok_or(ApiError::MissingParameter { name: "workflowId" })?;
        raw.parse().map_err(|e: nodeflow_core::ParseIdError| ApiError::InvalidId {
            id: raw.to_string(),
            reason: e.to_string(),
        })
    }
}

#[derive(Debug, Deserialize)]
struct TelegramUpdate {
    #[serde(default)]
    message: Option<TelegramMessage>,
}

#[derive(Debug, Deserialize)]
struct TelegramMessage {
    chat: TelegramChat,
    #[serde(default)]
    from: Option<TelegramUser>,
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    caption: Option<String>,
    #[serde(default)]
    photo: Option<Vec<TelegramFileRef>>,
    #[serde(default)]
    voice: Option<TelegramFileRef>,
    #[serde(default)]
    document: Option<TelegramDocument>,
}

#[derive(Debug, Deserialize)]
struct TelegramChat {
    id: i64,
}

#[derive(Debug, Deserialize)]
struct TelegramUser {
    #[serde(default)]
    username: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TelegramFileRef {
    file_id: String,
}

#[derive(Debug, Deserialize)]
struct TelegramDocument {
    file_id: String,
    #[serde(default)]
    file_name: Option<String>,
}

/// The message fields a TELEGRAM_TRIGGER node reads.
#[derive(Debug, Clone, PartialEq)]
struct ClassifiedMessage {
    content: String,
    file_id: Option<String>,
    media_type: &'static str,
}

impl TelegramMessage {
    /// Photo wins over voice, voice over document; anything else is text.
    fn classify(&self) -> ClassifiedMessage {
        let caption = self.caption.clone().unwrap_or_default();

        if let Some(largest) = self.photo.as_ref().and_then(|sizes| sizes.last()) {
            return ClassifiedMessage {
                content: caption,
                file_id: Some(largest.file_id.clone()),
                media_type: "image",
            };
        }
        if let Some(voice) = &self.voice {
            return ClassifiedMessage {
                content: self.text.clone().unwrap_or_default(),
                file_id: Some(voice.file_id.clone()),
                media_type: "voice",
            };
        }
        if let Some(document) = &self.document {
            let content = self
                .caption
                .clone()
                .or_else(|| document.file_name.clone())
                .unwrap_or_default();
            return ClassifiedMessage {
                content,
                file_id: Some(document.file_id.clone()),
                media_type: "document",
            };
        }

        ClassifiedMessage {
            content: self.text.clone().unwrap_or_default(),
            file_id: None,
            media_type: "text",
        }
    }
}

/// Builds the `telegram` initial data for an update, or `None` when the
/// update carries no message.
fn telegram_initial_data(raw: JsonValue) -> Result<Option<Map<String, JsonValue>>, ApiError> {
    let update: TelegramUpdate =
        serde_json::from_value(raw.clone()).map_err(|e| ApiError::InvalidPayload {
            reason: e.to_string(),
        })?;
    let Some(message) = update.message else {
        return Ok(None);
    };

    let classified = message.classify();
    let mut initial_data = Map::new();
    initial_data.insert(
        "telegram".to_string(),
        json!({
            "content": classified.content,
            "chatId": message.chat.id,
            "username": message.from.and_then(|u| u.username),
            "fileId": classified.file_id,
            "mediaType": classified.media_type,
            "raw": raw,
        }),
    );
    Ok(Some(initial_data))
}

/// `POST /api/webhooks/telegram?workflowId=`
#[instrument(skip(state, body))]
pub async fn telegram(
    State(state): State<AppState>,
    Query(params): Query<WebhookParams>,
    Json(body): Json<JsonValue>,
) -> Result<Json<JsonValue>, ApiError> {
    let workflow_id = params.workflow_id()?;

    let Some(initial_data) = telegram_initial_data(body)? else {
        debug!(%workflow_id, "Ignoring Telegram update without a message");
        return Ok(Json(json!({ "ok": true })));
    };

    let event = TriggerEvent::new(workflow_id, TriggerSource::Telegram)
        .with_initial_data(initial_data);
    state.queue.enqueue(&event).await?;
    info!(%workflow_id, trigger_event_id = %event.id, "Queued Telegram trigger");

    Ok(Json(json!({ "success": true })))
}

/// `POST /api/webhooks/google-form?workflowId=`
#[instrument(skip(state, body))]
pub async fn google_form(
    State(state): State<AppState>,
    Query(params): Query<WebhookParams>,
    Json(body): Json<JsonValue>,
) -> Result<Json<JsonValue>, ApiError> {
    let workflow_id = params.workflow_id()?;

    let mut initial_data = Map::new();
    initial_data.insert("googleForm".to_string(), body);
    let event = TriggerEvent::new(workflow_id, TriggerSource::GoogleForm)
        .with_initial_data(initial_data);
    state.queue.enqueue(&event).await?;
    info!(%workflow_id, trigger_event_id = %event.id, "Queued Google Form trigger");

    Ok(Json(json!({ "success": true })))
}

/// `POST /api/integrations/telegram` with `{workflowId, botToken}`
#[instrument(skip(state, body))]
pub async fn connect_telegram(
    State(state): State<AppState>,
    Json(body): Json<ConnectTelegramRequest>,
) -> Result<Json<JsonValue>, ApiError> {
    let non_empty = |value: Option<String>| value.filter(|v| !v.trim().is_empty());
    let (Some(workflow_id), Some(bot_token)) =
        (non_empty(body.workflow_id), non_empty(body.bot_token))
    else {
        return Err(ApiError::InvalidPayload {
            reason: "missing workflowId or botToken".to_string(),
        });
    };
    let workflow_id = WebhookParams {
        workflow_id: Some(workflow_id),
    }
    .workflow_id()?;

    let url = state.telegram.webhook_url(workflow_id)?;
    state.telegram.set_webhook(&bot_token, &url).await?;
    info!(%workflow_id, "Registered Telegram webhook");

    Ok(Json(json!({ "success": true })))
}
