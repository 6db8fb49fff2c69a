//! HTTP routes.

use crate::error::ApiError;
use crate::webhook::{self, TelegramConnect};
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use nodeflow_core::{ExecutionId, ParseIdError, WorkflowId};
use nodeflow_workflow::{ExecutionRecord, ExecutionStore, TriggerEvent, TriggerQueue, TriggerSource};
use serde::Deserialize;
use serde_json::{Map, Value as JsonValue, json};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::{info, instrument};

/// Shared state of the HTTP handlers.
#[derive(Clone)]
pub struct AppState {
    /// Where trigger events are sent.
    pub queue: Arc<dyn TriggerQueue>,
    /// Execution records, for status lookups.
    pub executions: Arc<dyn ExecutionStore>,
    /// Settings of the Telegram connect route.
    pub telegram: TelegramConnect,
}

impl AppState {
    /// Creates the state. The Telegram connect route is unconfigured until
    /// [`AppState::with_telegram`] is called.
    #[must_use]
    pub fn new(queue: Arc<dyn TriggerQueue>, executions: Arc<dyn ExecutionStore>) -> Self {
        Self {
            queue,
            executions,
            telegram: TelegramConnect::default(),
        }
    }

    #[must_use]
    pub fn with_telegram(mut self, telegram: TelegramConnect) -> Self {
        self.telegram = telegram;
        self
    }
}

/// Builds the application router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/workflows/{workflow_id}/execute", post(execute_workflow))
        .route("/api/executions/{execution_id}", get(get_execution))
        .route("/api/webhooks/telegram", post(webhook::telegram))
        .route("/api/webhooks/google-form", post(webhook::google_form))
        .route("/api/integrations/telegram", post(webhook::connect_telegram))
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
        .with_state(state)
}

async fn health() -> Json<JsonValue> {
    Json(json!({ "status": "ok" }))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ExecuteRequest {
    #[serde(default)]
    initial_data: Option<Map<String, JsonValue>>,
}

fn parse_id<T>(raw: &str) -> Result<T, ApiError>
where
    T: std::str::FromStr<Err = ParseIdError>,
{
    raw.parse().map_err(|e: ParseIdError| ApiError::InvalidId {
        id: raw.to_string(),
        reason: e.to_string(),
    })
}

/// `POST /api/workflows/{workflow_id}/execute`
///
/// An empty body runs the workflow without initial data.
#[instrument(skip(state, body))]
async fn execute_workflow(
    State(state): State<AppState>,
    Path(workflow_id): Path<String>,
    body: Bytes,
) -> Result<(StatusCode, Json<JsonValue>), ApiError> {
    let workflow_id: WorkflowId = parse_id(&workflow_id)?;
    let request: ExecuteRequest = if body.is_empty() {
        ExecuteRequest::default()
    } else {
        serde_json::from_slice(&body).map_err(|e| ApiError::InvalidPayload {
            reason: e.to_string(),
        })?
    };

    let mut event = TriggerEvent::new(workflow_id, TriggerSource::Manual);
    event.initial_data = request.initial_data;
    state.queue.enqueue(&event).await?;
    info!(%workflow_id, trigger_event_id = %event.id, "Queued manual trigger");

    Ok((
        StatusCode::ACCEPTED,
        Json(json!({ "triggerEventId": event.id.to_string() })),
    ))
}

/// `GET /api/executions/{execution_id}`
#[instrument(skip(state))]
async fn get_execution(
    State(state): State<AppState>,
    Path(execution_id): Path<String>,
) -> Result<Json<ExecutionRecord>, ApiError> {
    let id: ExecutionId = parse_id(&execution_id)?;
    let record = state
        .executions
        .get(id)
        .await?
        .ok_or(ApiError::NotFound {
            resource: "execution",
            id: execution_id,
        })?;
    Ok(Json(record))
}
