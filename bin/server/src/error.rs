//! HTTP-facing error type.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use nodeflow_workflow::{ExecutionStoreError, QueueError};
use serde_json::json;
use std::fmt;

/// Errors returned by the API handlers.
#[derive(Debug)]
pub enum ApiError {
    /// A required query parameter is absent.
    MissingParameter { name: &'static str },
    /// A path or query id does not parse.
    InvalidId { id: String, reason: String },
    /// The request body is not acceptable.
    InvalidPayload { reason: String },
    /// The requested resource does not exist.
    NotFound { resource: &'static str, id: String },
    /// The trigger queue rejected the event.
    Queue(QueueError),
    /// The backing store failed.
    Database { details: String },
    /// A setting the route needs is absent.
    NotConfigured { setting: &'static str },
    /// Telegram answered the request with `ok: false`.
    TelegramRejected { description: String },
    /// Telegram could not be reached or answered with garbage.
    TelegramUnavailable { reason: String },
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingParameter { name } => write!(f, "missing query parameter '{name}'"),
            Self::InvalidId { id, reason } => write!(f, "invalid id '{id}': {reason}"),
            Self::InvalidPayload { reason } => write!(f, "invalid payload: {reason}"),
            Self::NotFound { resource, id } => write!(f, "{resource} '{id}' not found"),
            Self::Queue(e) => write!(f, "{e}"),
            Self::Database { details } => write!(f, "database error: {details}"),
            Self::NotConfigured { setting } => write!(f, "{setting} is not configured"),
            Self::TelegramRejected { description } => write!(f, "Telegram Error: {description}"),
            Self::TelegramUnavailable { reason } => write!(f, "Telegram unavailable: {reason}"),
        }
    }
}

impl std::error::Error for ApiError {}

impl From<QueueError> for ApiError {
    fn from(e: QueueError) -> Self {
        Self::Queue(e)
    }
}

impl From<ExecutionStoreError> for ApiError {
    fn from(e: ExecutionStoreError) -> Self {
        Self::Database {
            details: e.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            Self::MissingParameter { .. }
            | Self::InvalidId { .. }
            | Self::InvalidPayload { .. }
            | Self::TelegramRejected { .. } => (StatusCode::BAD_REQUEST, self.to_string()),
            Self::NotFound { .. } => (StatusCode::NOT_FOUND, self.to_string()),
            Self::Queue(e) => {
                tracing::error!(error = %e, "Failed to enqueue trigger event");
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "Failed to queue workflow execution".to_string(),
                )
            }
            Self::Database { details } => {
                tracing::error!("Database error: {}", details);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
            Self::NotConfigured { setting } => {
                tracing::error!(setting, "Required setting is missing");
                (StatusCode::INTERNAL_SERVER_ERROR, self.to_string())
            }
            Self::TelegramUnavailable { reason } => {
                tracing::warn!(%reason, "Telegram request failed");
                (
                    StatusCode::BAD_GATEWAY,
                    "Failed to reach Telegram".to_string(),
                )
            }
        };

        (status, Json(json!({ "success": false, "error": message }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_errors_map_to_4xx() {
        let missing = ApiError::MissingParameter { name: "workflowId" }.into_response();
        let absent = ApiError::NotFound {
            resource: "execution",
            id: "exec_1".to_string(),
        }
        .into_response();

        assert_eq!(missing.status(), StatusCode::BAD_REQUEST);
        assert_eq!(absent.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn internal_errors_hide_details() {
        let error = ApiError::Database {
            details: "connection refused".to_string(),
        };
        assert_eq!(
            error.into_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );

        let queue: ApiError = QueueError::PublishFailed {
            message: "no responders".to_string(),
        }
        .into();
        assert_eq!(queue.into_response().status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn telegram_errors_keep_their_description() {
        let rejected = ApiError::TelegramRejected {
            description: "Unauthorized".to_string(),
        };
        assert_eq!(rejected.to_string(), "Telegram Error: Unauthorized");
        assert_eq!(rejected.into_response().status(), StatusCode::BAD_REQUEST);

        let unconfigured = ApiError::NotConfigured {
            setting: "public_base_url",
        };
        assert_eq!(
            unconfigured.into_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
