use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use tenvault_cloud::StorageError;
use tenvault_core::error::CoreError;
use tenvault_worker::TaskError;

/// Application-level error type for HTTP handlers.
///
/// Implements [`IntoResponse`] to produce `{ "error", "code" }` JSON bodies.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Rejected or failed task request.
    #[error(transparent)]
    Task(#[from] TaskError),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Internal error: {0}")]
    InternalError(String),
}

pub type AppResult<T> = Result<T, AppError>;

fn internal(error: &dyn std::fmt::Display) -> (StatusCode, &'static str, String) {
    tracing::error!(error = %error, "Internal error");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        "INTERNAL_ERROR",
        "An internal error occurred".to_string(),
    )
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::Core(core) => match core {
                CoreError::NotFound { entity, id } => (
                    StatusCode::NOT_FOUND,
                    "NOT_FOUND",
                    format!("{entity} with id {id} not found"),
                ),
                CoreError::Validation(msg) => {
                    (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone())
                }
                CoreError::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg.clone()),
                CoreError::Internal(msg) => internal(msg),
            },

            AppError::Task(task) => classify_task_error(task),

            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),
            AppError::InternalError(msg) => internal(msg),
        };

        let body = json!({
            "error": message,
            "code": code,
        });

        (status, axum::Json(body)).into_response()
    }
}

/// Map a task error raised while enqueueing or querying to an HTTP status.
///
/// - Invalid parameters and storage configs map to 400.
/// - Status store outages and a shutting-down scheduler map to 503.
/// - Everything else maps to 500 with a sanitized message.
fn classify_task_error(err: &TaskError) -> (StatusCode, &'static str, String) {
    match err {
        TaskError::Invalid(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
        TaskError::Storage(
            e @ (StorageError::InvalidConfig(_) | StorageError::InvalidPath(_)),
        ) => (StatusCode::BAD_REQUEST, "INVALID_STORAGE", e.to_string()),
        TaskError::Storage(e @ StorageError::NotFound(_)) => {
            (StatusCode::NOT_FOUND, "NOT_FOUND", e.to_string())
        }
        TaskError::Cancelled => (
            StatusCode::SERVICE_UNAVAILABLE,
            "SHUTTING_DOWN",
            "The task scheduler is shutting down".to_string(),
        ),
        TaskError::Status(msg) => {
            tracing::warn!(error = %msg, "Task status store unavailable");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                "STATUS_UNAVAILABLE",
                "Task status is temporarily unavailable".to_string(),
            )
        }
        other => internal(other),
    }
}
