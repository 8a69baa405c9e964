//! Handlers for the `/backups`, `/restores` and `/reports` resources.
//!
//! Each resource enqueues one kind of task and answers status and
//! termination requests for it. Tasks are addressed by
//! `(origin, tenant, user)`; the origin defaults to the resource's kind.

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};
use tenvault_core::error::CoreError;
use tenvault_core::task::{TaskKey, TaskKind};
use tenvault_core::types::TenantId;
use tenvault_worker::{BackupParams, ReportParams, RestoreParams, TaskHandle, TaskSnapshot};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::response::DataResponse;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Identifies a task in status and terminate requests.
#[derive(Debug, Deserialize)]
pub struct TaskQuery {
    pub tenant: TenantId,
    pub user: Uuid,
    #[serde(default)]
    pub origin: Option<String>,
}

impl TaskQuery {
    fn key(self, kind: TaskKind) -> TaskKey {
        let origin = self
            .origin
            .filter(|o| !o.trim().is_empty())
            .unwrap_or_else(|| kind.as_str().to_string());
        TaskKey::new(origin, self.tenant, self.user)
    }
}

#[derive(Debug, Serialize)]
pub struct TerminateResponse {
    /// Whether an active task was found and signalled.
    pub terminated: bool,
}

/// 202 for a newly queued task, 200 when an active one was returned.
fn accepted(handle: TaskHandle) -> impl IntoResponse {
    let status = if handle.created {
        StatusCode::ACCEPTED
    } else {
        StatusCode::OK
    };
    (status, Json(DataResponse { data: handle }))
}

async fn status_of(
    state: &AppState,
    kind: TaskKind,
    query: TaskQuery,
) -> AppResult<Json<DataResponse<TaskSnapshot>>> {
    let key = query.key(kind);
    let snapshot = state
        .engine
        .status(&key)
        .await?
        .filter(|s| s.kind == kind)
        .ok_or_else(|| {
            AppError::Core(CoreError::NotFound {
                entity: "Task",
                id: key.to_string(),
            })
        })?;
    Ok(Json(DataResponse { data: snapshot }))
}

async fn terminate_of(
    state: &AppState,
    kind: TaskKind,
    query: TaskQuery,
) -> Json<DataResponse<TerminateResponse>> {
    let key = query.key(kind);
    let terminated = state.engine.terminate(&key).await;
    tracing::info!(key = %key, terminated, "Terminate requested");
    Json(DataResponse {
        data: TerminateResponse { terminated },
    })
}

// ---------------------------------------------------------------------------
// Backups
// ---------------------------------------------------------------------------

/// POST /api/v1/backups
pub async fn start_backup(
    State(state): State<AppState>,
    Json(input): Json<BackupParams>,
) -> AppResult<impl IntoResponse> {
    let handle = state.engine.start_backup(input).await?;
    Ok(accepted(handle))
}

/// GET /api/v1/backups/status?tenant=&user=&origin=
pub async fn backup_status(
    State(state): State<AppState>,
    Query(query): Query<TaskQuery>,
) -> AppResult<Json<DataResponse<TaskSnapshot>>> {
    status_of(&state, TaskKind::Backup, query).await
}

/// POST /api/v1/backups/terminate
pub async fn terminate_backup(
    State(state): State<AppState>,
    Json(query): Json<TaskQuery>,
) -> Json<DataResponse<TerminateResponse>> {
    terminate_of(&state, TaskKind::Backup, query).await
}

// ---------------------------------------------------------------------------
// Restores
// ---------------------------------------------------------------------------

/// POST /api/v1/restores
pub async fn start_restore(
    State(state): State<AppState>,
    Json(input): Json<RestoreParams>,
) -> AppResult<impl IntoResponse> {
    if input.path.trim().is_empty() {
        return Err(AppError::BadRequest("path must not be empty".into()));
    }
    let handle = state.engine.start_restore(input).await?;
    Ok(accepted(handle))
}

pub async fn restore_status(
    State(state): State<AppState>,
    Query(query): Query<TaskQuery>,
) -> AppResult<Json<DataResponse<TaskSnapshot>>> {
    status_of(&state, TaskKind::Restore, query).await
}

pub async fn terminate_restore(
    State(state): State<AppState>,
    Json(query): Json<TaskQuery>,
) -> Json<DataResponse<TerminateResponse>> {
    terminate_of(&state, TaskKind::Restore, query).await
}

// ---------------------------------------------------------------------------
// Reports
// ---------------------------------------------------------------------------

/// POST /api/v1/reports
pub async fn start_report(
    State(state): State<AppState>,
    Json(input): Json<ReportParams>,
) -> AppResult<impl IntoResponse> {
    let handle = state.engine.start_report(input).await?;
    Ok(accepted(handle))
}

pub async fn report_status(
    State(state): State<AppState>,
    Query(query): Query<TaskQuery>,
) -> AppResult<Json<DataResponse<TaskSnapshot>>> {
    status_of(&state, TaskKind::Report, query).await
}

pub async fn terminate_report(
    State(state): State<AppState>,
    Json(query): Json<TaskQuery>,
) -> Json<DataResponse<TerminateResponse>> {
    terminate_of(&state, TaskKind::Report, query).await
}
