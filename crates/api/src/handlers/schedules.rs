//! Handlers for the `/schedules/{tenant_id}` resource.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use serde::Deserialize;
use tenvault_cloud::StorageConfig;
use tenvault_core::error::CoreError;
use tenvault_core::types::TenantId;
use tenvault_worker::{BackupPeriod, BackupSchedule};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::response::DataResponse;
use crate::state::AppState;

/// Request body of `PUT /schedules/{tenant_id}`.
#[derive(Debug, Deserialize)]
pub struct ScheduleInput {
    pub user: Uuid,
    pub period: BackupPeriod,
    pub backups_stored: usize,
    #[serde(default)]
    pub storage: Option<StorageConfig>,
    #[serde(default)]
    pub utc_offset_minutes: i32,
}

fn not_found(tenant: TenantId) -> AppError {
    AppError::Core(CoreError::NotFound {
        entity: "BackupSchedule",
        id: tenant.to_string(),
    })
}

/// GET /api/v1/schedules/{tenant_id}
pub async fn get_schedule(
    State(state): State<AppState>,
    Path(tenant): Path<TenantId>,
) -> AppResult<Json<DataResponse<BackupSchedule>>> {
    let schedule = state
        .engine
        .schedules()
        .get(tenant)
        .await
        .ok_or_else(|| not_found(tenant))?;
    Ok(Json(DataResponse { data: schedule }))
}

/// PUT /api/v1/schedules/{tenant_id}
///
/// Create or replace the tenant's schedule. The next run is counted from
/// now.
pub async fn put_schedule(
    State(state): State<AppState>,
    Path(tenant): Path<TenantId>,
    Json(input): Json<ScheduleInput>,
) -> AppResult<Json<DataResponse<BackupSchedule>>> {
    let schedule = BackupSchedule {
        tenant,
        user: input.user,
        period: input.period,
        backups_stored: input.backups_stored,
        storage: input.storage,
        utc_offset_minutes: input.utc_offset_minutes,
    };
    state
        .engine
        .schedules()
        .put(schedule.clone(), Utc::now())
        .await
        .map_err(|msg| AppError::Core(CoreError::Validation(msg)))?;
    Ok(Json(DataResponse { data: schedule }))
}

/// DELETE /api/v1/schedules/{tenant_id}
pub async fn delete_schedule(
    State(state): State<AppState>,
    Path(tenant): Path<TenantId>,
) -> AppResult<StatusCode> {
    if state.engine.schedules().remove(tenant).await {
        tracing::info!(tenant_id = tenant, "Backup schedule deleted");
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(not_found(tenant))
    }
}
