//! Route definitions for the task resources.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::tasks;
use crate::state::AppState;

/// Routes mounted at `/backups`.
///
/// ```text
/// POST   /                -> start_backup
/// GET    /status          -> backup_status
/// POST   /terminate       -> terminate_backup
/// ```
pub fn backups() -> Router<AppState> {
    Router::new()
        .route("/", post(tasks::start_backup))
        .route("/status", get(tasks::backup_status))
        .route("/terminate", post(tasks::terminate_backup))
}

/// Routes mounted at `/restores`.
pub fn restores() -> Router<AppState> {
    Router::new()
        .route("/", post(tasks::start_restore))
        .route("/status", get(tasks::restore_status))
        .route("/terminate", post(tasks::terminate_restore))
}

/// Routes mounted at `/reports`.
pub fn reports() -> Router<AppState> {
    Router::new()
        .route("/", post(tasks::start_report))
        .route("/status", get(tasks::report_status))
        .route("/terminate", post(tasks::terminate_report))
}
