pub mod health;
pub mod schedules;
pub mod tasks;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// ```text
/// /backups                     start, status, terminate
/// /restores                    start, status, terminate
/// /reports                     start, status, terminate
/// /schedules/{tenant_id}       get, put, delete
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/backups", tasks::backups())
        .nest("/restores", tasks::restores())
        .nest("/reports", tasks::reports())
        .nest("/schedules", schedules::router())
}
