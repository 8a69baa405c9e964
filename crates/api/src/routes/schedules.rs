use axum::routing::get;
use axum::Router;

use crate::handlers::schedules;
use crate::state::AppState;

/// Routes mounted at `/schedules`.
///
/// ```text
/// GET    /{tenant_id}     -> get_schedule
/// PUT    /{tenant_id}     -> put_schedule
/// DELETE /{tenant_id}     -> delete_schedule
/// ```
pub fn router() -> Router<AppState> {
    Router::new().route(
        "/{tenant_id}",
        get(schedules::get_schedule)
            .put(schedules::put_schedule)
            .delete(schedules::delete_schedule),
    )
}
