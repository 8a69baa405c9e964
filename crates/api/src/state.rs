use std::sync::Arc;

use tenvault_events::EventBus;
use tenvault_worker::Engine;

use crate::config::ServiceConfig;

/// Shared application state available to all handlers via `State<AppState>`.
#[derive(Clone)]
pub struct AppState {
    /// Backup/restore engine owning the task scheduler and schedules.
    pub engine: Arc<Engine>,
    /// Listener and engine settings the service was started with.
    pub config: Arc<ServiceConfig>,
    /// Task lifecycle events; subscribers outlive requests.
    pub event_bus: Arc<EventBus>,
}
