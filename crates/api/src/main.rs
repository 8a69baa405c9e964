use std::sync::Arc;
use std::time::Duration;

use tenvault_core::helpers::SchemaHelpers;
use tenvault_core::modules::default_registry;
use tenvault_core::store::TenantStore;
use tenvault_db::{MemoryTenantStore, PgTenantStore};
use tenvault_events::{EventBus, EventLog};
use tenvault_worker::{Engine, ScheduleRunner};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tenvault_api::config::ServiceConfig;
use tenvault_api::router::build_app_router;
use tenvault_api::state::AppState;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tenvault_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = Arc::new(ServiceConfig::from_env().expect("Invalid service configuration"));
    let engine_config = config.engine.clone();
    tracing::info!(
        listen = %config.listen,
        pool_size = engine_config.worker_pool_size,
        storage = %engine_config.backup_storage_path,
        report_service = engine_config.report_service_url.as_deref().unwrap_or("-"),
        "Loaded configuration"
    );

    // --- Schema ---
    let registry = Arc::new(
        default_registry(SchemaHelpers::new()).expect("Table schema registry is invalid"),
    );
    tracing::info!(modules = ?registry.modules(), "Schema registry built");

    // --- Tenant store ---
    let store: Arc<dyn TenantStore> = match &engine_config.database_url {
        Some(url) => {
            let pool = tenvault_db::create_pool(url)
                .await
                .expect("Failed to connect to database");
            tenvault_db::health_check(&pool)
                .await
                .expect("Database health check failed");
            tracing::info!("Database health check passed");
            Arc::new(PgTenantStore::new(pool))
        }
        None => {
            tracing::warn!("DATABASE_URL not set, using an in-memory tenant store");
            Arc::new(MemoryTenantStore::for_registry(&registry).await)
        }
    };

    // --- Event bus ---
    let event_bus = Arc::new(EventBus::default());
    let log_handle = tokio::spawn(EventLog::run(event_bus.subscribe()));

    // --- Engine and schedules ---
    let engine = Arc::new(Engine::new(
        registry,
        store,
        Arc::clone(&event_bus),
        engine_config,
    ));
    let runner_cancel = CancellationToken::new();
    let runner = ScheduleRunner::new(Arc::clone(&engine));
    let runner_token = runner_cancel.clone();
    let runner_handle = tokio::spawn(async move {
        runner.run(runner_token).await;
    });

    // --- App state ---
    let state = AppState {
        engine: Arc::clone(&engine),
        config: Arc::clone(&config),
        event_bus: Arc::clone(&event_bus),
    };
    let app = build_app_router(state);

    // --- Start server ---
    tracing::info!(addr = %config.listen, "Starting server");

    let listener = tokio::net::TcpListener::bind(config.listen)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    // --- Post-shutdown cleanup ---
    tracing::info!("Server stopped accepting connections, cleaning up");

    runner_cancel.cancel();
    let _ = tokio::time::timeout(Duration::from_secs(5), runner_handle).await;

    if tokio::time::timeout(config.drain_timeout, engine.shutdown()).await.is_err() {
        tracing::warn!(
            timeout_secs = config.drain_timeout.as_secs(),
            "Tasks did not finish in time"
        );
    }

    // Closing the bus stops the event log.
    drop(engine);
    drop(event_bus);
    let _ = tokio::time::timeout(Duration::from_secs(5), log_handle).await;

    tracing::info!("Graceful shutdown complete");
}

/// Wait for SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
