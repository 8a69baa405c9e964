#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Method, Request, Response};
use axum::Router;
use chrono::NaiveDate;
use http_body_util::BodyExt;
use tenvault_core::helpers::SchemaHelpers;
use tenvault_core::modules::default_registry;
use tenvault_core::DataRowInfo;
use tenvault_db::MemoryTenantStore;
use tenvault_events::EventBus;
use tenvault_worker::{Engine, EngineConfig};
use tower::ServiceExt;
use uuid::Uuid;

use tenvault_api::config::ServiceConfig;
use tenvault_api::router::build_app_router;
use tenvault_api::state::AppState;

pub const SOURCE: i32 = 1;

pub fn alice() -> Uuid {
    Uuid::parse_str("7d3c1c5e-1111-4a7b-9e1a-0f0b7a5d0001").unwrap()
}


/// A running application over an in-memory tenant store and a temporary
/// backup directory.
pub struct TestApp {
    pub router: Router,
    pub engine: Arc<Engine>,
    pub store: Arc<MemoryTenantStore>,
    pub dir: tempfile::TempDir,
}

pub async fn build_test_app() -> TestApp {
    let registry = Arc::new(default_registry(SchemaHelpers::new()).unwrap());
    let store = Arc::new(MemoryTenantStore::for_registry(&registry).await);
    let created = NaiveDate::from_ymd_opt(2025, 5, 2)
        .unwrap()
        .and_hms_opt(8, 0, 0)
        .unwrap();
    store
        .seed(
            "core_user",
            Some("id"),
            [DataRowInfo::new()
                .with("tenant", SOURCE)
                .with("id", alice())
                .with("username", "alice")
                .with("create_on", created)],
        )
        .await
        .unwrap();
    store
        .seed(
            "crm_contact",
            Some("id"),
            [DataRowInfo::new()
                .with("id", 10)
                .with("tenant_id", SOURCE)
                .with("company_id", 0)
                .with("display_name", "Acme")
                .with("create_by", alice())
                .with("create_on", created)],
        )
        .await
        .unwrap();

    let dir = tempfile::tempdir().unwrap();
    let engine_config = EngineConfig {
        backup_storage_path: dir.path().to_string_lossy().into_owned(),
        report_poll_interval: Duration::from_millis(1),
        ..EngineConfig::default()
    };
    let event_bus = Arc::new(EventBus::default());
    let engine = Arc::new(Engine::new(
        registry,
        store.clone(),
        Arc::clone(&event_bus),
        engine_config,
    ));

    let state = AppState {
        engine: Arc::clone(&engine),
        config: Arc::new(ServiceConfig::with_engine(engine.config().clone())),
        event_bus,
    };

    TestApp {
        router: build_app_router(state),
        engine,
        store,
        dir,
    }
}

pub async fn send(app: &TestApp, method: Method, uri: &str, body: Option<serde_json::Value>) -> Response<Body> {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(json) => builder
            .header("content-type", "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    app.router.clone().oneshot(request).await.unwrap()
}

pub async fn get(app: &TestApp, uri: &str) -> Response<Body> {
    send(app, Method::GET, uri, None).await
}

pub async fn post_json(app: &TestApp, uri: &str, body: serde_json::Value) -> Response<Body> {
    send(app, Method::POST, uri, Some(body)).await
}

pub async fn put_json(app: &TestApp, uri: &str, body: serde_json::Value) -> Response<Body> {
    send(app, Method::PUT, uri, Some(body)).await
}

pub async fn delete(app: &TestApp, uri: &str) -> Response<Body> {
    send(app, Method::DELETE, uri, None).await
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

/// Poll a status endpoint until the task is `Done` or `Failed`.
pub async fn wait_terminal(app: &TestApp, status_uri: &str) -> serde_json::Value {
    for _ in 0..400 {
        let response = get(app, status_uri).await;
        if response.status().is_success() {
            let json = body_json(response).await;
            if matches!(json["data"]["status"].as_str(), Some("Done" | "Failed")) {
                return json["data"].clone();
            }
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("task at {status_uri} did not finish");
}
