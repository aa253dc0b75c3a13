//! HTTP round trips through the router, backed by the in-memory store

use std::sync::Arc;

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;

use sitestock_server::{
    api,
    config::{
        AppConfig, AuthConfig, DatabaseConfig, LoggingConfig, ServerConfig, StorageBackend,
        WorkflowConfig,
    },
    models::{enums::Role, user::UserClaims},
    repository::MemoryStore,
    services::Services,
    AppState,
};

const SECRET: &str = "test-secret";

fn app() -> Router {
    let config = AppConfig {
        server: ServerConfig::default(),
        database: DatabaseConfig {
            backend: StorageBackend::Memory,
            ..DatabaseConfig::default()
        },
        auth: AuthConfig {
            jwt_secret: SECRET.to_string(),
            jwt_expiration_hours: 1,
        },
        logging: LoggingConfig::default(),
        workflow: WorkflowConfig::default(),
    };
    let store = Arc::new(MemoryStore::new());
    let services = Services::new(store.clone(), store, config.workflow.clone());
    api::router(AppState {
        config: Arc::new(config),
        services: Arc::new(services),
    })
}

fn token(user_id: i32, role: Role) -> String {
    UserClaims::new(&format!("user{}", user_id), user_id, vec![role], 1)
        .create_token(SECRET)
        .unwrap()
}

async fn call(
    app: &Router,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

#[tokio::test]
async fn test_health_and_readiness() {
    let app = app();

    let (status, body) = call(&app, Method::GET, "/api/v1/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");

    let (status, body) = call(&app, Method::GET, "/api/v1/ready", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["backend"], "memory");
}

#[tokio::test]
async fn test_missing_token_is_rejected() {
    let app = app();

    let (status, body) = call(&app, Method::GET, "/api/v1/inventory", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["success"], false);
    assert_eq!(body["code"], 2);

    let (status, _) = call(
        &app,
        Method::GET,
        "/api/v1/inventory",
        Some("not-a-jwt"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_withdrawal_over_http() {
    let app = app();
    let warehouse = token(4, Role::Warehouseman);
    let clerk = token(5, Role::SiteInventoryClerk);
    let pm = token(6, Role::ProjectManager);
    let director = token(7, Role::AssetDirector);

    let (status, body) = call(
        &app,
        Method::POST,
        "/api/v1/inventory",
        Some(&warehouse),
        Some(json!({
            "code": "CEM-40",
            "name": "Cement 40kg",
            "unit": "bag",
            "quantity": 10,
            "is_critical": false
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["success"], true);
    let item_id = body["data"]["id"].as_i64().unwrap();

    let (status, body) = call(
        &app,
        Method::POST,
        "/api/v1/withdrawals/batches",
        Some(&clerk),
        Some(json!({
            "lines": [{ "inventory_item_id": item_id, "quantity": 4 }],
            "purpose": "Column footing"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let batch_id = body["data"]["batch"]["id"].as_i64().unwrap();
    let base = format!("/api/v1/withdrawals/batches/{}", batch_id);

    let (status, _) = call(
        &app,
        Method::POST,
        &format!("{}/verify", base),
        Some(&pm),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = call(
        &app,
        Method::POST,
        &format!("{}/approve", base),
        Some(&director),
        Some(json!({ "notes": "ok for pour" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["batch"]["status"], "approved");

    let (status, body) = call(
        &app,
        Method::GET,
        &format!("/api/v1/inventory/{}", item_id),
        Some(&clerk),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["available_quantity"], 6);

    // Approving twice is a status conflict
    let (status, body) = call(
        &app,
        Method::POST,
        &format!("{}/approve", base),
        Some(&director),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["success"], false);
    assert_eq!(body["code"], 5);

    let (status, body) = call(
        &app,
        Method::GET,
        &format!("/api/v1/activity/withdrawal_batches/{}", batch_id),
        Some(&clerk),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"].as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn test_wrong_role_and_unknown_scope() {
    let app = app();
    let clerk = token(5, Role::SiteInventoryClerk);

    let (status, body) = call(
        &app,
        Method::POST,
        "/api/v1/inventory",
        Some(&clerk),
        Some(json!({ "code": "X-1", "name": "Shovel", "quantity": 3, "is_critical": false })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], 6);

    let (status, _) = call(
        &app,
        Method::GET,
        "/api/v1/borrowed-tools/crates/1",
        Some(&clerk),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = call(
        &app,
        Method::POST,
        "/api/v1/borrowed-tools/batches/77/cancel",
        Some(&clerk),
        Some(json!({ "reason": "not needed" })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], 4);
}
