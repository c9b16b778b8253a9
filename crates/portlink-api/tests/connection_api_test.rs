//! End-to-end tests for the connection control surface
//!
//! Exercises auth, status mapping and wire shapes through the real router
//! with SQLite in-memory storage and a recording event publisher.

use std::sync::{Arc, Mutex};

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use chrono::{Duration, Utc};
use portlink_api::{ApiServer, ApiServerConfig};
use portlink_control::{
    BrokerConfig, ConnectionManager, EventPublisher, LifecycleEvent, PortAllocator, PortPoolStore,
    PublishError,
};
use portlink_db::entities::{api_key, connection};
use sea_orm::{ActiveModelTrait, ActiveValue::Set, DatabaseConnection, EntityTrait, PaginatorTrait};
use tower::ServiceExt; // For oneshot()
use uuid::Uuid;

const TEST_KEY: &str = "pk_live_test";

#[derive(Default)]
struct RecordingPublisher {
    events: Mutex<Vec<LifecycleEvent>>,
}

impl RecordingPublisher {
    fn recorded(&self) -> Vec<LifecycleEvent> {
        self.events.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl EventPublisher for RecordingPublisher {
    async fn publish(&self, event: &LifecycleEvent) -> Result<(), PublishError> {
        self.events.lock().unwrap().push(event.clone());
        Ok(())
    }
}

struct TestApp {
    router: Router,
    db: DatabaseConnection,
    publisher: Arc<RecordingPublisher>,
}

async fn insert_key(
    db: &DatabaseConnection,
    key: &str,
    is_active: bool,
    expires_at: Option<chrono::DateTime<Utc>>,
) {
    api_key::ActiveModel {
        id: Set(Uuid::new_v4()),
        key: Set(key.to_string()),
        name: Set("test key".to_string()),
        is_active: Set(is_active),
        expires_at: Set(expires_at),
        last_used_at: Set(None),
        created_at: Set(Utc::now()),
    }
    .insert(db)
    .await
    .expect("Failed to insert api key");
}

/// Pool of 3 ports: one create succeeds, the next hits exhaustion.
async fn create_test_app() -> TestApp {
    let db = portlink_db::connect("sqlite::memory:")
        .await
        .expect("Failed to connect to in-memory database");
    portlink_db::migrate(&db).await.expect("Failed to run migrations");

    let store = PortPoolStore::new(db.clone());
    store.initialize(6000, 6002).await.expect("Failed to initialize pool");

    insert_key(&db, TEST_KEY, true, None).await;

    let config = BrokerConfig {
        port_range_min: 6000,
        port_range_max: 6002,
        server_url: "broker.test.local".to_string(),
        kafka_url: "kafka:9092".to_string(),
    };

    let publisher = Arc::new(RecordingPublisher::default());
    let manager = Arc::new(ConnectionManager::new(
        db.clone(),
        PortAllocator::new(store),
        publisher.clone(),
        &config,
    ));

    let server = ApiServer::new(ApiServerConfig::default(), manager, db.clone());
    TestApp {
        router: server.build_router(),
        db,
        publisher,
    }
}

fn post_connection(key: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("POST").uri("/connection");
    if let Some(key) = key {
        builder = builder.header("x-api-key", key);
    }
    builder.body(Body::empty()).unwrap()
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

#[tokio::test]
async fn test_missing_api_key_is_unauthorized() {
    let app = create_test_app().await;

    let response = app.router.oneshot(post_connection(None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let body = body_json(response).await;
    assert_eq!(body["error"], "API key missing");
}

#[tokio::test]
async fn test_unknown_api_key_is_unauthorized() {
    let app = create_test_app().await;

    let response = app
        .router
        .oneshot(post_connection(Some("pk_bogus")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let body = body_json(response).await;
    assert_eq!(body["error"], "Invalid API key");
}

#[tokio::test]
async fn test_disabled_api_key_is_unauthorized() {
    let app = create_test_app().await;
    insert_key(&app.db, "pk_disabled", false, None).await;

    let response = app
        .router
        .oneshot(post_connection(Some("pk_disabled")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_expired_api_key_is_unauthorized() {
    let app = create_test_app().await;
    insert_key(
        &app.db,
        "pk_expired",
        true,
        Some(Utc::now() - Duration::hours(1)),
    )
    .await;

    let response = app
        .router
        .oneshot(post_connection(Some("pk_expired")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let body = body_json(response).await;
    assert_eq!(body["error"], "API key expired");
}

#[tokio::test]
async fn test_create_connection_returns_created_with_wire_shape() {
    let app = create_test_app().await;

    let response = app
        .router
        .clone()
        .oneshot(post_connection(Some(TEST_KEY)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let body = body_json(response).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["address"], "broker.test.local");
    assert_eq!(body["data"]["status"], "connecting");
    assert!(body["data"]["externalPort"].is_u64());
    assert!(body["data"]["internalPort"].is_u64());

    // The published payload carries the bit-exact worker contract
    let events = app.publisher.recorded();
    assert_eq!(events.len(), 1);
    let wire = serde_json::to_value(&events[0]).unwrap();
    assert_eq!(wire["type"], "start");
    assert_eq!(wire["externalPort"], body["data"]["externalPort"]);
    assert_eq!(wire["internalPort"], body["data"]["internalPort"]);
    assert_eq!(wire["sessionId"], body["data"]["id"]);
}

#[tokio::test]
async fn test_create_on_exhausted_pool_is_service_unavailable() {
    let app = create_test_app().await;

    // First create takes 2 of the 3 ports
    let response = app
        .router
        .clone()
        .oneshot(post_connection(Some(TEST_KEY)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = app
        .router
        .clone()
        .oneshot(post_connection(Some(TEST_KEY)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

    let body = body_json(response).await;
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], "no_ports_available");

    // Only the first connection was persisted
    let rows = connection::Entity::find().count(&app.db).await.unwrap();
    assert_eq!(rows, 1);
}

#[tokio::test]
async fn test_stop_connection_lifecycle() {
    let app = create_test_app().await;

    let response = app
        .router
        .clone()
        .oneshot(post_connection(Some(TEST_KEY)))
        .await
        .unwrap();
    let body = body_json(response).await;
    let id = body["data"]["id"].as_str().unwrap().to_string();

    let response = app
        .router
        .clone()
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri(format!("/connection/{}", id))
                .header("x-api-key", TEST_KEY)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["data"], true);

    // Idempotent: stopping again still succeeds
    let response = app
        .router
        .clone()
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri(format!("/connection/{}", id))
                .header("x-api-key", TEST_KEY)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // One start and one stop, despite the double delete
    assert_eq!(app.publisher.recorded().len(), 2);
}

#[tokio::test]
async fn test_stop_unknown_connection_is_not_found() {
    let app = create_test_app().await;

    for id in [Uuid::new_v4().to_string(), "not-a-uuid".to_string()] {
        let response = app
            .router
            .clone()
            .oneshot(
                Request::builder()
                    .method("DELETE")
                    .uri(format!("/connection/{}", id))
                    .header("x-api-key", TEST_KEY)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let body = body_json(response).await;
        assert_eq!(body["error"], "connection_not_found");
    }
}

#[tokio::test]
async fn test_update_connection_status() {
    let app = create_test_app().await;

    let response = app
        .router
        .clone()
        .oneshot(post_connection(Some(TEST_KEY)))
        .await
        .unwrap();
    let body = body_json(response).await;
    let id = body["data"]["id"].as_str().unwrap().to_string();

    let response = app
        .router
        .clone()
        .oneshot(
            Request::builder()
                .method("PATCH")
                .uri(format!("/connection/{}", id))
                .header("x-api-key", TEST_KEY)
                .header("content-type", "application/json")
                .body(Body::from(r#"{"status":"connected"}"#))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let row = connection::Entity::find_by_id(Uuid::parse_str(&id).unwrap())
        .one(&app.db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(row.status, "connected");
}

#[tokio::test]
async fn test_update_unknown_connection_is_not_found() {
    let app = create_test_app().await;

    let response = app
        .router
        .oneshot(
            Request::builder()
                .method("PATCH")
                .uri(format!("/connection/{}", Uuid::new_v4()))
                .header("x-api-key", TEST_KEY)
                .header("content-type", "application/json")
                .body(Body::from(r#"{"status":"connected"}"#))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_list_connections_for_key() {
    let app = create_test_app().await;

    let response = app
        .router
        .clone()
        .oneshot(post_connection(Some(TEST_KEY)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = app
        .router
        .clone()
        .oneshot(
            Request::builder()
                .method("GET")
                .uri("/connection")
                .header("x-api-key", TEST_KEY)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["data"].as_array().unwrap().len(), 1);
    assert_eq!(body["data"][0]["status"], "connecting");
}

#[tokio::test]
async fn test_health_is_public_and_reports_pool() {
    let app = create_test_app().await;

    let response = app
        .router
        .oneshot(
            Request::builder()
                .method("GET")
                .uri("/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["available_ports"], 3);
    assert_eq!(body["reserved_ports"], 0);
}
