//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    body::Body,
    extract::Path,
    http::Request,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde_json::{json, Value};

use booking_observability::config::AppConfig;
use booking_observability::observability::{MemorySink, ProcessInfo};
use booking_observability::{build_router, AppState, Principal, RequestFault, StructuredLogger};

/// Router under test plus handles for inspecting what it recorded.
pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub sink: MemorySink,
}

pub fn test_app(environment: &str) -> TestApp {
    let mut config = AppConfig::default();
    config.server.environment = environment.to_string();
    test_app_with(config)
}

/// Build the full pipeline around [`business_routes`], logging into memory.
pub fn test_app_with(config: AppConfig) -> TestApp {
    let sink = MemorySink::new();
    let logger = Arc::new(
        StructuredLogger::builder("hotel-booking-backend")
            .sink(sink.clone())
            .build(),
    );
    let state = AppState::new(&config, logger, Arc::new(ProcessInfo::new())).unwrap();
    let router = build_router(state.clone(), business_routes());
    TestApp {
        router,
        state,
        sink,
    }
}

/// Stand-in for the booking API.
pub fn business_routes() -> Router {
    Router::new()
        .route("/", get(|| async { "API is working" }))
        .route("/api/rooms/{id}", get(get_room))
        .route("/api/bookings/fail", get(failing_booking))
        .route("/api/bookings/panic", get(panicking_booking))
        .route("/api/account/fail", get(failing_account))
        .route("/api/empty", get(|| async { axum::http::StatusCode::NO_CONTENT }))
        .route(
            "/api/rooms/{id}/availability",
            get(|| async { axum::http::StatusCode::NOT_MODIFIED }),
        )
}

async fn get_room(Path(id): Path<String>) -> Json<Value> {
    Json(json!({ "id": id, "type": "deluxe" }))
}

async fn failing_booking() -> Result<Json<Value>, RequestFault> {
    Err(std::io::Error::other("database unavailable").into())
}

async fn panicking_booking() -> &'static str {
    panic!("payment provider exploded")
}

async fn failing_account() -> Response {
    let mut response = RequestFault::new("quota exceeded").into_response();
    response
        .extensions_mut()
        .insert(Principal("user-7".to_string()));
    response
}

pub fn get_request(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

pub async fn body_bytes(response: Response) -> Vec<u8> {
    axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap()
        .to_vec()
}

pub async fn body_text(response: Response) -> String {
    String::from_utf8(body_bytes(response).await).unwrap()
}

pub async fn body_json(response: Response) -> Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}
