//! Shared test helpers for API integration tests.
#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use kanban_board::application::command_handlers::MutatorConfig;
use kanban_store::in_memory::InMemoryBoardStore;
use kanban_test_support::FixedClock;
use serde_json::Value;
use tokio::sync::broadcast;
use tower::ServiceExt;
use uuid::Uuid;

use kanban_api::extract::USER_ID_HEADER;
use kanban_api::state::AppState;

/// Application state over a fresh in-memory store and a fixed clock.
pub fn test_state() -> AppState {
    AppState::new(
        Arc::new(InMemoryBoardStore::new()),
        Arc::new(FixedClock::default()),
        MutatorConfig::default(),
        16,
    )
}

/// Build the full app router. Uses the same route structure as `main.rs`.
pub fn build_test_app(state: AppState) -> Router {
    kanban_api::app(state)
}

/// Send a request as `user_id` with an optional JSON body and return the
/// status and decoded body (`Value::Null` when empty).
pub async fn send(
    app: Router,
    method: &str,
    uri: &str,
    user_id: Uuid,
    body: Option<&Value>,
) -> (StatusCode, Value) {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(USER_ID_HEADER, user_id.to_string());
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_vec(body).unwrap()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let body_bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json = if body_bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&body_bytes).unwrap()
    };

    (status, json)
}

/// Send a POST request with a JSON body.
pub async fn post_json(app: Router, uri: &str, user_id: Uuid, body: &Value) -> (StatusCode, Value) {
    send(app, "POST", uri, user_id, Some(body)).await
}

/// Send a GET request.
pub async fn get_json(app: Router, uri: &str, user_id: Uuid) -> (StatusCode, Value) {
    send(app, "GET", uri, user_id, None).await
}

/// Waits briefly for the next notification on `rx`.
pub async fn next_notification(rx: &mut broadcast::Receiver<String>) -> Option<Value> {
    let message = tokio::time::timeout(Duration::from_secs(2), rx.recv())
        .await
        .ok()?
        .ok()?;
    serde_json::from_str(&message).ok()
}

/// Returns `true` if nothing arrives on `rx` within a short grace period.
pub async fn stays_quiet(rx: &mut broadcast::Receiver<String>) -> bool {
    tokio::time::timeout(Duration::from_millis(100), rx.recv())
        .await
        .is_err()
}

/// Skips notifications until one of type `event_type` arrives.
pub async fn next_of_type(rx: &mut broadcast::Receiver<String>, event_type: &str) -> Option<Value> {
    loop {
        let notification = next_notification(rx).await?;
        if notification["type"] == event_type {
            return Some(notification);
        }
    }
}
