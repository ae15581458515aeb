use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
};
use marketcache_core::ledger::SymbolKey;
use marketcache_server::{api::app_router, build_state, config::Config, AppState};
use tempfile::{tempdir, TempDir};
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;

async fn build_test_app() -> (axum::Router, Arc<AppState>, TempDir) {
    let tmp = tempdir().unwrap();
    let mut config = Config::from_env().unwrap();
    config.db_path = tmp.path().join("test.db").to_string_lossy().to_string();

    let state = build_state(&config, CancellationToken::new()).await.unwrap();
    (app_router(state.clone(), &config), state, tmp)
}

async fn send(app: &axum::Router, method: Method, uri: &str) -> (StatusCode, serde_json::Value) {
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method(method)
                .uri(uri)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    let status = response.status();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json = if body.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&body).unwrap_or(serde_json::Value::Null)
    };
    (status, json)
}

#[tokio::test]
async fn healthz_answers_with_request_id() {
    let (app, _state, _tmp) = build_test_app().await;

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/v1/healthz")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key("x-request-id"));
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&body[..], b"ok");
}

#[tokio::test]
async fn malformed_symbols_are_rejected_without_provider_calls() {
    let (app, _state, _tmp) = build_test_app().await;

    let (status, body) = send(&app, Method::GET, "/api/v1/quotes/AAPL").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["kind"], "validation");

    let (status, _) = send(&app, Method::GET, "/api/v1/fundamentals/.US").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send(&app, Method::GET, "/api/v1/history/AAPL.US").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["message"].as_str().unwrap().contains("from and to"));
}

#[tokio::test]
async fn ledger_entries_can_be_listed_and_cleared() {
    let (app, state, _tmp) = build_test_app().await;
    state
        .ledger
        .mark_failed(&SymbolKey::new("XYZ", "LSE"), "not found")
        .await
        .unwrap();

    let (status, body) = send(&app, Method::GET, "/api/v1/unavailable/LSE").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 1);
    assert_eq!(body[0]["ticker"], "XYZ");
    assert_eq!(body[0]["failureCount"], 1);

    let (status, _) = send(&app, Method::DELETE, "/api/v1/unavailable/XYZ.LSE").await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, body) = send(&app, Method::DELETE, "/api/v1/unavailable/XYZ.LSE").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], 404);

    let (status, body) = send(&app, Method::GET, "/api/v1/unavailable/LSE").await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn cors_preflight_is_answered() {
    let (app, _state, _tmp) = build_test_app().await;

    let response = app
        .oneshot(
            Request::builder()
                .method(Method::OPTIONS)
                .uri("/api/v1/exchanges")
                .header(header::ORIGIN, "http://localhost:3000")
                .header(header::ACCESS_CONTROL_REQUEST_METHOD, "GET")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert!(response
        .headers()
        .contains_key(header::ACCESS_CONTROL_ALLOW_ORIGIN));
}
