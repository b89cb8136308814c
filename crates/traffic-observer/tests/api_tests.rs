//! Integration tests for the API endpoints.
//!
//! Tests use Axum's `Router` directly via `tower::ServiceExt` without
//! starting a TCP server. This validates handler logic and routing
//! without needing a live network connection.

#![allow(clippy::unwrap_used)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::{Value, json};
use tower::ServiceExt;
use traffic_core::{AggregateStore, Snapshot, TrafficMessage};
use traffic_observer::router::build_router;
use traffic_observer::state::AppState;

async fn make_test_state() -> Arc<AppState> {
    let state = Arc::new(AppState::new());

    state
        .store
        .merge(TrafficMessage {
            timestamp: 1_700_000_000,
            packet_count: 2,
            packets: vec![
                json!({"src": "10.0.0.1", "dst": "10.0.0.2", "total_bytes": 1500}),
                json!({"src": "10.0.0.3", "dst": "10.0.0.4", "total_bytes": 64}),
            ],
        })
        .await;

    state
}

async fn body_bytes(body: Body) -> Vec<u8> {
    axum::body::to_bytes(body, usize::MAX).await.unwrap().to_vec()
}

async fn body_to_json(body: Body) -> Value {
    serde_json::from_slice(&body_bytes(body).await).unwrap()
}

// =========================================================================
// Tests
// =========================================================================

#[tokio::test]
async fn test_index_returns_greeting() {
    let router = build_router(make_test_state().await);

    let response = router
        .oneshot(Request::get("/").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_bytes(response.into_body()).await;
    assert_eq!(body, b"Hello, World!");
}

#[tokio::test]
async fn test_latest_returns_snapshot() {
    let router = build_router(make_test_state().await);

    let response = router
        .oneshot(Request::get("/latest").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response
        .headers()
        .get("content-type")
        .unwrap()
        .to_str()
        .unwrap();
    assert!(content_type.contains("application/json"));

    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["timestamp"], 1_700_000_000);
    assert_eq!(json["packet_count"], 2);
    assert_eq!(json["packets"].as_array().unwrap().len(), 2);
    assert_eq!(json["packets"][0]["src"], "10.0.0.1");
}

#[tokio::test]
async fn test_latest_on_empty_store() {
    let router = build_router(Arc::new(AppState::new()));

    let response = router
        .oneshot(Request::get("/latest").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json, json!({"timestamp": 0, "packet_count": 0, "packets": []}));
}

#[tokio::test]
async fn test_latest_tracks_merges() {
    let state = make_test_state().await;
    let router = build_router(Arc::clone(&state));

    state
        .store
        .merge(TrafficMessage {
            timestamp: 1_700_000_000,
            packet_count: 1,
            packets: vec![json!({"src": "10.0.0.5"})],
        })
        .await;

    let response = router
        .clone()
        .oneshot(Request::get("/latest").body(Body::empty()).unwrap())
        .await
        .unwrap();
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["packet_count"], 3);
    assert_eq!(json["packets"][2]["src"], "10.0.0.5");

    state
        .store
        .merge(TrafficMessage {
            timestamp: 1_700_000_001,
            packet_count: 0,
            packets: Vec::new(),
        })
        .await;

    let response = router
        .oneshot(Request::get("/latest").body(Body::empty()).unwrap())
        .await
        .unwrap();
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["timestamp"], 1_700_000_001);
    assert_eq!(json["packet_count"], 0);
}

#[tokio::test]
async fn test_latest_serves_reconstructed_store() {
    let seeded = Snapshot {
        timestamp: 42,
        packet_count: 1,
        packets: vec![json!({"timestamp": "42", "total_bytes": "900"})],
    };
    let store = Arc::new(AggregateStore::with_snapshot(seeded));
    let router = build_router(Arc::new(AppState::with_store(store)));

    let response = router
        .oneshot(Request::get("/latest").body(Body::empty()).unwrap())
        .await
        .unwrap();

    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["timestamp"], 42);
    assert_eq!(json["packets"][0]["total_bytes"], "900");
}

#[tokio::test]
async fn test_ws_without_upgrade_is_rejected() {
    let router = build_router(make_test_state().await);

    let response = router
        .oneshot(Request::get("/ws").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert!(response.status().is_client_error());
}

#[tokio::test]
async fn test_cors_allows_any_origin() {
    let router = build_router(make_test_state().await);

    let response = router
        .oneshot(
            Request::get("/latest")
                .header("origin", "http://dashboard.example")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response
            .headers()
            .get("access-control-allow-origin")
            .unwrap(),
        "*"
    );
}

#[tokio::test]
async fn test_unknown_route_returns_404() {
    let router = build_router(make_test_state().await);

    let response = router
        .oneshot(Request::get("/api/nothing").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
