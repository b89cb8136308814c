//! Axum router construction for the API server.
//!
//! Assembles all routes (REST + `WebSocket`) into a single [`Router`]
//! with CORS middleware enabled for cross-origin dashboard access.

use std::sync::Arc;

use axum::Router;
use axum::routing::get;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::state::AppState;
use crate::ws;

/// Build the complete Axum router.
///
/// The router includes:
/// - `GET /` -- liveness greeting
/// - `GET /latest` -- current aggregate snapshot
/// - `GET /ws` -- `WebSocket` traffic stream
///
/// CORS allows any origin, matching the `WebSocket` endpoint which
/// accepts upgrades from any origin.
pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(handlers::index))
        .route("/latest", get(handlers::latest))
        .route("/ws", get(ws::ws_stream))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
