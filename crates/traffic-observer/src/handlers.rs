//! REST endpoint handlers for the API server.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET` | `/` | Liveness greeting |
//! | `GET` | `/latest` | Current aggregate snapshot |

use std::sync::Arc;

use axum::extract::State;
use axum::http::header;
use axum::response::{IntoResponse, Response};

use crate::error::ObserverError;
use crate::state::AppState;

/// Fixed liveness response.
pub async fn index() -> &'static str {
    "Hello, World!"
}

/// Serve the latest snapshot as `{timestamp, packet_count, packets}`.
///
/// The store lock is held only while copying; encoding happens after.
pub async fn latest(State(state): State<Arc<AppState>>) -> Result<Response, ObserverError> {
    let snapshot = state.store.read().await;
    let body = serde_json::to_vec(&snapshot)?;

    Ok(([(header::CONTENT_TYPE, "application/json")], body).into_response())
}
