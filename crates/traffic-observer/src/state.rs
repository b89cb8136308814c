//! Shared application state for the API server.
//!
//! [`AppState`] holds the two lock domains the HTTP layer touches: the
//! aggregate store it reads snapshots from, and the delivery registry that
//! `WebSocket` connections join and leave.

use std::sync::Arc;

use traffic_core::{AggregateStore, DeliveryRegistry};

use crate::ws::WsTarget;

/// Shared state for the Axum application.
///
/// Wrapped in [`Arc`] and injected via Axum's `State` extractor. The same
/// store and registry handles are given to the ingest and dispatch loops.
#[derive(Clone)]
pub struct AppState {
    /// The rolling latest snapshot (written by the ingest loop).
    pub store: Arc<AggregateStore>,
    /// Connected `WebSocket` clients (drained by the dispatch loop).
    pub registry: Arc<DeliveryRegistry<WsTarget>>,
}

impl AppState {
    /// Create a new application state with an empty snapshot and no clients.
    pub fn new() -> Self {
        Self::with_store(Arc::new(AggregateStore::new()))
    }

    /// Create a new application state around an existing store.
    pub fn with_store(store: Arc<AggregateStore>) -> Self {
        Self {
            store,
            registry: Arc::new(DeliveryRegistry::new()),
        }
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}
