//! Snapshot and streaming API server for the traffic monitor backend.
//!
//! This crate provides an Axum HTTP server that exposes:
//!
//! - **Liveness endpoint** (`GET /`) returning a fixed greeting
//! - **Snapshot endpoint** (`GET /latest`) serving the current
//!   [`Snapshot`] as JSON
//! - **`WebSocket` endpoint** (`GET /ws`) streaming every raw traffic
//!   payload to each connected client
//!
//! # Architecture
//!
//! Snapshot reads take the [`AggregateStore`] read lock just long enough to
//! copy it. Each `WebSocket` connection registers its sink half in the
//! shared [`DeliveryRegistry`] and then only reads from the client, waiting
//! for it to go away; the dispatch loop does all the writing.
//!
//! [`Snapshot`]: traffic_core::Snapshot
//! [`AggregateStore`]: traffic_core::AggregateStore
//! [`DeliveryRegistry`]: traffic_core::DeliveryRegistry

pub mod error;
pub mod handlers;
pub mod router;
pub mod server;
pub mod state;
pub mod ws;

// Re-export primary types for convenience.
pub use router::build_router;
pub use server::{ServerConfig, ServerError, start_server};
pub use state::AppState;
pub use ws::WsTarget;
