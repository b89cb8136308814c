//! `WebSocket` handler for real-time traffic streaming.
//!
//! Clients connect to `GET /ws` and receive every raw payload published on
//! the traffic channel, one text frame per message, in publish order.
//!
//! The socket is split on upgrade. The sink half becomes a [`WsTarget`]
//! owned by the [`DeliveryRegistry`](traffic_core::DeliveryRegistry), which
//! the dispatch loop writes to. The stream half stays with this handler,
//! which logs and discards whatever the client sends and unregisters the
//! target once the client closes or errors.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{ConnectInfo, State, WebSocketUpgrade};
use axum::response::IntoResponse;
use futures::stream::SplitSink;
use futures::{SinkExt as _, StreamExt as _};
use tracing::{debug, info};
use traffic_core::{DeliveryError, DeliveryTarget};

use crate::state::AppState;

/// The write half of one client connection.
pub struct WsTarget {
    peer: String,
    sink: SplitSink<WebSocket, Message>,
}

impl DeliveryTarget for WsTarget {
    fn peer(&self) -> &str {
        &self.peer
    }

    async fn send(&mut self, payload: &str) -> Result<(), DeliveryError> {
        self.sink
            .send(Message::Text(payload.to_owned().into()))
            .await
            .map_err(|e| DeliveryError::Send(e.to_string()))
    }
}

/// Upgrade an HTTP request to a `WebSocket` connection and begin
/// streaming traffic payloads.
///
/// # Route
///
/// `GET /ws`
pub async fn ws_stream(
    ws: WebSocketUpgrade,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_ws(socket, addr, state))
}

/// Register the connection, then read from it until it goes away.
async fn handle_ws(socket: WebSocket, addr: SocketAddr, state: Arc<AppState>) {
    let (sink, mut stream) = socket.split();
    let peer = addr.to_string();

    let id = state
        .registry
        .register(WsTarget {
            peer: peer.clone(),
            sink,
        })
        .await;
    info!(target_id = %id, peer, "WebSocket connection established");

    while let Some(frame) = stream.next().await {
        match frame {
            Ok(Message::Text(text)) => {
                debug!(peer, message = text.as_str(), "Received message from WebSocket client");
            }
            Ok(Message::Binary(data)) => {
                debug!(peer, bytes = data.len(), "Received binary frame from WebSocket client");
            }
            Ok(Message::Close(_)) => break,
            // Ping/pong replies are handled by the protocol layer.
            Ok(Message::Ping(_) | Message::Pong(_)) => {}
            Err(e) => {
                debug!(peer, error = %e, "WebSocket read error");
                break;
            }
        }
    }

    state.registry.unregister(id).await;
    debug!(target_id = %id, peer, "WebSocket connection closed");
}
