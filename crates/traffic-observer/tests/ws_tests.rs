//! End-to-end tests for the `WebSocket` stream.
//!
//! The router is served on an ephemeral port with connect info, a real
//! client connects to `/ws`, and a `DispatchLoop` drains a fan-out queue
//! into the shared registry.

#![allow(clippy::unwrap_used, clippy::panic)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures::{SinkExt as _, StreamExt as _};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use traffic_core::{DispatchLoop, fanout_queue};
use traffic_observer::router::build_router;
use traffic_observer::state::AppState;

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

async fn serve(state: Arc<AppState>) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = build_router(state);

    tokio::spawn(async move {
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
        .unwrap();
    });

    addr
}

async fn connect(addr: SocketAddr) -> Client {
    let (client, _) = connect_async(format!("ws://{addr}/ws")).await.unwrap();
    client
}

async fn wait_for_targets(state: &AppState, expected: usize) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while state.registry.len().await != expected {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap();
}

async fn next_text(client: &mut Client) -> String {
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            match client.next().await {
                Some(Ok(Message::Text(text))) => return text.as_str().to_owned(),
                Some(Ok(Message::Ping(_) | Message::Pong(_))) => {}
                other => panic!("expected a text frame, got {other:?}"),
            }
        }
    })
    .await
    .unwrap()
}

#[tokio::test]
async fn test_ws_client_receives_raw_payloads_in_order() {
    let state = Arc::new(AppState::new());
    let addr = serve(Arc::clone(&state)).await;

    let mut client = connect(addr).await;
    wait_for_targets(&state, 1).await;

    // Client frames are read and discarded, never echoed.
    client.send(Message::text("hello from client")).await.unwrap();

    let (tx, rx) = fanout_queue(4);
    let dispatch = tokio::spawn(DispatchLoop::new(rx, Arc::clone(&state.registry)).run());

    let valid = r#"{"timestamp":7,"packet_count":1,"packets":[{"src":"10.0.0.1"}]}"#;
    tx.enqueue(valid.to_owned()).await.unwrap();
    tx.enqueue(String::from("{not json")).await.unwrap();

    assert_eq!(next_text(&mut client).await, valid);
    assert_eq!(next_text(&mut client).await, "{not json");

    drop(tx);
    assert_eq!(dispatch.await.unwrap(), 2);
}

#[tokio::test]
async fn test_ws_every_client_gets_each_payload() {
    let state = Arc::new(AppState::new());
    let addr = serve(Arc::clone(&state)).await;

    let mut first = connect(addr).await;
    let mut second = connect(addr).await;
    wait_for_targets(&state, 2).await;

    let (tx, rx) = fanout_queue(2);
    let dispatch = tokio::spawn(DispatchLoop::new(rx, Arc::clone(&state.registry)).run());
    tx.enqueue(String::from("tick")).await.unwrap();

    assert_eq!(next_text(&mut first).await, "tick");
    assert_eq!(next_text(&mut second).await, "tick");

    drop(tx);
    dispatch.await.unwrap();
}

#[tokio::test]
async fn test_ws_closing_client_is_unregistered() {
    let state = Arc::new(AppState::new());
    let addr = serve(Arc::clone(&state)).await;

    let mut leaving = connect(addr).await;
    let mut staying = connect(addr).await;
    wait_for_targets(&state, 2).await;

    leaving.close(None).await.unwrap();
    wait_for_targets(&state, 1).await;

    let (tx, rx) = fanout_queue(1);
    let dispatch = tokio::spawn(DispatchLoop::new(rx, Arc::clone(&state.registry)).run());
    tx.enqueue(String::from("after close")).await.unwrap();
    assert_eq!(next_text(&mut staying).await, "after close");

    staying.close(None).await.unwrap();
    wait_for_targets(&state, 0).await;

    drop(tx);
    assert_eq!(dispatch.await.unwrap(), 1);
}
