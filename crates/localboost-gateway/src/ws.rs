//! WebSocket feed pushing dashboard snapshots to connected clients.
//!
//! Protocol:
//! ← Server sends: {"type":"connected","service":"...","version":"..."}
//! ← Server sends: {"type":"snapshot","generated_at":"...","channels":{...}}
//!   once on connect (if a sync pass already ran) and after every
//!   completed pass from then on
//! → Client sends: {"type":"ping"} → {"type":"pong","timestamp":...}
//! → Client sends: {"type":"sync"} → one pass runs now; the result
//!   arrives on the feed like any other snapshot

use axum::{
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::IntoResponse,
};
use futures::StreamExt;
use localboost_core::types::DashboardSnapshot;
use std::sync::Arc;
use tokio_stream::wrappers::WatchStream;

use super::server::AppState;

/// WebSocket upgrade handler.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Serve one client until it disconnects.
async fn handle_socket(mut socket: WebSocket, state: Arc<AppState>) {
    tracing::info!("WebSocket client connected");

    let welcome = serde_json::json!({
        "type": "connected",
        "service": "localboost-gateway",
        "version": env!("CARGO_PKG_VERSION"),
    });
    if send_json(&mut socket, &welcome).await.is_err() {
        return;
    }

    // Catch the client up if a pass already completed before it connected.
    let latest = state.aggregator.latest();
    if !latest.channels.is_empty()
        && send_json(&mut socket, &snapshot_message(&latest)).await.is_err()
    {
        return;
    }

    // From here on, only passes that complete while this client is connected.
    let mut feed = WatchStream::from_changes(state.aggregator.subscribe());

    loop {
        tokio::select! {
            snapshot = feed.next() => {
                let Some(snapshot) = snapshot else { break };
                if send_json(&mut socket, &snapshot_message(&snapshot)).await.is_err() {
                    break;
                }
            }
            msg = socket.recv() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        let json = match serde_json::from_str::<serde_json::Value>(&text) {
                            Ok(j) => j,
                            Err(e) => {
                                send_error(&mut socket, &format!("Invalid JSON: {e}")).await;
                                continue;
                            }
                        };
                        match json["type"].as_str().unwrap_or("unknown") {
                            "ping" => {
                                let pong = serde_json::json!({
                                    "type": "pong",
                                    "timestamp": chrono::Utc::now().timestamp_millis(),
                                });
                                let _ = send_json(&mut socket, &pong).await;
                            }
                            // The tick publishes to the watch channel; the
                            // feed arm above delivers it to this client too.
                            "sync" => {
                                state.aggregator.tick().await;
                            }
                            other => {
                                send_error(&mut socket, &format!("Unknown message type: {other}"))
                                    .await;
                            }
                        }
                    }
                    Some(Ok(Message::Ping(data))) => {
                        let _ = socket.send(Message::Pong(data)).await;
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(e)) => {
                        tracing::warn!("WebSocket error: {e}");
                        break;
                    }
                    _ => {}
                }
            }
        }
    }

    tracing::info!("WebSocket client disconnected");
}

fn snapshot_message(snapshot: &DashboardSnapshot) -> serde_json::Value {
    serde_json::json!({
        "type": "snapshot",
        "generated_at": snapshot.generated_at.to_rfc3339(),
        "channels": snapshot.channels,
    })
}

async fn send_json(socket: &mut WebSocket, value: &serde_json::Value) -> Result<(), ()> {
    socket
        .send(Message::Text(value.to_string().into()))
        .await
        .map_err(|e| {
            tracing::warn!("WebSocket send failed: {e}");
        })
}

async fn send_error(socket: &mut WebSocket, message: &str) {
    let error = serde_json::json!({"type": "error", "message": message});
    let _ = send_json(socket, &error).await;
}
