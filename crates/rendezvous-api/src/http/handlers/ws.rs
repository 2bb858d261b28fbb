//! WebSocket bridge between a client socket and the session manager.
//!
//! The `/ws?meetId=..&userId=..` endpoint upgrades to a WebSocket. Once
//! connected, the handler registers the socket with the [`ConnectionHub`],
//! asks the session manager to admit it, then multiplexes:
//!
//! - **Outbound:** events queued for this connection are written as JSON
//!   text frames. When the hub closes the connection, the socket is closed
//!   after the already queued events are flushed.
//! - **Inbound:** text frames are parsed as [`InboundEvent`] and dispatched.
//!   Malformed frames produce an `error` event for this connection only.
//!
//! [`ConnectionHub`]: rendezvous_core::realtime::hub::ConnectionHub

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::IntoResponse;
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;

use rendezvous_core::realtime::hub::ConnectionId;
use rendezvous_types::event::InboundEvent;

use crate::state::AppState;

/// Handshake parameters. Missing values are rejected by the session manager
/// after the upgrade so the client sees the socket close.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectParams {
    pub meet_id: Option<String>,
    pub user_id: Option<String>,
}

/// Upgrade an HTTP request to a meeting connection.
///
/// This is mounted at `/ws` in the router.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Query(params): Query<ConnectParams>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_ws_connection(socket, state, params))
}

async fn handle_ws_connection(socket: WebSocket, state: AppState, params: ConnectParams) {
    let mut connection = state.hub.register();
    let connection_id = connection.id;
    let meet_id = params.meet_id.unwrap_or_default();
    let user_id = params.user_id.unwrap_or_default();

    // Failures are logged by the session manager; the hub has already queued
    // the close, so the loop below flushes and exits.
    let _ = state
        .sessions
        .on_connect(connection_id, &meet_id, &user_id)
        .await;

    let (mut ws_sender, mut ws_receiver) = socket.split();

    loop {
        tokio::select! {
            outbound = connection.next_event() => {
                let Some(event) = outbound else {
                    let _ = ws_sender.send(Message::Close(None)).await;
                    break;
                };
                match serde_json::to_string(&event) {
                    Ok(json) => {
                        if ws_sender.send(Message::Text(json.into())).await.is_err() {
                            break;
                        }
                    }
                    Err(err) => {
                        tracing::warn!(event = event.name(), "Failed to serialize event: {err}");
                    }
                }
            }

            inbound = ws_receiver.next() => {
                match inbound {
                    Some(Ok(Message::Text(text))) => {
                        dispatch_frame(&state, connection_id, text.as_str()).await;
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(err)) => {
                        tracing::debug!(%connection_id, "WebSocket receive error: {err}");
                        break;
                    }
                    // Binary, ping and pong frames are handled by axum/tungstenite.
                    Some(Ok(_)) => {}
                }
            }
        }
    }

    state.sessions.on_disconnect(connection_id).await;
    tracing::debug!(%connection_id, "WebSocket connection closed");
}

/// Parse one inbound text frame and hand it to the session manager.
async fn dispatch_frame(state: &AppState, connection_id: ConnectionId, text: &str) {
    match serde_json::from_str::<InboundEvent>(text) {
        Ok(InboundEvent::Message(payload)) => {
            state.sessions.on_message(connection_id, payload).await;
        }
        Ok(InboundEvent::Location(payload)) => {
            state.sessions.on_location(connection_id, payload).await;
        }
        Err(err) => {
            state.sessions.on_invalid_frame(connection_id, &err.to_string());
        }
    }
}
