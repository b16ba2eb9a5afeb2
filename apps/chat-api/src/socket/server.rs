//! WebSocket upgrade handler and per-connection event loop.

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{Query, State, WebSocketUpgrade};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use axum_extra::extract::cookie::CookieJar;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::Value;
use tokio::sync::mpsc;

use crate::AppState;

use super::events::{ClientFrame, EventName, ServerFrame};
use super::handshake::{self, ACCESS_TOKEN_COOKIE};
use super::rooms::RoomRegistry;

pub fn router() -> Router<AppState> {
    Router::new().route("/ws", get(ws_upgrade))
}

/// Handshake auth field: the token may be supplied as a query parameter when
/// no cookie is available (e.g. cross-origin clients).
#[derive(Debug, Deserialize)]
struct HandshakeQuery {
    #[serde(default)]
    token: Option<String>,
}

async fn ws_upgrade(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    jar: CookieJar,
    Query(query): Query<HandshakeQuery>,
) -> impl IntoResponse {
    let cookie_token = jar.get(ACCESS_TOKEN_COOKIE).map(|c| c.value().to_string());
    let token = handshake::select_token(cookie_token.as_deref(), query.token.as_deref());
    ws.on_upgrade(move |socket| handle_connection(socket, state, token))
}

async fn handle_connection(socket: WebSocket, state: AppState, token: Option<String>) {
    let (mut ws_tx, ws_rx) = socket.split();

    // Step 1: resolve the identity. A rejected connection gets exactly one
    // socketError frame and is closed without ever touching the registry.
    let profile = match handshake::authenticate(&state, token.as_deref()).await {
        Ok(profile) => profile,
        Err(err) => {
            tracing::debug!(reason = err.message(), "socket handshake rejected");
            let frame = ServerFrame::error(err.message()).to_json();
            let _ = ws_tx.send(Message::Text(frame.into())).await;
            let _ = ws_tx.send(Message::Close(None)).await;
            return;
        }
    };

    let conn_id = chat_common::id::prefixed_ulid(chat_common::id::CONNECTION_PREFIX);
    let (tx, rx) = mpsc::unbounded_channel::<String>();

    // Step 2: join the connection's user-room, then queue the connected
    // acknowledgment. The join strictly precedes the ack.
    state.rooms.register(&conn_id, &profile.id, tx.clone());
    let _ = tx.send(ServerFrame::connected().to_json());

    tracing::info!(conn_id = %conn_id, user_id = %profile.id, "socket connected");

    run_connection(&state.rooms, &conn_id, ws_tx, ws_rx, rx).await;

    // Step 3: revoke every membership synchronously with the disconnect so
    // nothing is delivered to this connection afterwards.
    state.rooms.unregister(&conn_id);

    tracing::info!(conn_id = %conn_id, user_id = %profile.id, "socket disconnected");
}

/// Main connection loop: dispatch client commands and drain the outbound
/// queue. Handlers stay non-blocking; long-running work happens in the REST
/// layer, which only calls back in through [`RoomRegistry::emit`].
async fn run_connection(
    rooms: &RoomRegistry,
    conn_id: &str,
    mut ws_tx: SplitSink<WebSocket, Message>,
    mut ws_rx: SplitStream<WebSocket>,
    mut rx: mpsc::UnboundedReceiver<String>,
) {
    loop {
        tokio::select! {
            // Client sends us a frame.
            msg = ws_rx.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        handle_client_frame(rooms, conn_id, &text);
                    }
                    Some(Ok(Message::Ping(_))) | Some(Ok(Message::Pong(_))) => continue,
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(err)) => {
                        tracing::debug!(?err, conn_id, "ws read error");
                        break;
                    }
                    _ => continue,
                }
            }

            // Broadcast queued for this connection by the registry.
            frame = rx.recv() => {
                match frame {
                    Some(json) => {
                        if ws_tx.send(Message::Text(json.into())).await.is_err() {
                            break;
                        }
                    }
                    None => break,
                }
            }
        }
    }
}

/// Dispatch one inbound client frame. Malformed frames and room-scoped
/// commands with no chat id are ignored, not errors.
fn handle_client_frame(rooms: &RoomRegistry, conn_id: &str, text: &str) {
    let frame: ClientFrame = match serde_json::from_str(text) {
        Ok(frame) => frame,
        Err(err) => {
            tracing::debug!(?err, conn_id, "ignoring malformed client frame");
            return;
        }
    };

    let Some(chat_id) = frame.chat_id() else {
        tracing::debug!(conn_id, event = %frame.event, "ignoring command without chat id");
        return;
    };

    match frame.event.as_str() {
        EventName::JOIN_CHAT => {
            tracing::debug!(conn_id, chat_id, "joining chat room");
            rooms.join(conn_id, chat_id);
        }
        EventName::LEAVE_CHAT => {
            tracing::debug!(conn_id, chat_id, "leaving chat room");
            rooms.leave(conn_id, chat_id);
        }
        EventName::TYPING | EventName::STOP_TYPING => {
            // Relay to everyone else in the room; never echo to the sender.
            rooms.emit_except(
                chat_id,
                conn_id,
                &frame.event,
                Value::String(chat_id.to_string()),
            );
        }
        other => {
            tracing::debug!(conn_id, event = other, "ignoring unknown client event");
        }
    }
}
