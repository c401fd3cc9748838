//! WebSocket upgrade handler and per-connection session tasks
//!
//! Each connection gets a fresh v4 connection id and an unbounded outbox
//! registered with the hub. The writer task drains the outbox into the
//! socket; when the hub drops the outbox sender (duplicate-session
//! eviction) the writer observes the channel close and shuts the socket
//! down. The reader translates frames into hub events behind a
//! per-connection flood limiter.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::app::AppState;
use crate::hub::{HubEvent, PinnedIdentity};
use crate::util::rate_limit::SocketRateLimiter;
use crate::ws::auth::verify_identity_token;
use crate::ws::protocol::{ClientMsg, ServerMsg};

/// Query parameters for WebSocket connection
#[derive(Debug, Deserialize)]
pub struct WsQuery {
    /// Optional identity token minted by the platform API
    pub token: Option<String>,
}

/// WebSocket upgrade handler
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(query): Query<WsQuery>,
    State(state): State<AppState>,
) -> Response {
    // A presented token must verify, even when auth is optional
    let pinned = match (&query.token, &state.config.identity_token_secret) {
        (Some(token), Some(secret)) => match verify_identity_token(token, secret) {
            Ok(claims) => {
                info!(user_id = %claims.sub, "WebSocket upgrade for authenticated user");
                Some(PinnedIdentity {
                    user_id: claims.sub,
                    nickname: claims.nickname,
                    avatar: claims.avatar,
                })
            }
            Err(e) => {
                warn!(error = %e, "WebSocket auth failed");
                return unauthorized();
            }
        },
        (Some(_), None) => {
            warn!("Token presented but no IDENTITY_TOKEN_SECRET configured");
            return unauthorized();
        }
        (None, _) => {
            if state.config.require_auth {
                warn!("WebSocket upgrade without token rejected");
                return unauthorized();
            }
            None
        }
    };

    ws.on_upgrade(move |socket| handle_socket(socket, pinned, state))
}

fn unauthorized() -> Response {
    (StatusCode::UNAUTHORIZED, "Unauthorized").into_response()
}

/// Handle the upgraded WebSocket connection
async fn handle_socket(socket: WebSocket, pinned: Option<PinnedIdentity>, state: AppState) {
    let conn_id = Uuid::new_v4();
    info!(conn_id = %conn_id, "New WebSocket connection");

    let (ws_sink, ws_stream) = socket.split();

    // Register the outbox with the hub before any frames flow
    let (outbox_tx, outbox_rx) = mpsc::unbounded_channel();
    state
        .hub
        .send(HubEvent::Connected {
            conn_id,
            pinned,
            outbox: outbox_tx,
        })
        .await;

    run_session(conn_id, ws_sink, ws_stream, outbox_rx, &state).await;

    // Cleanup in the hub, whatever ended the session
    state.hub.send(HubEvent::Disconnected { conn_id }).await;

    info!(conn_id = %conn_id, "WebSocket connection closed");
}

/// Run the WebSocket session with read/write split
async fn run_session(
    conn_id: Uuid,
    mut ws_sink: futures::stream::SplitSink<WebSocket, Message>,
    mut ws_stream: futures::stream::SplitStream<WebSocket>,
    mut outbox_rx: mpsc::UnboundedReceiver<ServerMsg>,
    state: &AppState,
) {
    let rate_limiter = SocketRateLimiter::new();

    // Writer task: hub outbox -> WebSocket. Ends when the hub drops the
    // sender (forced termination) or the socket write fails.
    let writer_handle = tokio::spawn(async move {
        while let Some(msg) = outbox_rx.recv().await {
            if let Err(e) = send_msg(&mut ws_sink, &msg).await {
                debug!(conn_id = %conn_id, error = %e, "WebSocket send failed");
                return;
            }
        }
        // Channel closed by the hub: shut the socket down properly
        debug!(conn_id = %conn_id, "Outbox closed, terminating session");
        let _ = ws_sink.send(Message::Close(None)).await;
    });

    // Reader loop: WebSocket -> hub
    while let Some(result) = ws_stream.next().await {
        match result {
            Ok(Message::Text(text)) => {
                if !rate_limiter.check_frame() {
                    warn!(conn_id = %conn_id, "Rate limited inbound frame");
                    continue;
                }

                match serde_json::from_str::<ClientMsg>(&text) {
                    Ok(msg) => {
                        state.hub.send(HubEvent::Frame { conn_id, msg }).await;
                    }
                    Err(e) => {
                        warn!(conn_id = %conn_id, error = %e, "Failed to parse client message");
                    }
                }
            }
            Ok(Message::Binary(_)) => {
                warn!(conn_id = %conn_id, "Received binary message, ignoring");
            }
            Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {
                debug!(conn_id = %conn_id, "Received ping/pong");
            }
            Ok(Message::Close(_)) => {
                info!(conn_id = %conn_id, "Client initiated close");
                break;
            }
            Err(e) => {
                debug!(conn_id = %conn_id, error = %e, "WebSocket error");
                break;
            }
        }
    }

    writer_handle.abort();
}

/// Send a message over WebSocket
async fn send_msg(
    sink: &mut futures::stream::SplitSink<WebSocket, Message>,
    msg: &ServerMsg,
) -> Result<(), String> {
    let json = serde_json::to_string(msg).map_err(|e| e.to_string())?;
    sink.send(Message::Text(json))
        .await
        .map_err(|e| e.to_string())
}
