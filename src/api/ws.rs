// =============================================================================
// WebSocket upgrade handler — bridges an Axum socket to the fan-out registry
// =============================================================================
//
// A client connects to `/api/v1/ws?user_id=<id>&token=<token>` and is
// registered in `ws::Registry` under `user_id`. This task owns the actual
// socket: it drains the registry's mpsc channel and writes frames out, while
// a second branch of the same `tokio::select!` reads inbound frames only to
// answer Ping/Close and otherwise discards them (the engine never expects
// client-originated commands over this channel). On either branch ending,
// the connection is deregistered exactly once.
// =============================================================================

use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket},
        Query, State, WebSocketUpgrade,
    },
    response::IntoResponse,
};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::api::auth::validate_token;
use crate::app_state::AppState;

#[derive(Deserialize)]
pub struct WsQuery {
    user_id: i64,
    token: Option<String>,
}

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    Query(query): Query<WsQuery>,
) -> impl IntoResponse {
    let token = query.token.unwrap_or_default();
    if !validate_token(&token) {
        warn!(user_id = query.user_id, "WebSocket connection rejected: invalid token");
        return (
            axum::http::StatusCode::FORBIDDEN,
            "Invalid or missing token",
        )
            .into_response();
    }

    ws.on_upgrade(move |socket| handle_connection(socket, state, query.user_id))
        .into_response()
}

async fn handle_connection(socket: WebSocket, state: Arc<AppState>, user_id: i64) {
    let (mut sender, mut receiver) = socket.split();
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();

    let connection_id = state.ws.connect(user_id, tx);
    info!(user_id, connection_id, "websocket connection accepted");

    loop {
        tokio::select! {
            outgoing = rx.recv() => {
                match outgoing {
                    Some(message) => {
                        if let Err(e) = sender.send(message).await {
                            debug!(user_id, error = %e, "websocket send failed — disconnecting");
                            break;
                        }
                    }
                    None => break,
                }
            }
            incoming = receiver.next() => {
                match incoming {
                    Some(Ok(Message::Ping(data))) => {
                        if sender.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {
                        // The engine never expects client-originated commands
                        // over this channel; anything else is discarded.
                    }
                    Some(Err(e)) => {
                        debug!(user_id, error = %e, "websocket receive error — disconnecting");
                        break;
                    }
                }
            }
        }
    }

    state.ws.disconnect(user_id, connection_id);
    info!(user_id, connection_id, "websocket connection closed");
}
