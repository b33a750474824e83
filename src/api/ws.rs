//! WebSocket session transport
//!
//! One connection per open player tab. The handler registers an
//! mpsc-backed [`Session`] for the chat id in the path and forwards
//! every published payload to the socket as a JSON text frame. The
//! client never sends meaningful frames; inbound traffic is drained
//! only to observe the close.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Path, State,
    },
    response::IntoResponse,
};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;

use crate::push::Session;
use crate::AppState;

pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    Path(chat_id): Path<i64>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, chat_id, state))
}

async fn handle_socket(socket: WebSocket, chat_id: i64, state: AppState) {
    let (mut ws_sender, mut ws_receiver) = socket.split();

    let (tx, mut rx) = mpsc::unbounded_channel();
    let session_id = state.registry.register(chat_id, Session::new(tx));

    // Forward published payloads to the socket until either side closes.
    loop {
        tokio::select! {
            payload = rx.recv() => {
                let Some(payload) = payload else { break };
                let json = match serde_json::to_string(&payload) {
                    Ok(json) => json,
                    Err(error) => {
                        tracing::error!(chat_id, %error, "Failed to serialize push payload");
                        continue;
                    }
                };
                if ws_sender.send(Message::Text(json)).await.is_err() {
                    break;
                }
            }
            frame = ws_receiver.next() => {
                match frame {
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                    // Pings are answered by axum; other frames are ignored
                    Some(Ok(_)) => {}
                }
            }
        }
    }

    // Idempotent; publish-side pruning may have removed it already
    state.registry.deregister(chat_id, session_id);
}
