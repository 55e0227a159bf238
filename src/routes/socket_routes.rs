//! The websocket endpoint behind the notification relay.
//!
//! A client upgrades, sends a `joinRoom` frame with its token, and from then
//! on receives frames emitted into its own room plus the all-clients
//! broadcast. A client `message` frame is re-broadcast to everyone.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::IntoResponse;
use axum::Extension;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::json;
use tokio::sync::broadcast;

use crate::auth::{verify_token, Claims};
use crate::relay::{Relay, RelayEvent};
use crate::util;

#[derive(Debug, Deserialize)]
#[serde(tag = "event", rename_all = "camelCase")]
enum ClientFrame {
    JoinRoom { token: String },
    Message { text: String },
}

pub async fn socket(
    ws: WebSocketUpgrade,
    Extension(relay): Extension<Arc<Relay>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, relay))
}

async fn handle_socket(socket: WebSocket, relay: Arc<Relay>) {
    let (mut sink, mut stream) = socket.split();

    let claims = match authenticate(&mut sink, &mut stream).await {
        Some(claims) => claims,
        None => return,
    };

    let mut room_rx = relay.join(claims.sub).await;
    let mut all_rx = relay.subscribe_all();
    tracing::debug!(account = %claims.sub, "client joined its room");

    loop {
        tokio::select! {
            frame = room_rx.recv() => {
                if !forward(&mut sink, frame).await {
                    return;
                }
            }
            frame = all_rx.recv() => {
                if !forward(&mut sink, frame).await {
                    return;
                }
            }
            incoming = stream.next() => match incoming {
                Some(Ok(Message::Text(text))) => {
                    if let Ok(ClientFrame::Message { text }) = serde_json::from_str(&text) {
                        relay.broadcast(&RelayEvent::Message { text });
                    }
                }
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => return,
                Some(Ok(_)) => {}
            },
        }
    }
}

/// Waits for the `joinRoom` frame and verifies its token. Frames arriving
/// before it are ignored; a bad token ends the connection.
async fn authenticate(
    sink: &mut SplitSink<WebSocket, Message>,
    stream: &mut SplitStream<WebSocket>,
) -> Option<Claims> {
    loop {
        match stream.next().await {
            Some(Ok(Message::Text(text))) => {
                if let Ok(ClientFrame::JoinRoom { token }) = serde_json::from_str(&text) {
                    let secret = match util::jwt_secret() {
                        Ok(secret) => secret,
                        Err(error) => {
                            tracing::error!(%error, "cannot verify socket tokens");
                            return None;
                        }
                    };

                    match verify_token(&token, &secret) {
                        Ok(claims) => return Some(claims),
                        Err(error) => {
                            let frame = json!({
                                "event": "error",
                                "message": error.to_string(),
                            });
                            let _ = sink.send(Message::Text(frame.to_string())).await;
                            return None;
                        }
                    }
                }
            }
            Some(Ok(Message::Close(_))) | Some(Err(_)) | None => return None,
            Some(Ok(_)) => {}
        }
    }
}

/// Pushes one relay frame down to the client. Lagged receivers just skip
/// ahead; that is the at-most-once contract.
async fn forward(
    sink: &mut SplitSink<WebSocket, Message>,
    frame: Result<String, broadcast::error::RecvError>,
) -> bool {
    match frame {
        Ok(text) => sink.send(Message::Text(text)).await.is_ok(),
        Err(broadcast::error::RecvError::Lagged(skipped)) => {
            tracing::debug!(skipped, "client fell behind, frames dropped");
            true
        }
        Err(broadcast::error::RecvError::Closed) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_room_frames_parse() {
        let frame: ClientFrame =
            serde_json::from_str(r#"{"event": "joinRoom", "token": "abc"}"#).unwrap();
        assert!(matches!(frame, ClientFrame::JoinRoom { token } if token == "abc"));
    }

    #[test]
    fn message_frames_parse() {
        let frame: ClientFrame =
            serde_json::from_str(r#"{"event": "message", "text": "hi all"}"#).unwrap();
        assert!(matches!(frame, ClientFrame::Message { text } if text == "hi all"));
    }

    #[test]
    fn unknown_frames_are_rejected() {
        assert!(serde_json::from_str::<ClientFrame>(r#"{"event": "leaveRoom"}"#).is_err());
        assert!(serde_json::from_str::<ClientFrame>(r#"{"text": "no tag"}"#).is_err());
    }
}
