use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::json;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::{models::NewMessage, AppState};

use super::hub::{ConnectionId, WsOutgoingMessage};

#[derive(Debug, Clone, Deserialize)]
pub struct WsIncomingMessage {
    #[serde(rename = "type")]
    pub event: String,
    #[serde(default)]
    pub payload: serde_json::Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JoinRoomPayload {
    room_id: String,
    user_id: String,
    user_name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SendMessagePayload {
    room_id: String,
    user_id: String,
    user_name: String,
    #[serde(default = "crate::models::default_sender_type")]
    user_type: String,
    message: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LeaveRoomPayload {
    room_id: String,
    user_name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GetHistoryPayload {
    room_id: String,
    limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TypingPayload {
    room_id: String,
    user_name: String,
    is_typing: bool,
}

pub async fn handle_websocket(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let connection_id = Uuid::new_v4();
    let (mut ws_sender, mut ws_receiver) = socket.split();

    // Outbound events for this connection flow through a buffered channel;
    // the hub only ever sees the sender half.
    let (tx, mut rx) = mpsc::channel::<WsOutgoingMessage>(state.config.chat.queue_depth);
    state.hub.register(connection_id, tx).await;

    let send_task = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            if let Ok(json) = serde_json::to_string(&event) {
                if ws_sender.send(Message::Text(json)).await.is_err() {
                    break;
                }
            }
        }
    });

    let recv_state = state.clone();
    let recv_task = tokio::spawn(async move {
        while let Some(result) = ws_receiver.next().await {
            match result {
                Ok(Message::Text(text)) => {
                    match serde_json::from_str::<WsIncomingMessage>(&text) {
                        Ok(incoming) => dispatch_event(&recv_state, connection_id, incoming).await,
                        Err(_) => {
                            report_failure(&recv_state, connection_id, "Malformed event payload")
                                .await
                        }
                    }
                }
                Ok(Message::Close(_)) => break,
                Err(_) => break,
                _ => {}
            }
        }
    });

    tokio::select! {
        _ = send_task => {},
        _ = recv_task => {},
    }

    // Leaving rooms on disconnect is silent; only an explicit leave_room
    // notifies the others.
    state.hub.disconnect(connection_id).await;
}

/// Route one inbound event for one connection. Failures, whether a
/// malformed payload or a failing operation, are reported to this connection
/// only and never terminate it.
async fn dispatch_event(state: &AppState, connection_id: ConnectionId, incoming: WsIncomingMessage) {
    match incoming.event.as_str() {
        "join_room" => match serde_json::from_value::<JoinRoomPayload>(incoming.payload) {
            Ok(payload) => {
                state
                    .hub
                    .join(connection_id, &payload.room_id, &payload.user_id, &payload.user_name)
                    .await;
                // lastSeen is best-effort and stays off the join path.
                let presence = state.presence.clone();
                tokio::spawn(async move {
                    presence.touch(&payload.room_id, &payload.user_id).await;
                });
            }
            Err(_) => report_failure(state, connection_id, "Failed to join room").await,
        },
        "send_message" => match serde_json::from_value::<SendMessagePayload>(incoming.payload) {
            Ok(payload) => {
                let draft = NewMessage {
                    room_id: payload.room_id,
                    sender_id: payload.user_id,
                    sender_name: payload.user_name,
                    sender_type: payload.user_type,
                    body: payload.message,
                };
                if let Err(err) = state.broker.send(draft).await {
                    tracing::warn!("send_message failed: {}", err);
                    report_failure(state, connection_id, "Failed to send message").await;
                }
            }
            Err(_) => report_failure(state, connection_id, "Failed to send message").await,
        },
        "leave_room" => match serde_json::from_value::<LeaveRoomPayload>(incoming.payload) {
            Ok(payload) => {
                state
                    .hub
                    .leave(connection_id, &payload.room_id, &payload.user_name)
                    .await;
            }
            Err(_) => report_failure(state, connection_id, "Malformed event payload").await,
        },
        "get_history" => match serde_json::from_value::<GetHistoryPayload>(incoming.payload) {
            Ok(payload) => match state.history.history(&payload.room_id, payload.limit).await {
                Ok(messages) => {
                    let event = WsOutgoingMessage::new(
                        "chat_history",
                        json!({
                            "roomId": payload.room_id,
                            "messages": messages,
                        }),
                    );
                    state.hub.send_to(connection_id, event).await;
                }
                Err(err) => {
                    tracing::warn!("get_history failed: {}", err);
                    report_failure(state, connection_id, "Failed to load chat history").await;
                }
            },
            Err(_) => report_failure(state, connection_id, "Failed to load chat history").await,
        },
        "typing" => match serde_json::from_value::<TypingPayload>(incoming.payload) {
            Ok(payload) => {
                state
                    .presence
                    .typing(&payload.room_id, &payload.user_name, payload.is_typing, connection_id)
                    .await;
            }
            Err(_) => report_failure(state, connection_id, "Malformed event payload").await,
        },
        _ => {
            tracing::warn!("Unknown event type: {}", incoming.event);
        }
    }
}

async fn report_failure(state: &AppState, connection_id: ConnectionId, message: &str) {
    let event = WsOutgoingMessage::new("error", json!({ "message": message }));
    state.hub.send_to(connection_id, event).await;
}
