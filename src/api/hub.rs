use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::sync::{mpsc, RwLock};
use uuid::Uuid;

pub type ConnectionId = Uuid;

/// Event envelope pushed to WebSocket clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WsOutgoingMessage {
    #[serde(rename = "type")]
    pub event: String,
    pub payload: serde_json::Value,
}

impl WsOutgoingMessage {
    pub fn new(event: &str, payload: serde_json::Value) -> Self {
        Self {
            event: event.to_string(),
            payload,
        }
    }
}

#[derive(Default)]
struct HubState {
    connections: HashMap<ConnectionId, mpsc::Sender<WsOutgoingMessage>>,
    rooms: HashMap<String, HashSet<ConnectionId>>,
    memberships: HashMap<ConnectionId, HashSet<String>>,
}

impl HubState {
    /// Senders for every current subscriber of a room, minus the excluded
    /// connection.
    fn room_senders(
        &self,
        room_id: &str,
        exclude: Option<ConnectionId>,
    ) -> Vec<mpsc::Sender<WsOutgoingMessage>> {
        self.rooms
            .get(room_id)
            .map(|subscribers| {
                subscribers
                    .iter()
                    .filter(|id| Some(**id) != exclude)
                    .filter_map(|id| self.connections.get(id).cloned())
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// Maps live connections to rooms and fans events out to subscribers. A room
/// id is a conversation id; the hub itself knows nothing about conversation
/// records.
#[derive(Default)]
pub struct ConnectionHub {
    state: RwLock<HubState>,
}

impl ConnectionHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register(&self, id: ConnectionId, sender: mpsc::Sender<WsOutgoingMessage>) {
        let mut state = self.state.write().await;
        state.connections.insert(id, sender);
        tracing::debug!("Connection registered: {}", id);
    }

    /// Drop a connection and detach it from every room it joined. Remaining
    /// subscribers are not notified; only an explicit `leave` emits
    /// `user_left`.
    pub async fn disconnect(&self, id: ConnectionId) {
        let mut state = self.state.write().await;
        state.connections.remove(&id);
        if let Some(rooms) = state.memberships.remove(&id) {
            for room_id in rooms {
                let now_empty = state
                    .rooms
                    .get_mut(&room_id)
                    .map(|subscribers| {
                        subscribers.remove(&id);
                        subscribers.is_empty()
                    })
                    .unwrap_or(false);
                if now_empty {
                    state.rooms.remove(&room_id);
                }
            }
        }
        tracing::debug!("Connection closed: {}", id);
    }

    /// Subscribe a connection to a room. Re-joining is a membership no-op
    /// but still acks the caller and notifies the other subscribers.
    pub async fn join(&self, id: ConnectionId, room_id: &str, user_id: &str, user_name: &str) {
        let (own, others) = {
            let mut state = self.state.write().await;
            state
                .rooms
                .entry(room_id.to_string())
                .or_default()
                .insert(id);
            state
                .memberships
                .entry(id)
                .or_default()
                .insert(room_id.to_string());
            (
                state.connections.get(&id).cloned(),
                state.room_senders(room_id, Some(id)),
            )
        };

        let joined = WsOutgoingMessage::new(
            "user_joined",
            json!({
                "userId": user_id,
                "userName": user_name,
                "message": format!("{} joined the chat", user_name),
            }),
        );
        for sender in others {
            let _ = sender.try_send(joined.clone());
        }

        if let Some(sender) = own {
            let ack = WsOutgoingMessage::new(
                "room_joined",
                json!({
                    "roomId": room_id,
                    "message": "Successfully joined the chat room",
                }),
            );
            let _ = sender.send(ack).await;
        }

        tracing::info!("{} ({}) joined room: {}", user_name, user_id, room_id);
    }

    /// Unsubscribe a connection from a room and tell the remaining
    /// subscribers. The leaving connection is never notified.
    pub async fn leave(&self, id: ConnectionId, room_id: &str, user_name: &str) {
        let others = {
            let mut state = self.state.write().await;
            let now_empty = state
                .rooms
                .get_mut(room_id)
                .map(|subscribers| {
                    subscribers.remove(&id);
                    subscribers.is_empty()
                })
                .unwrap_or(false);
            if now_empty {
                state.rooms.remove(room_id);
            }
            if let Some(rooms) = state.memberships.get_mut(&id) {
                rooms.remove(room_id);
            }
            state.room_senders(room_id, Some(id))
        };

        let left = WsOutgoingMessage::new(
            "user_left",
            json!({
                "userName": user_name,
                "message": format!("{} left the chat", user_name),
            }),
        );
        for sender in others {
            let _ = sender.try_send(left.clone());
        }
    }

    /// Fire-and-forget delivery to every current subscriber of a room. A
    /// slow or closed subscriber is skipped; it never holds up the rest.
    pub async fn broadcast(
        &self,
        room_id: &str,
        event: WsOutgoingMessage,
        exclude: Option<ConnectionId>,
    ) {
        let senders = {
            let state = self.state.read().await;
            state.room_senders(room_id, exclude)
        };
        for sender in senders {
            if sender.try_send(event.clone()).is_err() {
                tracing::debug!("Dropped {} event for a lagging subscriber", event.event);
            }
        }
    }

    /// Direct reply to a single connection (acks, history, protocol errors).
    pub async fn send_to(&self, id: ConnectionId, event: WsOutgoingMessage) {
        let sender = {
            let state = self.state.read().await;
            state.connections.get(&id).cloned()
        };
        if let Some(sender) = sender {
            let _ = sender.send(event).await;
        }
    }
}
