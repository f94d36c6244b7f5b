use std::sync::Arc;

use chrono::Utc;
use serde_json::json;

use crate::{
    api::hub::{ConnectionHub, ConnectionId, WsOutgoingMessage},
    storage::RecordStore,
};

/// Best-effort presence signals. Nothing in here may fail a join or a send:
/// lastSeen writes are absorbed on error and typing is purely ephemeral.
pub struct PresenceTracker {
    store: Arc<dyn RecordStore>,
    hub: Arc<ConnectionHub>,
}

impl PresenceTracker {
    pub fn new(store: Arc<dyn RecordStore>, hub: Arc<ConnectionHub>) -> Self {
        Self { store, hub }
    }

    /// Record that the user is looking at the room now. Failures are logged
    /// and swallowed.
    pub async fn touch(&self, room_id: &str, user_id: &str) {
        match self.store.set_last_seen(room_id, user_id, Utc::now()).await {
            Ok(true) => {}
            Ok(false) => {
                tracing::debug!("No conversation {} for lastSeen update", room_id)
            }
            Err(err) => tracing::warn!("Could not update lastSeen: {}", err),
        }
    }

    /// Relay a typing signal to the rest of the room. Never persisted; the
    /// originating connection is excluded.
    pub async fn typing(
        &self,
        room_id: &str,
        user_name: &str,
        is_typing: bool,
        origin: ConnectionId,
    ) {
        let event = WsOutgoingMessage::new(
            "user_typing",
            json!({
                "userName": user_name,
                "isTyping": is_typing,
            }),
        );
        self.hub.broadcast(room_id, event, Some(origin)).await;
    }
}

#[cfg(test)]
mod tests {
    use tokio::sync::mpsc;
    use uuid::Uuid;

    use super::*;
    use crate::models::{Conversation, Participant};
    use crate::storage::MemoryStore;

    fn participant(id: &str) -> Participant {
        Participant {
            id: id.to_string(),
            name: id.to_string(),
            user_type: "student".to_string(),
            role: None,
        }
    }

    #[tokio::test]
    async fn touch_records_last_seen() {
        let store = Arc::new(MemoryStore::new());
        let presence = PresenceTracker::new(store.clone(), Arc::new(ConnectionHub::new()));

        let conversation =
            Conversation::direct(None, vec![participant("alice"), participant("bob")]);
        store.put_conversation(&conversation).await.unwrap();

        presence.touch(&conversation.id, "alice").await;

        let stored = store
            .get_conversation(&conversation.id)
            .await
            .unwrap()
            .unwrap();
        assert!(stored.last_seen.contains_key("alice"));
        assert!(!stored.last_seen.contains_key("bob"));
    }

    #[tokio::test]
    async fn touch_on_unknown_room_is_absorbed() {
        let presence = PresenceTracker::new(
            Arc::new(MemoryStore::new()),
            Arc::new(ConnectionHub::new()),
        );
        // Nothing to assert beyond "does not error"; the call returns unit.
        presence.touch("chat_ghost_room", "alice").await;
    }

    #[tokio::test]
    async fn typing_reaches_others_but_not_origin() {
        let store = Arc::new(MemoryStore::new());
        let hub = Arc::new(ConnectionHub::new());
        let presence = PresenceTracker::new(store, hub.clone());

        let (alice, bob) = (Uuid::new_v4(), Uuid::new_v4());
        let (alice_tx, mut alice_rx) = mpsc::channel(8);
        let (bob_tx, mut bob_rx) = mpsc::channel(8);
        hub.register(alice, alice_tx).await;
        hub.register(bob, bob_tx).await;
        hub.join(alice, "room", "alice", "Alice").await;
        hub.join(bob, "room", "bob", "Bob").await;
        while alice_rx.try_recv().is_ok() {}
        while bob_rx.try_recv().is_ok() {}

        presence.typing("room", "Alice", true, alice).await;

        assert!(alice_rx.try_recv().is_err());
        let event = bob_rx.try_recv().unwrap();
        assert_eq!(event.event, "user_typing");
        assert_eq!(event.payload["userName"], "Alice");
        assert_eq!(event.payload["isTyping"], true);
    }
}
