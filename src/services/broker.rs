use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot, Mutex};

use crate::{
    api::hub::{ConnectionHub, WsOutgoingMessage},
    error::{AppError, AppResult},
    models::{LastMessage, Message, NewMessage},
    storage::RecordStore,
};

struct SendRequest {
    draft: NewMessage,
    reply: oneshot::Sender<AppResult<Message>>,
}

/// Accepts outbound messages and serializes persist, summary refresh, and
/// fan-out through one worker task per active room, so every subscriber of
/// a room observes `receive_message` events in a single order. Different
/// rooms run on independent workers.
pub struct MessageBroker {
    store: Arc<dyn RecordStore>,
    hub: Arc<ConnectionHub>,
    queue_depth: usize,
    workers: Mutex<HashMap<String, mpsc::Sender<SendRequest>>>,
}

impl MessageBroker {
    pub fn new(store: Arc<dyn RecordStore>, hub: Arc<ConnectionHub>, queue_depth: usize) -> Self {
        Self {
            store,
            hub,
            queue_depth,
            workers: Mutex::new(HashMap::new()),
        }
    }

    /// Persist and deliver one message. A store failure on the persist is
    /// surfaced and nothing is broadcast; the returned message carries the
    /// store-assigned id and timestamp.
    pub async fn send(&self, draft: NewMessage) -> AppResult<Message> {
        let inbox = self.room_worker(&draft.room_id).await;
        let (reply_tx, reply_rx) = oneshot::channel();
        inbox
            .send(SendRequest {
                draft,
                reply: reply_tx,
            })
            .await
            .map_err(|_| AppError::Internal(anyhow::anyhow!("room worker stopped")))?;
        reply_rx
            .await
            .map_err(|_| AppError::Internal(anyhow::anyhow!("room worker dropped the request")))?
    }

    /// Inbox of the room's worker task, spawning it on first use. Workers
    /// stay up for the life of the process; the map is bounded by the
    /// number of rooms ever messaged.
    async fn room_worker(&self, room_id: &str) -> mpsc::Sender<SendRequest> {
        let mut workers = self.workers.lock().await;
        if let Some(inbox) = workers.get(room_id) {
            return inbox.clone();
        }
        let (tx, rx) = mpsc::channel(self.queue_depth);
        tokio::spawn(run_room_worker(
            room_id.to_string(),
            self.store.clone(),
            self.hub.clone(),
            rx,
        ));
        workers.insert(room_id.to_string(), tx.clone());
        tx
    }
}

async fn run_room_worker(
    room_id: String,
    store: Arc<dyn RecordStore>,
    hub: Arc<ConnectionHub>,
    mut inbox: mpsc::Receiver<SendRequest>,
) {
    tracing::debug!("Room worker started: {}", room_id);
    while let Some(request) = inbox.recv().await {
        let result = process_send(store.as_ref(), &hub, request.draft).await;
        let _ = request.reply.send(result);
    }
    tracing::debug!("Room worker stopped: {}", room_id);
}

async fn process_send(
    store: &dyn RecordStore,
    hub: &ConnectionHub,
    draft: NewMessage,
) -> AppResult<Message> {
    let message = store.append_message(draft).await?;

    // The message is already durable: a failed summary refresh is logged
    // and the delivery below still happens.
    let summary = LastMessage::from(&message);
    match store.set_last_message(&message.room_id, &summary).await {
        Ok(true) => {}
        Ok(false) => {
            tracing::warn!("Could not update conversation {}: not found", message.room_id)
        }
        Err(err) => tracing::warn!("Could not update conversation {}: {}", message.room_id, err),
    }

    let event = WsOutgoingMessage::new(
        "receive_message",
        serde_json::to_value(&message).map_err(anyhow::Error::from)?,
    );
    hub.broadcast(&message.room_id, event, None).await;

    Ok(message)
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};

    use async_trait::async_trait;
    use chrono::{DateTime, Utc};
    use uuid::Uuid;

    use super::*;
    use crate::models::{Conversation, Participant, User};
    use crate::storage::{MemoryStore, StoreError, StoreResult};

    fn draft(room_id: &str, sender: &str, body: &str) -> NewMessage {
        NewMessage {
            room_id: room_id.to_string(),
            sender_id: sender.to_string(),
            sender_name: sender.to_string(),
            sender_type: "student".to_string(),
            body: body.to_string(),
        }
    }

    async fn direct_conversation(store: &MemoryStore) -> Conversation {
        let participants = ["alice", "bob"]
            .map(|id| Participant {
                id: id.to_string(),
                name: id.to_string(),
                user_type: "student".to_string(),
                role: None,
            })
            .to_vec();
        let conversation = Conversation::direct(None, participants);
        store.put_conversation(&conversation).await.unwrap();
        conversation
    }

    async fn subscriber(
        hub: &ConnectionHub,
        room_id: &str,
        user: &str,
    ) -> mpsc::Receiver<WsOutgoingMessage> {
        let id = Uuid::new_v4();
        let (tx, mut rx) = mpsc::channel(32);
        hub.register(id, tx).await;
        hub.join(id, room_id, user, user).await;
        // Swallow the join ack so tests only see message traffic.
        while let Ok(event) = rx.try_recv() {
            assert_ne!(event.event, "receive_message");
        }
        rx
    }

    #[tokio::test]
    async fn sends_are_ordered_and_fan_out_includes_sender() {
        let store = Arc::new(MemoryStore::new());
        let hub = Arc::new(ConnectionHub::new());
        let broker = MessageBroker::new(store.clone(), hub.clone(), 32);
        let conversation = direct_conversation(&store).await;

        let mut alice_rx = subscriber(&hub, &conversation.id, "alice").await;
        let mut bob_rx = subscriber(&hub, &conversation.id, "bob").await;
        let _ = alice_rx.try_recv(); // bob's user_joined

        for body in ["hi", "how are you?", "see you at the lesson"] {
            broker.send(draft(&conversation.id, "alice", body)).await.unwrap();
        }

        for rx in [&mut alice_rx, &mut bob_rx] {
            let mut seen = Vec::new();
            while let Ok(event) = rx.try_recv() {
                assert_eq!(event.event, "receive_message");
                seen.push(event.payload["message"].as_str().unwrap().to_string());
            }
            assert_eq!(seen, vec!["hi", "how are you?", "see you at the lesson"]);
        }

        let stored = store
            .get_conversation(&conversation.id)
            .await
            .unwrap()
            .unwrap();
        let summary = stored.last_message.expect("summary after send");
        assert_eq!(summary.text, "see you at the lesson");
        assert_eq!(summary.sender_id, "alice");
        assert_eq!(stored.updated_at, summary.timestamp);
    }

    #[tokio::test]
    async fn history_matches_send_order() {
        let store = Arc::new(MemoryStore::new());
        let hub = Arc::new(ConnectionHub::new());
        let broker = MessageBroker::new(store.clone(), hub, 32);
        let conversation = direct_conversation(&store).await;

        let mut sent = Vec::new();
        for i in 0..4 {
            let message = broker
                .send(draft(&conversation.id, "alice", &format!("msg-{}", i)))
                .await
                .unwrap();
            sent.push(message.id);
        }

        let mut recent = store.recent_messages(&conversation.id, 10).await.unwrap();
        recent.reverse();
        let ids: Vec<String> = recent.into_iter().map(|m| m.id).collect();
        assert_eq!(ids, sent);
    }

    /// Store double that can be told to fail specific operations.
    struct FlakyStore {
        inner: MemoryStore,
        fail_append: AtomicBool,
        fail_summary: AtomicBool,
    }

    impl FlakyStore {
        fn new(inner: MemoryStore) -> Self {
            Self {
                inner,
                fail_append: AtomicBool::new(false),
                fail_summary: AtomicBool::new(false),
            }
        }
    }

    #[async_trait]
    impl RecordStore for FlakyStore {
        async fn get_conversation(&self, id: &str) -> StoreResult<Option<Conversation>> {
            self.inner.get_conversation(id).await
        }

        async fn put_conversation(&self, conversation: &Conversation) -> StoreResult<()> {
            self.inner.put_conversation(conversation).await
        }

        async fn delete_conversation(&self, id: &str) -> StoreResult<()> {
            self.inner.delete_conversation(id).await
        }

        async fn conversations_for_user(&self, user_id: &str) -> StoreResult<Vec<Conversation>> {
            self.inner.conversations_for_user(user_id).await
        }

        async fn set_last_seen(
            &self,
            conversation_id: &str,
            user_id: &str,
            at: DateTime<Utc>,
        ) -> StoreResult<bool> {
            self.inner.set_last_seen(conversation_id, user_id, at).await
        }

        async fn set_last_message(
            &self,
            conversation_id: &str,
            summary: &LastMessage,
        ) -> StoreResult<bool> {
            if self.fail_summary.load(Ordering::SeqCst) {
                return Err(StoreError::Unavailable("summary write refused".to_string()));
            }
            self.inner.set_last_message(conversation_id, summary).await
        }

        async fn append_message(&self, draft: NewMessage) -> StoreResult<Message> {
            if self.fail_append.load(Ordering::SeqCst) {
                return Err(StoreError::Unavailable("message write refused".to_string()));
            }
            self.inner.append_message(draft).await
        }

        async fn recent_messages(&self, room_id: &str, limit: usize) -> StoreResult<Vec<Message>> {
            self.inner.recent_messages(room_id, limit).await
        }

        async fn active_users(&self) -> StoreResult<Vec<User>> {
            self.inner.active_users().await
        }

        async fn put_user(&self, user: &User) -> StoreResult<()> {
            self.inner.put_user(user).await
        }
    }

    #[tokio::test]
    async fn summary_failure_still_delivers() {
        let store = Arc::new(FlakyStore::new(MemoryStore::new()));
        let hub = Arc::new(ConnectionHub::new());
        let broker = MessageBroker::new(store.clone(), hub.clone(), 32);
        let conversation = direct_conversation(&store.inner).await;
        let mut rx = subscriber(&hub, &conversation.id, "bob").await;

        store.fail_summary.store(true, Ordering::SeqCst);
        let message = broker
            .send(draft(&conversation.id, "alice", "hi"))
            .await
            .expect("persisted message is delivered despite summary failure");

        let event = rx.try_recv().unwrap();
        assert_eq!(event.event, "receive_message");
        assert_eq!(event.payload["id"], message.id.as_str());
        assert_eq!(event.payload["message"], "hi");
    }

    #[tokio::test]
    async fn persist_failure_surfaces_and_broadcasts_nothing() {
        let store = Arc::new(FlakyStore::new(MemoryStore::new()));
        let hub = Arc::new(ConnectionHub::new());
        let broker = MessageBroker::new(store.clone(), hub.clone(), 32);
        let conversation = direct_conversation(&store.inner).await;
        let mut rx = subscriber(&hub, &conversation.id, "bob").await;

        store.fail_append.store(true, Ordering::SeqCst);
        let err = broker
            .send(draft(&conversation.id, "alice", "hi"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Store(_)));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn rooms_do_not_serialize_against_each_other() {
        let store = Arc::new(MemoryStore::new());
        let hub = Arc::new(ConnectionHub::new());
        let broker = Arc::new(MessageBroker::new(store.clone(), hub, 32));

        let (a, b) = tokio::join!(
            broker.send(draft("chat_alice_bob", "alice", "one")),
            broker.send(draft("chat_carol_dave", "carol", "two")),
        );
        assert_eq!(a.unwrap().room_id, "chat_alice_bob");
        assert_eq!(b.unwrap().room_id, "chat_carol_dave");
    }
}
