use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::models::{Conversation, LastMessage, Message, NewMessage, User};

use super::{RecordStore, StoreResult};

/// In-process record store. Backs the server by default and every test;
/// a deployment against a real document store swaps this behind
/// [`RecordStore`].
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

#[derive(Default)]
struct Inner {
    conversations: HashMap<String, Conversation>,
    /// Messages per room in append order (oldest first).
    messages: HashMap<String, Vec<Message>>,
    users: HashMap<String, User>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn get_conversation(&self, id: &str) -> StoreResult<Option<Conversation>> {
        let inner = self.inner.read().await;
        Ok(inner.conversations.get(id).cloned())
    }

    async fn put_conversation(&self, conversation: &Conversation) -> StoreResult<()> {
        let mut inner = self.inner.write().await;
        inner
            .conversations
            .insert(conversation.id.clone(), conversation.clone());
        Ok(())
    }

    async fn delete_conversation(&self, id: &str) -> StoreResult<()> {
        let mut inner = self.inner.write().await;
        inner.conversations.remove(id);
        Ok(())
    }

    async fn conversations_for_user(&self, user_id: &str) -> StoreResult<Vec<Conversation>> {
        let inner = self.inner.read().await;
        let mut conversations: Vec<Conversation> = inner
            .conversations
            .values()
            .filter(|c| c.participant_ids.iter().any(|id| id == user_id))
            .cloned()
            .collect();
        conversations.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(conversations)
    }

    async fn set_last_seen(
        &self,
        conversation_id: &str,
        user_id: &str,
        at: DateTime<Utc>,
    ) -> StoreResult<bool> {
        let mut inner = self.inner.write().await;
        match inner.conversations.get_mut(conversation_id) {
            Some(conversation) => {
                conversation.last_seen.insert(user_id.to_string(), at);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn set_last_message(
        &self,
        conversation_id: &str,
        summary: &LastMessage,
    ) -> StoreResult<bool> {
        let mut inner = self.inner.write().await;
        match inner.conversations.get_mut(conversation_id) {
            Some(conversation) => {
                conversation.updated_at = summary.timestamp;
                conversation.last_message = Some(summary.clone());
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn append_message(&self, draft: NewMessage) -> StoreResult<Message> {
        let message = Message {
            id: Uuid::new_v4().to_string(),
            room_id: draft.room_id,
            sender_id: draft.sender_id,
            sender_name: draft.sender_name,
            sender_type: draft.sender_type,
            body: draft.body,
            timestamp: Utc::now(),
        };
        let mut inner = self.inner.write().await;
        inner
            .messages
            .entry(message.room_id.clone())
            .or_default()
            .push(message.clone());
        Ok(message)
    }

    async fn recent_messages(&self, room_id: &str, limit: usize) -> StoreResult<Vec<Message>> {
        let inner = self.inner.read().await;
        let messages = inner
            .messages
            .get(room_id)
            .map(|log| log.iter().rev().take(limit).cloned().collect())
            .unwrap_or_default();
        Ok(messages)
    }

    async fn active_users(&self) -> StoreResult<Vec<User>> {
        let inner = self.inner.read().await;
        let mut users: Vec<User> = inner
            .users
            .values()
            .filter(|u| u.is_active)
            .cloned()
            .collect();
        users.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(users)
    }

    async fn put_user(&self, user: &User) -> StoreResult<()> {
        let mut inner = self.inner.write().await;
        inner.users.insert(user.id.clone(), user.clone());
        Ok(())
    }
}
