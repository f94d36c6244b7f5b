use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::models::{Conversation, LastMessage, Message, NewMessage, User};

pub mod memory;

pub use memory::MemoryStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Seam to the persistent record store. The store is an external
/// collaborator; this service only issues simple document operations:
/// get/put/delete, two targeted field updates, and the bounded queries the
/// chat core needs.
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn get_conversation(&self, id: &str) -> StoreResult<Option<Conversation>>;

    async fn put_conversation(&self, conversation: &Conversation) -> StoreResult<()>;

    /// Idempotent; deleting an unknown id is not an error.
    async fn delete_conversation(&self, id: &str) -> StoreResult<()>;

    /// Conversations containing the user, most recently updated first.
    async fn conversations_for_user(&self, user_id: &str) -> StoreResult<Vec<Conversation>>;

    /// Merge `lastSeen.<user_id> = at` into an existing conversation.
    /// Returns false when the conversation does not exist.
    async fn set_last_seen(
        &self,
        conversation_id: &str,
        user_id: &str,
        at: DateTime<Utc>,
    ) -> StoreResult<bool>;

    /// Replace the conversation's summary and bump `updatedAt` to the
    /// summary timestamp. Returns false when the conversation does not
    /// exist.
    async fn set_last_message(
        &self,
        conversation_id: &str,
        summary: &LastMessage,
    ) -> StoreResult<bool>;

    /// Persist a message, assigning its id and timestamp.
    async fn append_message(&self, draft: NewMessage) -> StoreResult<Message>;

    /// Most recent messages for a room, newest first.
    async fn recent_messages(&self, room_id: &str, limit: usize) -> StoreResult<Vec<Message>>;

    async fn active_users(&self) -> StoreResult<Vec<User>>;

    async fn put_user(&self, user: &User) -> StoreResult<()>;
}
