use std::sync::Arc;

use crate::{
    config::ChatConfig,
    error::AppResult,
    models::Message,
    storage::RecordStore,
};

/// Bounded, chronologically ordered slice of a room's past messages.
pub struct HistoryService {
    store: Arc<dyn RecordStore>,
    default_limit: usize,
    max_limit: usize,
}

impl HistoryService {
    pub fn new(store: Arc<dyn RecordStore>, chat: &ChatConfig) -> Self {
        Self {
            store,
            default_limit: chat.default_history_limit,
            max_limit: chat.max_history_limit,
        }
    }

    /// The most recent messages of a room, oldest first. The store hands
    /// them back newest-first; reversing keeps callers on chronological
    /// order regardless of the store's native ordering.
    pub async fn history(&self, room_id: &str, limit: Option<usize>) -> AppResult<Vec<Message>> {
        let limit = limit.unwrap_or(self.default_limit).min(self.max_limit);
        let mut messages = self.store.recent_messages(room_id, limit).await?;
        messages.reverse();
        Ok(messages)
    }
}
