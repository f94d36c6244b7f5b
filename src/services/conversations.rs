use std::sync::Arc;

use chrono::Utc;

use crate::{
    error::{AppError, AppResult},
    models::{
        direct_conversation_id, ChatEntity, Conversation, EntityKind, GroupRole, Participant,
    },
    storage::RecordStore,
};

/// Directory of direct and group conversations. Everything here is plain
/// request/response against the record store; live delivery is the hub's
/// and broker's business.
pub struct ConversationService {
    store: Arc<dyn RecordStore>,
}

impl ConversationService {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    /// Resolve the canonical two-party conversation, creating it on first
    /// contact. Both orderings of the pair land on the same id, which is
    /// what makes concurrent creation collapse into idempotent writes of an
    /// identical record.
    pub async fn get_or_create_direct(
        &self,
        a: Participant,
        b: Participant,
        name: Option<String>,
    ) -> AppResult<(Conversation, bool)> {
        let id = direct_conversation_id(&a.id, &b.id);
        if let Some(existing) = self.store.get_conversation(&id).await? {
            return Ok((existing, false));
        }

        let mut participants = vec![a, b];
        participants.sort_by(|x, y| x.id.cmp(&y.id));
        for participant in &mut participants {
            participant.role = None;
        }

        let conversation = Conversation::direct(name, participants);
        self.store.put_conversation(&conversation).await?;
        Ok((conversation, true))
    }

    /// Create a group conversation. The creator always ends up a
    /// participant with role `admin`, whether or not the caller listed them.
    pub async fn create_group(
        &self,
        name: &str,
        mut participants: Vec<Participant>,
        creator: &Participant,
    ) -> AppResult<Conversation> {
        if name.trim().is_empty() || participants.len() < 2 {
            return Err(AppError::BadRequest(
                "Group name and at least 2 participants required".to_string(),
            ));
        }

        if !participants.iter().any(|p| p.id == creator.id) {
            participants.insert(0, creator.clone());
        }
        for participant in &mut participants {
            participant.role = Some(if participant.id == creator.id {
                GroupRole::Admin
            } else {
                GroupRole::Member
            });
        }

        let conversation =
            Conversation::group(name.to_string(), participants, creator.id.clone());
        self.store.put_conversation(&conversation).await?;
        Ok(conversation)
    }

    /// Apply a group mutation. Last write wins: there is no version check,
    /// so concurrent updates overwrite each other.
    pub async fn update_group(
        &self,
        group_id: &str,
        action: &str,
        name: Option<String>,
        participants: Option<Vec<Participant>>,
    ) -> AppResult<Conversation> {
        let mut group = self
            .store
            .get_conversation(group_id)
            .await?
            .ok_or(AppError::GroupNotFound)?;
        if !group.is_group() {
            return Err(AppError::NotGroupConversation);
        }

        match action {
            "rename" => {
                let name = name
                    .filter(|n| !n.trim().is_empty())
                    .ok_or_else(|| AppError::BadRequest("Group name required".to_string()))?;
                group.name = Some(name);
            }
            "update_members" => {
                let mut participants = participants
                    .ok_or_else(|| AppError::BadRequest("Participants required".to_string()))?;
                for participant in &mut participants {
                    participant.role = Some(participant.role.unwrap_or_default());
                }
                group.set_participants(participants);
            }
            _ => return Err(AppError::BadRequest("Invalid action".to_string())),
        }

        group.updated_at = Utc::now();
        self.store.put_conversation(&group).await?;
        Ok(group)
    }

    /// Detach a group record. Unknown ids are an error on this call path;
    /// the store-level delete itself is idempotent. Messages are left in
    /// place.
    pub async fn delete_group(&self, group_id: &str) -> AppResult<()> {
        let existing = self
            .store
            .get_conversation(group_id)
            .await?
            .ok_or(AppError::GroupNotFound)?;
        if !existing.is_group() {
            return Err(AppError::NotGroupConversation);
        }
        self.store.delete_conversation(group_id).await?;
        Ok(())
    }

    /// The caller's conversations, most recently updated first.
    pub async fn list_for_user(&self, user_id: &str) -> AppResult<Vec<Conversation>> {
        Ok(self.store.conversations_for_user(user_id).await?)
    }

    /// Everything the caller can message: each active user as a direct-chat
    /// target, plus the caller's groups.
    pub async fn list_entities(&self, user_id: &str) -> AppResult<Vec<ChatEntity>> {
        let mut entities: Vec<ChatEntity> = self
            .store
            .active_users()
            .await?
            .into_iter()
            .map(|user| ChatEntity {
                id: user.id,
                kind: EntityKind::User,
                name: user.name,
                role: user.role,
            })
            .collect();

        let conversations = self.store.conversations_for_user(user_id).await?;
        entities.extend(conversations.into_iter().filter(Conversation::is_group).map(
            |group| ChatEntity {
                id: group.id,
                kind: EntityKind::Group,
                name: group.name.unwrap_or_default(),
                role: "other".to_string(),
            },
        ));

        Ok(entities)
    }
}
