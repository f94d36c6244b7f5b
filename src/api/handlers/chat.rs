use axum::{
    extract::{Path, State},
    Extension, Json,
};
use serde::{Deserialize, Serialize};

use crate::{
    error::{AppError, AppResult},
    models::{ChatEntity, Conversation, GroupRole, Participant},
    AppState,
};

use super::super::middleware::CallerIdentity;

/// Participant as clients send it: `type` on the wire, role only meaningful
/// for group payloads.
#[derive(Debug, Clone, Deserialize)]
pub struct ParticipantSpec {
    pub id: String,
    pub name: String,
    #[serde(rename = "type", default = "crate::models::default_sender_type")]
    pub user_type: String,
    #[serde(default)]
    pub role: Option<GroupRole>,
}

impl From<ParticipantSpec> for Participant {
    fn from(value: ParticipantSpec) -> Self {
        Participant {
            id: value.id,
            name: value.name,
            user_type: value.user_type,
            role: value.role,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ConversationsResponse {
    pub success: bool,
    pub conversations: Vec<Conversation>,
}

pub async fn get_conversations(
    State(state): State<AppState>,
    Extension(identity): Extension<CallerIdentity>,
) -> AppResult<Json<ConversationsResponse>> {
    let conversations = state.conversations.list_for_user(&identity.id).await?;
    Ok(Json(ConversationsResponse {
        success: true,
        conversations,
    }))
}

#[derive(Debug, Serialize)]
pub struct EntitiesResponse {
    pub success: bool,
    pub entities: Vec<ChatEntity>,
}

pub async fn get_entities(
    State(state): State<AppState>,
    Extension(identity): Extension<CallerIdentity>,
) -> AppResult<Json<EntitiesResponse>> {
    let entities = state.conversations.list_entities(&identity.id).await?;
    Ok(Json(EntitiesResponse {
        success: true,
        entities,
    }))
}

#[derive(Debug, Deserialize)]
pub struct CreateDirectRequest {
    pub name: Option<String>,
    #[serde(default)]
    pub participants: Vec<ParticipantSpec>,
}

#[derive(Debug, Serialize)]
pub struct DirectConversationResponse {
    pub success: bool,
    pub conversation: Conversation,
    #[serde(rename = "isNew")]
    pub is_new: bool,
}

pub async fn create_direct_conversation(
    State(state): State<AppState>,
    Json(req): Json<CreateDirectRequest>,
) -> AppResult<Json<DirectConversationResponse>> {
    let [a, b]: [ParticipantSpec; 2] = req.participants.try_into().map_err(|_| {
        AppError::BadRequest("Exactly 2 participants required for 1-1 chat".to_string())
    })?;

    let (conversation, is_new) = state
        .conversations
        .get_or_create_direct(a.into(), b.into(), req.name)
        .await?;

    Ok(Json(DirectConversationResponse {
        success: true,
        conversation,
        is_new,
    }))
}

#[derive(Debug, Deserialize)]
pub struct CreateGroupRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub participants: Vec<ParticipantSpec>,
}

#[derive(Debug, Serialize)]
pub struct GroupResponse {
    pub success: bool,
    pub group: Conversation,
}

pub async fn create_group(
    State(state): State<AppState>,
    Extension(identity): Extension<CallerIdentity>,
    Json(req): Json<CreateGroupRequest>,
) -> AppResult<Json<GroupResponse>> {
    let creator = Participant {
        id: identity.id,
        name: identity.name,
        user_type: identity.role,
        role: None,
    };
    let participants = req.participants.into_iter().map(Into::into).collect();

    let group = state
        .conversations
        .create_group(&req.name, participants, &creator)
        .await?;

    Ok(Json(GroupResponse {
        success: true,
        group,
    }))
}

#[derive(Debug, Deserialize)]
pub struct UpdateGroupRequest {
    #[serde(default)]
    pub action: String,
    pub name: Option<String>,
    pub participants: Option<Vec<ParticipantSpec>>,
}

pub async fn update_group(
    State(state): State<AppState>,
    Path(group_id): Path<String>,
    Json(req): Json<UpdateGroupRequest>,
) -> AppResult<Json<GroupResponse>> {
    let participants = req
        .participants
        .map(|list| list.into_iter().map(Into::into).collect());

    let group = state
        .conversations
        .update_group(&group_id, &req.action, req.name, participants)
        .await?;

    Ok(Json(GroupResponse {
        success: true,
        group,
    }))
}

#[derive(Debug, Serialize)]
pub struct DeleteGroupResponse {
    pub success: bool,
    pub message: String,
}

pub async fn delete_group(
    State(state): State<AppState>,
    Path(group_id): Path<String>,
) -> AppResult<Json<DeleteGroupResponse>> {
    state.conversations.delete_group(&group_id).await?;
    Ok(Json(DeleteGroupResponse {
        success: true,
        message: "Group deleted successfully".to_string(),
    }))
}
