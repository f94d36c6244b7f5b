use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Message;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: ConversationKind,
    pub name: Option<String>,
    pub participant_ids: Vec<String>,
    pub participants: Vec<Participant>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub creator_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_message: Option<LastMessage>,
    pub last_seen: HashMap<String, DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConversationKind {
    Direct,
    Group,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Participant {
    pub id: String,
    pub name: String,
    pub user_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<GroupRole>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GroupRole {
    Admin,
    Member,
}

impl Default for GroupRole {
    fn default() -> Self {
        Self::Member
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LastMessage {
    pub text: String,
    pub sender_id: String,
    pub sender_name: String,
    pub timestamp: DateTime<Utc>,
}

impl From<&Message> for LastMessage {
    fn from(message: &Message) -> Self {
        Self {
            text: message.body.clone(),
            sender_id: message.sender_id.clone(),
            sender_name: message.sender_name.clone(),
            timestamp: message.timestamp,
        }
    }
}

/// Canonical id for a two-party conversation: the participant ids sorted
/// lexicographically, so both orderings resolve to the same record.
pub fn direct_conversation_id(a: &str, b: &str) -> String {
    let (first, second) = if a <= b { (a, b) } else { (b, a) };
    format!("chat_{}_{}", first, second)
}

pub fn new_group_id() -> String {
    format!("group_{}", Uuid::new_v4())
}

impl Conversation {
    pub fn direct(name: Option<String>, participants: Vec<Participant>) -> Self {
        let id = direct_conversation_id(&participants[0].id, &participants[1].id);
        let now = Utc::now();
        Self {
            id,
            kind: ConversationKind::Direct,
            name,
            participant_ids: participant_ids_of(&participants),
            participants,
            creator_id: None,
            created_at: now,
            updated_at: now,
            last_message: None,
            last_seen: HashMap::new(),
        }
    }

    pub fn group(name: String, participants: Vec<Participant>, creator_id: String) -> Self {
        let now = Utc::now();
        Self {
            id: new_group_id(),
            kind: ConversationKind::Group,
            name: Some(name),
            participant_ids: participant_ids_of(&participants),
            participants,
            creator_id: Some(creator_id),
            created_at: now,
            updated_at: now,
            last_message: None,
            last_seen: HashMap::new(),
        }
    }

    /// Replace the participant list, keeping `participant_ids` in sync.
    pub fn set_participants(&mut self, participants: Vec<Participant>) {
        self.participant_ids = participant_ids_of(&participants);
        self.participants = participants;
    }

    pub fn is_group(&self) -> bool {
        self.kind == ConversationKind::Group
    }
}

fn participant_ids_of(participants: &[Participant]) -> Vec<String> {
    let mut ids: Vec<String> = Vec::with_capacity(participants.len());
    for participant in participants {
        if !ids.contains(&participant.id) {
            ids.push(participant.id.clone());
        }
    }
    ids
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatEntity {
    pub id: String,
    pub kind: EntityKind,
    pub name: String,
    #[serde(rename = "type")]
    pub role: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    User,
    Group,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn direct_id_is_order_insensitive() {
        assert_eq!(direct_conversation_id("alice", "bob"), "chat_alice_bob");
        assert_eq!(direct_conversation_id("bob", "alice"), "chat_alice_bob");
    }

    #[test]
    fn participant_ids_follow_participants() {
        let mut conversation = Conversation::group(
            "Lesson 3".to_string(),
            vec![
                participant("carol", Some(GroupRole::Admin)),
                participant("dave", Some(GroupRole::Member)),
            ],
            "carol".to_string(),
        );
        assert_eq!(conversation.participant_ids, vec!["carol", "dave"]);

        conversation.set_participants(vec![participant("carol", Some(GroupRole::Admin))]);
        assert_eq!(conversation.participant_ids, vec!["carol"]);
    }

    fn participant(id: &str, role: Option<GroupRole>) -> Participant {
        Participant {
            id: id.to_string(),
            name: id.to_string(),
            user_type: "student".to_string(),
            role,
        }
    }
}
