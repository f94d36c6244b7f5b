use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A persisted chat message. Field names on the wire match the room
/// protocol: the sender fields travel as `userId`/`userName`/`userType` and
/// the body as `message`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    #[serde(rename = "roomId")]
    pub room_id: String,
    #[serde(rename = "userId")]
    pub sender_id: String,
    #[serde(rename = "userName")]
    pub sender_name: String,
    #[serde(rename = "userType")]
    pub sender_type: String,
    #[serde(rename = "message")]
    pub body: String,
    pub timestamp: DateTime<Utc>,
}

/// Message draft handed to the store; id and timestamp are assigned on
/// persist.
#[derive(Debug, Clone)]
pub struct NewMessage {
    pub room_id: String,
    pub sender_id: String,
    pub sender_name: String,
    pub sender_type: String,
    pub body: String,
}

pub fn default_sender_type() -> String {
    "student".to_string()
}
