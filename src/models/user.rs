use serde::{Deserialize, Serialize};

/// Account record owned by the identity subsystem. Read here only to build
/// the messageable-entities view; never written by this service.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub name: String,
    pub role: String,
    pub is_active: bool,
}
