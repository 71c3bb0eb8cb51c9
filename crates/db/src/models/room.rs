use bson::{oid::ObjectId, DateTime};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Room {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub title: String,
    pub description: Option<String>,
    /// Engine-side room identifier, unique across rooms.
    pub room_name: String,
    pub date: DateTime,
    /// Wall-clock `HH:MM`.
    pub start_time: String,
    /// Wall-clock `HH:MM`; earlier than `start_time` means the room runs past midnight.
    pub end_time: String,
    #[serde(default)]
    pub status: RoomStatus,
    pub max_participants: u32,
    pub created_by: ObjectId,
    #[serde(default)]
    pub is_public: bool,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum RoomStatus {
    #[default]
    Scheduled,
    Live,
    Completed,
    Cancelled,
}

impl RoomStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RoomStatus::Scheduled => "scheduled",
            RoomStatus::Live => "live",
            RoomStatus::Completed => "completed",
            RoomStatus::Cancelled => "cancelled",
        }
    }

    /// Completed and cancelled rooms admit nobody.
    pub fn is_closed(&self) -> bool {
        matches!(self, RoomStatus::Completed | RoomStatus::Cancelled)
    }
}

impl Room {
    pub const COLLECTION: &'static str = "rooms";
}
