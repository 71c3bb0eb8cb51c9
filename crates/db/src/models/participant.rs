use bson::{oid::ObjectId, DateTime};
use serde::{Deserialize, Serialize};

/// Live control-plane membership of one user in one room.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Participant {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub room_id: ObjectId,
    pub user_id: ObjectId,
    #[serde(default)]
    pub role: ParticipantRole,
    #[serde(default)]
    pub status: ParticipantStatus,
    pub joined_at: Option<DateTime>,
    pub left_at: Option<DateTime>,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ParticipantRole {
    Host,
    Cohost,
    #[default]
    Member,
    Guest,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ParticipantStatus {
    #[default]
    Invited,
    Waiting,
    Approved,
    Joined,
    Blocked,
}

impl ParticipantRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParticipantRole::Host => "host",
            ParticipantRole::Cohost => "cohost",
            ParticipantRole::Member => "member",
            ParticipantRole::Guest => "guest",
        }
    }

    pub fn is_moderator(&self) -> bool {
        matches!(self, ParticipantRole::Host | ParticipantRole::Cohost)
    }
}

impl ParticipantStatus {
    pub const ALL: [ParticipantStatus; 5] = [
        ParticipantStatus::Invited,
        ParticipantStatus::Waiting,
        ParticipantStatus::Approved,
        ParticipantStatus::Joined,
        ParticipantStatus::Blocked,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ParticipantStatus::Invited => "invited",
            ParticipantStatus::Waiting => "waiting",
            ParticipantStatus::Approved => "approved",
            ParticipantStatus::Joined => "joined",
            ParticipantStatus::Blocked => "blocked",
        }
    }
}

impl Participant {
    pub const COLLECTION: &'static str = "participants";
}
