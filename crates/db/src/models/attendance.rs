use bson::{oid::ObjectId, DateTime};
use serde::{Deserialize, Serialize};

use super::participant::ParticipantRole;

/// One join/leave session. Append-only; active while `leave_time` is unset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attendance {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub room_id: ObjectId,
    pub user_id: ObjectId,
    pub role: ParticipantRole,
    pub join_time: DateTime,
    pub leave_time: Option<DateTime>,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

impl Attendance {
    pub const COLLECTION: &'static str = "attendances";

    pub fn is_active(&self) -> bool {
        self.leave_time.is_none()
    }
}
