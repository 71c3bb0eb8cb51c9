//! Role and entry eligibility for a room requester.
//!
//! Pure: callers load the room and the requester's standing, the resolver
//! only decides. Unverified identities are filtered out before this runs.

use bson::oid::ObjectId;
use roomgate_db::models::{ParticipantRole, Room, RoomStatus};
use serde::Serialize;

/// What the directory knows about the identity asking to enter.
#[derive(Debug, Clone, Copy)]
pub struct Requester {
    pub user_id: ObjectId,
    pub is_admin: bool,
    pub has_active_host_account: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionReason {
    RoomCreator,
    SystemAdministrator,
    HostAccountHolder,
    RegularParticipant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Resolution {
    pub role: ParticipantRole,
    pub is_moderator: bool,
    pub can_join_directly: bool,
    pub reason: ResolutionReason,
}

/// First match wins: creator, administrator, host account holder, everyone else.
pub fn resolve(
    room: &Room,
    requester: &Requester,
    requested_role: Option<ParticipantRole>,
) -> Resolution {
    let live = room.status == RoomStatus::Live;

    if room.created_by == requester.user_id {
        return Resolution {
            role: ParticipantRole::Host,
            is_moderator: true,
            can_join_directly: true,
            reason: ResolutionReason::RoomCreator,
        };
    }

    if requester.is_admin {
        return Resolution {
            role: ParticipantRole::Cohost,
            is_moderator: true,
            can_join_directly: true,
            reason: ResolutionReason::SystemAdministrator,
        };
    }

    if requester.has_active_host_account {
        return Resolution {
            role: ParticipantRole::Cohost,
            is_moderator: true,
            can_join_directly: live,
            reason: ResolutionReason::HostAccountHolder,
        };
    }

    Resolution {
        role: cap_requested_role(requested_role),
        is_moderator: false,
        can_join_directly: live,
        reason: ResolutionReason::RegularParticipant,
    }
}

/// Host is only ever derived from room ownership, never requested.
fn cap_requested_role(requested: Option<ParticipantRole>) -> ParticipantRole {
    match requested {
        Some(role @ (ParticipantRole::Cohost | ParticipantRole::Member | ParticipantRole::Guest)) => {
            role
        }
        Some(ParticipantRole::Host) | None => ParticipantRole::Member,
    }
}
