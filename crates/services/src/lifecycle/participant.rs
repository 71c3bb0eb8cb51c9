use bson::DateTime;
use roomgate_db::models::{Participant, ParticipantRole, ParticipantStatus};
use serde::Deserialize;

use super::TransitionError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParticipantAction {
    Approve,
    Join,
    Leave,
    Block,
    Promote,
    Demote,
}

impl ParticipantAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParticipantAction::Approve => "approve",
            ParticipantAction::Join => "join",
            ParticipantAction::Leave => "leave",
            ParticipantAction::Block => "block",
            ParticipantAction::Promote => "promote",
            ParticipantAction::Demote => "demote",
        }
    }
}

/// Inputs deciding whether a `join` may proceed.
#[derive(Debug, Clone, Copy, Default)]
pub struct JoinGate {
    pub can_join_directly: bool,
    pub room_live: bool,
    pub is_moderator: bool,
}

impl JoinGate {
    pub fn permits(&self) -> bool {
        self.can_join_directly || self.room_live || self.is_moderator
    }
}

#[derive(Debug, Clone)]
pub struct Transition {
    pub participant: Participant,
    pub message: &'static str,
}

/// Applies `action` to a copy of `participant`.
pub fn apply(
    participant: &Participant,
    action: ParticipantAction,
    gate: JoinGate,
    now: DateTime,
) -> Result<Transition, TransitionError> {
    let mut next = participant.clone();
    let name = action.as_str();

    if participant.status == ParticipantStatus::Blocked {
        return Err(TransitionError::Blocked);
    }

    let message = match action {
        ParticipantAction::Approve => {
            require_status(participant, &[ParticipantStatus::Waiting], name)?;
            next.status = ParticipantStatus::Approved;
            "Participant approved"
        }
        ParticipantAction::Join => {
            require_status(
                participant,
                &[ParticipantStatus::Approved, ParticipantStatus::Waiting],
                name,
            )?;
            if !gate.permits() {
                return Err(TransitionError::JoinNotPermitted);
            }
            next.status = ParticipantStatus::Joined;
            next.joined_at = Some(now);
            next.left_at = None;
            "Participant joined"
        }
        ParticipantAction::Leave => {
            require_status(participant, &[ParticipantStatus::Joined], name)?;
            next.status = ParticipantStatus::Approved;
            next.left_at = Some(now);
            "Participant left"
        }
        ParticipantAction::Block => {
            if participant.role == ParticipantRole::Host {
                return Err(TransitionError::HostImmutable(name));
            }
            next.status = ParticipantStatus::Blocked;
            next.left_at = Some(now);
            "Participant blocked"
        }
        ParticipantAction::Promote => {
            next.role = match participant.role {
                ParticipantRole::Host => return Err(TransitionError::HostImmutable(name)),
                ParticipantRole::Guest => ParticipantRole::Member,
                ParticipantRole::Member => ParticipantRole::Cohost,
                role @ ParticipantRole::Cohost => {
                    return Err(TransitionError::RoleLimit { action: name, role });
                }
            };
            "Participant promoted"
        }
        ParticipantAction::Demote => {
            next.role = match participant.role {
                ParticipantRole::Host => return Err(TransitionError::HostImmutable(name)),
                ParticipantRole::Cohost => ParticipantRole::Member,
                ParticipantRole::Member => ParticipantRole::Guest,
                role @ ParticipantRole::Guest => {
                    return Err(TransitionError::RoleLimit { action: name, role });
                }
            };
            "Participant demoted"
        }
    };

    next.updated_at = now;
    Ok(Transition {
        participant: next,
        message,
    })
}

/// Moves an invited participant into the waiting room. Already-waiting is a no-op.
pub fn enqueue(participant: &Participant, now: DateTime) -> Result<Participant, TransitionError> {
    match participant.status {
        ParticipantStatus::Invited => {
            let mut next = participant.clone();
            next.status = ParticipantStatus::Waiting;
            next.updated_at = now;
            Ok(next)
        }
        ParticipantStatus::Waiting => Ok(participant.clone()),
        ParticipantStatus::Blocked => Err(TransitionError::Blocked),
        from => Err(TransitionError::InvalidState {
            action: "enqueue",
            from,
        }),
    }
}

pub fn ensure_removable(participant: &Participant) -> Result<(), TransitionError> {
    if participant.role == ParticipantRole::Host {
        return Err(TransitionError::HostImmutable("remove"));
    }
    Ok(())
}

fn require_status(
    participant: &Participant,
    allowed: &[ParticipantStatus],
    action: &'static str,
) -> Result<(), TransitionError> {
    if allowed.contains(&participant.status) {
        Ok(())
    } else {
        Err(TransitionError::InvalidState {
            action,
            from: participant.status,
        })
    }
}
