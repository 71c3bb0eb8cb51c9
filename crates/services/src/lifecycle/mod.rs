//! The two state machines: per-participant admission status and per-room lifecycle.

pub mod participant;
pub mod room;

use roomgate_db::models::{ParticipantRole, ParticipantStatus, RoomStatus};
use thiserror::Error;

pub use participant::{JoinGate, ParticipantAction, Transition};
pub use room::{ActivationAttempt, ActivationReport, RoomEvent, RoomLifecycle, TeardownReport};

/// A rejected transition. The record it was attempted on is left unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error("Cannot {action} a participant who is {}", .from.as_str())]
    InvalidState {
        action: &'static str,
        from: ParticipantStatus,
    },
    #[error("The host role cannot be changed or removed ({0})")]
    HostImmutable(&'static str),
    #[error("Cannot {action} a participant with role {}", .role.as_str())]
    RoleLimit {
        action: &'static str,
        role: ParticipantRole,
    },
    #[error("Participant is blocked")]
    Blocked,
    #[error("Joining requires a live room or moderator approval")]
    JoinNotPermitted,
    #[error("Cannot {event} a room that is {}", .from.as_str())]
    Room {
        event: &'static str,
        from: RoomStatus,
    },
}
