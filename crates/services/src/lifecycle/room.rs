use std::sync::Arc;

use bson::{oid::ObjectId, DateTime};
use roomgate_db::models::{Room, RoomStatus};
use tracing::{info, warn};

use super::TransitionError;
use crate::capacity::OccupancyCounter;
use crate::dao::DaoResult;
use crate::store::Stores;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoomEvent {
    Activate,
    Complete,
    Cancel,
}

impl RoomEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            RoomEvent::Activate => "activate",
            RoomEvent::Complete => "complete",
            RoomEvent::Cancel => "cancel",
        }
    }

    pub fn sources(&self) -> &'static [RoomStatus] {
        match self {
            RoomEvent::Activate => &[RoomStatus::Scheduled],
            RoomEvent::Complete => &[RoomStatus::Live],
            RoomEvent::Cancel => &[RoomStatus::Scheduled, RoomStatus::Live],
        }
    }

    pub fn target(&self) -> RoomStatus {
        match self {
            RoomEvent::Activate => RoomStatus::Live,
            RoomEvent::Complete => RoomStatus::Completed,
            RoomEvent::Cancel => RoomStatus::Cancelled,
        }
    }

    /// The event that moves a room into `status`. `scheduled` is never a target.
    pub fn for_target(status: RoomStatus) -> Option<Self> {
        match status {
            RoomStatus::Live => Some(RoomEvent::Activate),
            RoomStatus::Completed => Some(RoomEvent::Complete),
            RoomStatus::Cancelled => Some(RoomEvent::Cancel),
            RoomStatus::Scheduled => None,
        }
    }

    pub fn check(&self, current: RoomStatus) -> Result<RoomStatus, TransitionError> {
        if self.sources().contains(&current) {
            Ok(self.target())
        } else {
            Err(TransitionError::Room {
                event: self.as_str(),
                from: current,
            })
        }
    }
}

#[derive(Debug, Clone)]
pub struct ActivationReport {
    pub room: Room,
    pub participants_auto_joined: u64,
}

#[derive(Debug, Clone)]
pub enum ActivationAttempt {
    /// This call moved the room to live and ran the bulk promotion.
    Activated(ActivationReport),
    /// The room had already left `scheduled`; carries its current state.
    NotScheduled(Room),
}

#[derive(Debug, Clone)]
pub struct TeardownReport {
    pub room: Room,
    pub sessions_closed: u64,
}

/// Drives room status changes and their side effects on participants,
/// attendance and occupancy.
#[derive(Clone)]
pub struct RoomLifecycle {
    stores: Stores,
    counter: Arc<dyn OccupancyCounter>,
}

impl RoomLifecycle {
    pub fn new(stores: Stores, counter: Arc<dyn OccupancyCounter>) -> Self {
        Self { stores, counter }
    }

    /// `scheduled -> live` followed by one bulk promotion of waiting participants.
    ///
    /// The status change is conditional, so under concurrent activation exactly one
    /// caller observes `Activated` and the promotion runs once.
    pub async fn try_activate(
        &self,
        room_id: ObjectId,
        at: DateTime,
    ) -> DaoResult<ActivationAttempt> {
        let event = RoomEvent::Activate;
        let Some(room) = self
            .stores
            .rooms
            .transition_room(room_id, event.sources(), event.target())
            .await?
        else {
            let room = self.stores.rooms.find_room(room_id).await?;
            return Ok(ActivationAttempt::NotScheduled(room));
        };

        let participants_auto_joined = self.stores.participants.promote_waiting(room_id, at).await?;
        info!(%room_id, participants_auto_joined, "Room is live");
        Ok(ActivationAttempt::Activated(ActivationReport {
            room,
            participants_auto_joined,
        }))
    }

    pub async fn complete(&self, room_id: ObjectId, at: DateTime) -> DaoResult<Option<TeardownReport>> {
        self.close(room_id, RoomEvent::Complete, at).await
    }

    pub async fn cancel(&self, room_id: ObjectId, at: DateTime) -> DaoResult<Option<TeardownReport>> {
        self.close(room_id, RoomEvent::Cancel, at).await
    }

    /// Returns `None` when the room was not in a source state for `event`.
    async fn close(
        &self,
        room_id: ObjectId,
        event: RoomEvent,
        at: DateTime,
    ) -> DaoResult<Option<TeardownReport>> {
        let Some(room) = self
            .stores
            .rooms
            .transition_room(room_id, event.sources(), event.target())
            .await?
        else {
            return Ok(None);
        };

        if let Err(e) = self.counter.reset(&room_id.to_hex()).await {
            // the counter's own expiry reclaims it
            warn!(%room_id, error = %e, "Failed to tear down room occupancy");
        }
        let sessions_closed = self.stores.attendance.close_all_sessions(room_id, at).await?;
        info!(%room_id, status = room.status.as_str(), sessions_closed, "Room closed");

        Ok(Some(TeardownReport {
            room,
            sessions_closed,
        }))
    }
}
