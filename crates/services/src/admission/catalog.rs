//! Room browsing, editing and removal, and single attendance records.

use bson::{oid::ObjectId, DateTime};
use chrono::{Datelike, Months, NaiveDate, Utc};
use roomgate_db::models::{Room, RoomStatus};
use tracing::{info, warn};

use super::error::NotFoundAs;
use super::rooms::forbid;
use super::{AdmissionError, AdmissionResult, AdmissionService, room_key};
use crate::attendance::AttendanceEntry;
use crate::dao::base::{PaginatedResult, PaginationParams};
use crate::grant::scheduled_duration;
use crate::lifecycle::TransitionError;
use crate::store::{RoomChanges, RoomOrder, RoomQuery, SessionAmendment};

/// Statuses a room may be deleted from. Live rooms are ended first.
const DELETABLE: [RoomStatus; 3] = [
    RoomStatus::Scheduled,
    RoomStatus::Completed,
    RoomStatus::Cancelled,
];

#[derive(Debug, Clone)]
pub struct Timeline {
    pub rooms: PaginatedResult<Room>,
    pub from: DateTime,
    pub to: DateTime,
}

#[derive(Debug, Clone)]
pub struct RoomRemoval {
    pub room: Room,
    pub participants_removed: u64,
}

/// First and last millisecond of the month containing `now`.
fn month_of(now: chrono::DateTime<Utc>) -> Option<(DateTime, DateTime)> {
    let first = NaiveDate::from_ymd_opt(now.year(), now.month(), 1)?;
    let start = first.and_hms_opt(0, 0, 0)?.and_utc();
    let next = start.checked_add_months(Months::new(1))?;
    let end = next.checked_sub_signed(chrono::Duration::milliseconds(1))?;
    Some((DateTime::from_chrono(start), DateTime::from_chrono(end)))
}

impl AdmissionService {
    pub async fn list_rooms(
        &self,
        query: RoomQuery,
        page: PaginationParams,
    ) -> AdmissionResult<PaginatedResult<Room>> {
        Ok(self.stores.rooms.find_rooms(&query, &page.clamped()).await?)
    }

    /// Free-text search over title and description, within an optional date window.
    pub async fn search_rooms(
        &self,
        mut query: RoomQuery,
        page: PaginationParams,
    ) -> AdmissionResult<PaginatedResult<Room>> {
        query.text = query
            .text
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty());
        if let (Some(from), Some(to)) = (query.date_from, query.date_to) {
            if from > to {
                return Err(AdmissionError::Validation(
                    "from_date must not be after to_date".to_string(),
                ));
            }
        }
        self.list_rooms(query, page).await
    }

    /// Rooms created by `user_id`, in schedule order.
    pub async fn user_rooms(
        &self,
        user_id: ObjectId,
        status: Option<RoomStatus>,
        page: PaginationParams,
    ) -> AdmissionResult<PaginatedResult<Room>> {
        let query = RoomQuery {
            created_by: Some(user_id),
            status,
            ..Default::default()
        };
        self.list_rooms(query, page).await
    }

    /// The actor's own rooms by creation time, newest first. Defaults to the current month.
    pub async fn room_timeline(
        &self,
        actor: ObjectId,
        range: Option<(DateTime, DateTime)>,
        page: PaginationParams,
    ) -> AdmissionResult<Timeline> {
        let (from, to) = match range {
            Some((from, to)) if from > to => {
                return Err(AdmissionError::Validation(
                    "start must not be after end".to_string(),
                ));
            }
            Some(range) => range,
            None => month_of(Utc::now())
                .ok_or_else(|| AdmissionError::Validation("date out of range".to_string()))?,
        };

        let query = RoomQuery {
            created_by: Some(actor),
            created_from: Some(from),
            created_to: Some(to),
            order: RoomOrder::Newest,
            ..Default::default()
        };
        let rooms = self.list_rooms(query, page).await?;
        Ok(Timeline { rooms, from, to })
    }

    /// Edits a room's details; moderators only. Closed rooms are frozen and a live
    /// room's ceiling may only be raised.
    pub async fn update_room(
        &self,
        room_id: ObjectId,
        actor: ObjectId,
        mut changes: RoomChanges,
    ) -> AdmissionResult<Room> {
        let room = self.find_room(room_id).await?;
        self.require_moderator(&room, actor).await?;
        if room.status.is_closed() {
            return Err(TransitionError::Room {
                event: "update",
                from: room.status,
            }
            .into());
        }

        if let Some(title) = changes.title.as_mut() {
            *title = title.trim().to_string();
            if title.is_empty() {
                return Err(AdmissionError::Validation("title is required".to_string()));
            }
        }
        if changes.is_empty() {
            return Err(AdmissionError::Validation("Nothing to update".to_string()));
        }
        if let Some(max) = changes.max_participants {
            if max == 0 {
                return Err(AdmissionError::Validation(
                    "max_participants must be at least 1".to_string(),
                ));
            }
            if room.status == RoomStatus::Live && max < room.max_participants {
                return Err(AdmissionError::Conflict(
                    "A live room's capacity can only be raised".to_string(),
                ));
            }
        }
        scheduled_duration(
            changes.start_time.as_deref().unwrap_or(&room.start_time),
            changes.end_time.as_deref().unwrap_or(&room.end_time),
        )?;

        let Some(updated) = self
            .stores
            .rooms
            .update_room(room_id, &[room.status], &changes)
            .await?
        else {
            let current = self.find_room(room_id).await?;
            info!(%room_id, from = current.status.as_str(), "Room update lost a status race");
            return Err(TransitionError::Room {
                event: "update",
                from: current.status,
            }
            .into());
        };

        if updated.max_participants != room.max_participants {
            if let Err(e) = self
                .counter
                .configure(&room_key(room_id), self.counter_config(&updated))
                .await
            {
                // configured again on first join
                warn!(%room_id, error = %e, "Failed to reconfigure room occupancy");
            }
        }
        info!(%room_id, %actor, "Room updated");
        Ok(updated)
    }

    /// Removes a room with no open sessions. Only its creator or an administrator may do this;
    /// attendance history is kept.
    pub async fn delete_room(
        &self,
        room_id: ObjectId,
        actor: ObjectId,
    ) -> AdmissionResult<RoomRemoval> {
        let room = self.find_room(room_id).await?;
        let (_, requester) = self.load_requester(actor).await.map_err(forbid)?;
        if !(requester.is_admin || room.created_by == actor) {
            return Err(AdmissionError::Forbidden(
                "Only the room's creator or an admin can delete it".to_string(),
            ));
        }
        if room.status == RoomStatus::Live {
            return Err(TransitionError::Room {
                event: "delete",
                from: room.status,
            }
            .into());
        }

        let active = self.stores.attendance.count_active(room_id).await?;
        if active > 0 {
            info!(%room_id, active, "Room delete refused: participants inside");
            return Err(AdmissionError::Conflict(
                "Room still has active participants".to_string(),
            ));
        }

        if !self.stores.rooms.delete_room(room_id, &DELETABLE).await? {
            let current = self.find_room(room_id).await?;
            return Err(TransitionError::Room {
                event: "delete",
                from: current.status,
            }
            .into());
        }

        let participants_removed = self
            .stores
            .participants
            .remove_room_participants(room_id)
            .await?;
        if let Err(e) = self.counter.reset(&room_key(room_id)).await {
            // the counter's expiry reclaims the key
            warn!(%room_id, error = %e, "Failed to reset occupancy of deleted room");
        }
        info!(%room_id, %actor, participants_removed, "Room deleted");
        Ok(RoomRemoval {
            room,
            participants_removed,
        })
    }

    /// One attendance record, visible to its own user and to the room's moderators.
    pub async fn attendance_record(
        &self,
        session_id: ObjectId,
        actor: ObjectId,
    ) -> AdmissionResult<AttendanceEntry> {
        let record = self
            .stores
            .attendance
            .find_session(session_id)
            .await
            .or_not_found("Attendance record")?;
        if record.user_id != actor {
            let room = self.find_room(record.room_id).await?;
            self.require_moderator(&room, actor).await?;
        }
        Ok(record.into())
    }

    /// Corrects a closed session's leave time or role; moderators only.
    pub async fn amend_attendance(
        &self,
        session_id: ObjectId,
        actor: ObjectId,
        amendment: SessionAmendment,
    ) -> AdmissionResult<AttendanceEntry> {
        if amendment.leave_time.is_none() && amendment.role.is_none() {
            return Err(AdmissionError::Validation("Nothing to update".to_string()));
        }
        let record = self
            .stores
            .attendance
            .find_session(session_id)
            .await
            .or_not_found("Attendance record")?;
        let room = self.find_room(record.room_id).await?;
        self.require_moderator(&room, actor).await?;

        if amendment.leave_time.is_some_and(|leave| leave < record.join_time) {
            return Err(AdmissionError::Validation(
                "leave_time cannot precede join_time".to_string(),
            ));
        }
        let amended = self
            .stores
            .attendance
            .amend_session(session_id, amendment)
            .await
            .or_not_found("Attendance record")?
            .ok_or_else(|| AdmissionError::Conflict("Session is still open".to_string()))?;
        info!(%session_id, %actor, room_id = %amended.room_id, "Attendance record amended");
        Ok(amended.into())
    }
}
