use std::collections::BTreeMap;

use bson::{oid::ObjectId, DateTime};
use chrono::Utc;
use rand::{Rng, distr::Alphanumeric};
use roomgate_db::models::{Participant, ParticipantStatus, Room, RoomStatus};
use tracing::{info, warn};

use super::{AdmissionError, AdmissionResult, AdmissionService, room_key};
use crate::attendance::{AttendanceEntry, AttendanceStats};
use crate::grant::{ScheduledDuration, scheduled_duration};
use crate::store::ParticipantFilter;

/// Length of a quick-created room's window.
const QUICK_ROOM_HOURS: i64 = 4;

#[derive(Debug, Clone, Default)]
pub struct CreateRoom {
    pub title: String,
    pub description: Option<String>,
    pub date: Option<chrono::DateTime<Utc>>,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub max_participants: Option<u32>,
    pub is_public: bool,
    /// Quick-create: the window starts now and the room is created live.
    pub start_now: bool,
}

#[derive(Debug, Clone)]
pub struct ParticipantListing {
    pub participants: Vec<Participant>,
    /// Per-status totals over the whole room, independent of the filter.
    pub counts: BTreeMap<&'static str, u64>,
}

fn generate_room_name(title: &str, now: chrono::DateTime<Utc>) -> String {
    let slug: String = title
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .map(|c| c.to_ascii_lowercase())
        .collect();
    let suffix: String = rand::rng()
        .sample_iter(&Alphanumeric)
        .take(10)
        .map(|b| char::from(b).to_ascii_lowercase())
        .collect();
    format!("{slug}_{}_{suffix}", now.timestamp_millis())
}

impl AdmissionService {
    /// Only administrators and active host accounts may create rooms.
    pub async fn create_room(&self, actor: ObjectId, input: CreateRoom) -> AdmissionResult<Room> {
        let (_, requester) = self.load_requester(actor).await.map_err(forbid)?;
        if !(requester.is_admin || requester.has_active_host_account) {
            return Err(AdmissionError::Forbidden(
                "Only hosts and admins can create rooms".to_string(),
            ));
        }

        let title = input.title.trim();
        if title.is_empty() {
            return Err(AdmissionError::Validation("title is required".to_string()));
        }

        let now = Utc::now();
        let (start_time, end_time, status) = if input.start_now {
            let end = now + chrono::Duration::hours(QUICK_ROOM_HOURS);
            (
                now.format("%H:%M").to_string(),
                end.format("%H:%M").to_string(),
                RoomStatus::Live,
            )
        } else {
            match (input.start_time, input.end_time) {
                (Some(start), Some(end)) => (start, end, RoomStatus::Scheduled),
                _ => {
                    return Err(AdmissionError::Validation(
                        "start_time and end_time are required".to_string(),
                    ));
                }
            }
        };
        scheduled_duration(&start_time, &end_time)?;

        let max_participants = input
            .max_participants
            .unwrap_or(self.settings.default_max_participants);
        if max_participants == 0 {
            return Err(AdmissionError::Validation(
                "max_participants must be at least 1".to_string(),
            ));
        }

        let at = DateTime::now();
        let room = self
            .stores
            .rooms
            .insert_room(Room {
                id: None,
                title: title.to_string(),
                description: input.description,
                room_name: generate_room_name(title, now),
                date: DateTime::from_chrono(input.date.unwrap_or(now)),
                start_time,
                end_time,
                status,
                max_participants,
                created_by: actor,
                is_public: input.is_public,
                created_at: at,
                updated_at: at,
            })
            .await?;
        let room_id = room.id.ok_or(AdmissionError::NotFound("Room"))?;

        if let Err(e) = self
            .counter
            .configure(&room_key(room_id), self.counter_config(&room))
            .await
        {
            // configured again on first join
            warn!(%room_id, error = %e, "Failed to configure room occupancy");
        }
        info!(%room_id, room_name = %room.room_name, status = room.status.as_str(), "Room created");
        Ok(room)
    }

    pub async fn room_info(&self, room_id: ObjectId) -> AdmissionResult<(Room, ScheduledDuration)> {
        let room = self.find_room(room_id).await?;
        let duration = scheduled_duration(&room.start_time, &room.end_time)?;
        Ok((room, duration))
    }

    pub async fn list_participants(
        &self,
        room_id: ObjectId,
        filter: ParticipantFilter,
    ) -> AdmissionResult<ParticipantListing> {
        self.find_room(room_id).await?;
        let everyone = self
            .stores
            .participants
            .list_participants(room_id, ParticipantFilter::default())
            .await?;

        let mut counts: BTreeMap<&'static str, u64> = ParticipantStatus::ALL
            .iter()
            .map(|s| (s.as_str(), 0))
            .collect();
        for p in &everyone {
            *counts.entry(p.status.as_str()).or_default() += 1;
        }

        let participants = everyone.into_iter().filter(|p| filter.matches(p)).collect();
        Ok(ParticipantListing {
            participants,
            counts,
        })
    }

    /// Room attendance log; moderators only.
    pub async fn room_attendance(
        &self,
        room_id: ObjectId,
        actor: ObjectId,
    ) -> AdmissionResult<(Vec<AttendanceEntry>, AttendanceStats)> {
        let room = self.find_room(room_id).await?;
        self.require_moderator(&room, actor).await?;
        let records = self.stores.attendance.list_for_room(room_id).await?;
        let stats = AttendanceStats::from_records(&records);
        Ok((records.into_iter().map(AttendanceEntry::from).collect(), stats))
    }

    pub async fn user_attendance(
        &self,
        user_id: ObjectId,
    ) -> AdmissionResult<(Vec<AttendanceEntry>, AttendanceStats)> {
        let records = self.stores.attendance.list_for_user(user_id).await?;
        let stats = AttendanceStats::from_records(&records);
        Ok((records.into_iter().map(AttendanceEntry::from).collect(), stats))
    }
}

/// An actor who cannot be identified is refused, not asked to verify.
pub(super) fn forbid(e: AdmissionError) -> AdmissionError {
    match e {
        AdmissionError::Unauthorized(msg) => AdmissionError::Forbidden(msg),
        other => other,
    }
}
