//! Storage seams for the admission core.
//!
//! Rooms, participants, attendance and the identity directory are each
//! reached through a trait so the admission logic runs unchanged over
//! MongoDB (see [`crate::dao`]) or the in-process [`memory::MemoryStore`].

pub mod memory;

use std::sync::Arc;

use async_trait::async_trait;
use bson::{oid::ObjectId, DateTime};
use roomgate_db::models::{
    Attendance, HostAccount, Participant, ParticipantRole, ParticipantStatus, Room, RoomStatus,
    User,
};

use crate::dao::base::{DaoResult, PaginatedResult, PaginationParams};

/// Roles swept into `joined` when a room goes live. Hosts are expected to be joined already.
pub const AUTO_JOIN_ROLES: [ParticipantRole; 3] = [
    ParticipantRole::Cohost,
    ParticipantRole::Member,
    ParticipantRole::Guest,
];

/// Order of a room listing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RoomOrder {
    /// By scheduled date, then start time.
    #[default]
    Schedule,
    /// Most recently created first.
    Newest,
}

/// Room browsing filters. Unset fields match every room.
#[derive(Debug, Clone, Default)]
pub struct RoomQuery {
    pub status: Option<RoomStatus>,
    pub created_by: Option<ObjectId>,
    pub is_public: Option<bool>,
    /// Case-insensitive substring of the title or description.
    pub text: Option<String>,
    /// Inclusive bounds on the scheduled date.
    pub date_from: Option<DateTime>,
    pub date_to: Option<DateTime>,
    /// Inclusive bounds on the creation time.
    pub created_from: Option<DateTime>,
    pub created_to: Option<DateTime>,
    pub order: RoomOrder,
}

fn within(value: DateTime, from: Option<DateTime>, to: Option<DateTime>) -> bool {
    from.is_none_or(|f| value >= f) && to.is_none_or(|t| value <= t)
}

impl RoomQuery {
    pub fn matches(&self, room: &Room) -> bool {
        let text_matches = self.text.as_deref().is_none_or(|text| {
            let needle = text.to_lowercase();
            room.title.to_lowercase().contains(&needle)
                || room
                    .description
                    .as_deref()
                    .is_some_and(|d| d.to_lowercase().contains(&needle))
        });
        self.status.is_none_or(|s| room.status == s)
            && self.created_by.is_none_or(|c| room.created_by == c)
            && self.is_public.is_none_or(|p| room.is_public == p)
            && text_matches
            && within(room.date, self.date_from, self.date_to)
            && within(room.created_at, self.created_from, self.created_to)
    }
}

/// Editable room details. `None` leaves a field unchanged; status is never edited here.
#[derive(Debug, Clone, Default)]
pub struct RoomChanges {
    pub title: Option<String>,
    pub description: Option<String>,
    pub date: Option<DateTime>,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub max_participants: Option<u32>,
    pub is_public: Option<bool>,
}

impl RoomChanges {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.date.is_none()
            && self.start_time.is_none()
            && self.end_time.is_none()
            && self.max_participants.is_none()
            && self.is_public.is_none()
    }

    pub fn apply_to(&self, room: &mut Room) {
        if let Some(title) = &self.title {
            room.title = title.clone();
        }
        if let Some(description) = &self.description {
            room.description = Some(description.clone());
        }
        if let Some(date) = self.date {
            room.date = date;
        }
        if let Some(start) = &self.start_time {
            room.start_time = start.clone();
        }
        if let Some(end) = &self.end_time {
            room.end_time = end.clone();
        }
        if let Some(max) = self.max_participants {
            room.max_participants = max;
        }
        if let Some(is_public) = self.is_public {
            room.is_public = is_public;
        }
    }
}

/// Correction to a closed attendance session.
#[derive(Debug, Clone, Copy, Default)]
pub struct SessionAmendment {
    pub leave_time: Option<DateTime>,
    pub role: Option<ParticipantRole>,
}

#[async_trait]
pub trait RoomStore: Send + Sync {
    async fn insert_room(&self, room: Room) -> DaoResult<Room>;

    async fn find_room(&self, room_id: ObjectId) -> DaoResult<Room>;

    /// Moves the room to `to` only while its status is one of `from`.
    ///
    /// Returns the post-update room, or `None` when the precondition no longer held.
    async fn transition_room(
        &self,
        room_id: ObjectId,
        from: &[RoomStatus],
        to: RoomStatus,
    ) -> DaoResult<Option<Room>>;

    async fn find_rooms(
        &self,
        query: &RoomQuery,
        page: &PaginationParams,
    ) -> DaoResult<PaginatedResult<Room>>;

    /// Applies `changes` only while the room's status is one of `from`.
    ///
    /// Returns the post-update room, or `None` when the precondition no longer held.
    async fn update_room(
        &self,
        room_id: ObjectId,
        from: &[RoomStatus],
        changes: &RoomChanges,
    ) -> DaoResult<Option<Room>>;

    /// Deletes the room only while its status is one of `from`.
    async fn delete_room(&self, room_id: ObjectId, from: &[RoomStatus]) -> DaoResult<bool>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ParticipantFilter {
    pub status: Option<ParticipantStatus>,
    pub role: Option<ParticipantRole>,
}

impl ParticipantFilter {
    pub fn matches(&self, participant: &Participant) -> bool {
        self.status.is_none_or(|s| participant.status == s)
            && self.role.is_none_or(|r| participant.role == r)
    }
}

#[async_trait]
pub trait ParticipantStore: Send + Sync {
    /// Fails with `DaoError::DuplicateKey` when the (room, user) pair already has a record.
    async fn insert_participant(&self, participant: Participant) -> DaoResult<Participant>;

    async fn find_participant(&self, participant_id: ObjectId) -> DaoResult<Participant>;

    async fn find_member(
        &self,
        room_id: ObjectId,
        user_id: ObjectId,
    ) -> DaoResult<Option<Participant>>;

    async fn list_participants(
        &self,
        room_id: ObjectId,
        filter: ParticipantFilter,
    ) -> DaoResult<Vec<Participant>>;

    /// Last-writer-wins write of role, status and timestamps. The returned record is authoritative.
    async fn save_participant(&self, participant: &Participant) -> DaoResult<Participant>;

    /// Single atomic update: every `waiting` participant of the room with a role in
    /// [`AUTO_JOIN_ROLES`] becomes `joined`. Returns how many were promoted.
    async fn promote_waiting(&self, room_id: ObjectId, at: DateTime) -> DaoResult<u64>;

    async fn remove_participant(&self, participant_id: ObjectId) -> DaoResult<bool>;

    /// Drops every participant record of a deleted room.
    async fn remove_room_participants(&self, room_id: ObjectId) -> DaoResult<u64>;
}

/// Result of opening an attendance session. A (room, user) pair has at most one active session.
#[derive(Debug, Clone)]
pub enum SessionOpen {
    Opened(Attendance),
    /// Another caller opened the session first; this is that session.
    AlreadyOpen(Attendance),
}

impl SessionOpen {
    pub fn is_opened(&self) -> bool {
        matches!(self, SessionOpen::Opened(_))
    }

    pub fn into_record(self) -> Attendance {
        match self {
            SessionOpen::Opened(record) | SessionOpen::AlreadyOpen(record) => record,
        }
    }
}

#[async_trait]
pub trait AttendanceStore: Send + Sync {
    /// Opens a session unless one is already active for the pair.
    async fn open_session(
        &self,
        room_id: ObjectId,
        user_id: ObjectId,
        role: ParticipantRole,
        at: DateTime,
    ) -> DaoResult<SessionOpen>;

    async fn active_session(
        &self,
        room_id: ObjectId,
        user_id: ObjectId,
    ) -> DaoResult<Option<Attendance>>;

    /// Closes the active session, if any. `leave_time` never precedes `join_time`.
    async fn close_session(
        &self,
        room_id: ObjectId,
        user_id: ObjectId,
        at: DateTime,
    ) -> DaoResult<Option<Attendance>>;

    async fn close_all_sessions(&self, room_id: ObjectId, at: DateTime) -> DaoResult<u64>;

    async fn count_active(&self, room_id: ObjectId) -> DaoResult<u64>;

    async fn find_session(&self, session_id: ObjectId) -> DaoResult<Attendance>;

    /// Amends a closed session. Returns `None` when the session is still open.
    async fn amend_session(
        &self,
        session_id: ObjectId,
        amendment: SessionAmendment,
    ) -> DaoResult<Option<Attendance>>;

    async fn list_for_room(&self, room_id: ObjectId) -> DaoResult<Vec<Attendance>>;

    async fn list_for_user(&self, user_id: ObjectId) -> DaoResult<Vec<Attendance>>;
}

/// Read side of the account platform, plus the inserts used for seeding.
#[async_trait]
pub trait DirectoryStore: Send + Sync {
    async fn find_user(&self, user_id: ObjectId) -> DaoResult<User>;

    async fn has_active_host_account(&self, user_id: ObjectId) -> DaoResult<bool>;

    async fn insert_user(&self, user: User) -> DaoResult<User>;

    async fn insert_host_account(&self, account: HostAccount) -> DaoResult<HostAccount>;
}

/// The four stores the admission core is wired with.
#[derive(Clone)]
pub struct Stores {
    pub rooms: Arc<dyn RoomStore>,
    pub participants: Arc<dyn ParticipantStore>,
    pub attendance: Arc<dyn AttendanceStore>,
    pub directory: Arc<dyn DirectoryStore>,
}

impl Stores {
    pub fn in_memory() -> Self {
        let store = Arc::new(memory::MemoryStore::new());
        Self {
            rooms: store.clone(),
            participants: store.clone(),
            attendance: store.clone(),
            directory: store,
        }
    }
}
