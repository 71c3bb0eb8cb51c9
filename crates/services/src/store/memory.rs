//! In-process stores for single-node development and tests.
//!
//! Every operation takes the lock once and never across an `.await`, so
//! multi-record updates such as bulk promotion are atomic with respect to
//! concurrent callers.

use std::collections::HashMap;

use async_trait::async_trait;
use bson::{oid::ObjectId, DateTime};
use parking_lot::RwLock;
use roomgate_db::models::{
    Attendance, HostAccount, Participant, ParticipantRole, ParticipantStatus, Room, RoomStatus,
    User,
};
use tracing::debug;

use super::{
    AUTO_JOIN_ROLES, AttendanceStore, DirectoryStore, ParticipantFilter, ParticipantStore,
    RoomChanges, RoomOrder, RoomQuery, RoomStore, SessionAmendment, SessionOpen,
};
use crate::dao::base::{DaoError, DaoResult, PaginatedResult, PaginationParams};

#[derive(Default)]
struct Inner {
    rooms: HashMap<ObjectId, Room>,
    participants: HashMap<ObjectId, Participant>,
    /// (room, user) -> participant id; enforces one record per pair.
    memberships: HashMap<(ObjectId, ObjectId), ObjectId>,
    attendance: Vec<Attendance>,
    users: HashMap<ObjectId, User>,
    host_accounts: HashMap<ObjectId, HostAccount>,
}

#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RoomStore for MemoryStore {
    async fn insert_room(&self, mut room: Room) -> DaoResult<Room> {
        let mut inner = self.inner.write();
        if inner.rooms.values().any(|r| r.room_name == room.room_name) {
            return Err(DaoError::DuplicateKey(format!("room_name {}", room.room_name)));
        }
        let id = ObjectId::new();
        room.id = Some(id);
        inner.rooms.insert(id, room.clone());
        Ok(room)
    }

    async fn find_room(&self, room_id: ObjectId) -> DaoResult<Room> {
        self.inner
            .read()
            .rooms
            .get(&room_id)
            .cloned()
            .ok_or(DaoError::NotFound)
    }

    async fn transition_room(
        &self,
        room_id: ObjectId,
        from: &[RoomStatus],
        to: RoomStatus,
    ) -> DaoResult<Option<Room>> {
        let mut inner = self.inner.write();
        let room = inner.rooms.get_mut(&room_id).ok_or(DaoError::NotFound)?;
        if !from.contains(&room.status) {
            return Ok(None);
        }
        room.status = to;
        room.updated_at = DateTime::now();
        Ok(Some(room.clone()))
    }

    async fn find_rooms(
        &self,
        query: &RoomQuery,
        page: &PaginationParams,
    ) -> DaoResult<PaginatedResult<Room>> {
        let inner = self.inner.read();
        let mut rooms: Vec<&Room> = inner.rooms.values().filter(|r| query.matches(r)).collect();
        match query.order {
            RoomOrder::Schedule => rooms.sort_by(|a, b| {
                (a.date, &a.start_time, a.id).cmp(&(b.date, &b.start_time, b.id))
            }),
            RoomOrder::Newest => rooms.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id))),
        }

        let total = rooms.len() as u64;
        let skip = usize::try_from(page.skip()).unwrap_or(usize::MAX);
        let take = usize::try_from(page.per_page).unwrap_or(usize::MAX);
        let items = rooms.into_iter().skip(skip).take(take).cloned().collect();
        Ok(PaginatedResult::new(items, total, page))
    }

    async fn update_room(
        &self,
        room_id: ObjectId,
        from: &[RoomStatus],
        changes: &RoomChanges,
    ) -> DaoResult<Option<Room>> {
        let mut inner = self.inner.write();
        let room = inner.rooms.get_mut(&room_id).ok_or(DaoError::NotFound)?;
        if !from.contains(&room.status) {
            return Ok(None);
        }
        changes.apply_to(room);
        room.updated_at = DateTime::now();
        Ok(Some(room.clone()))
    }

    async fn delete_room(&self, room_id: ObjectId, from: &[RoomStatus]) -> DaoResult<bool> {
        let mut inner = self.inner.write();
        match inner.rooms.get(&room_id) {
            Some(room) if from.contains(&room.status) => {
                inner.rooms.remove(&room_id);
                Ok(true)
            }
            Some(_) => Ok(false),
            None => Err(DaoError::NotFound),
        }
    }
}

#[async_trait]
impl ParticipantStore for MemoryStore {
    async fn insert_participant(&self, mut participant: Participant) -> DaoResult<Participant> {
        let mut inner = self.inner.write();
        let key = (participant.room_id, participant.user_id);
        if inner.memberships.contains_key(&key) {
            return Err(DaoError::DuplicateKey(format!(
                "participant {}/{}",
                key.0, key.1
            )));
        }
        let id = ObjectId::new();
        participant.id = Some(id);
        inner.memberships.insert(key, id);
        inner.participants.insert(id, participant.clone());
        Ok(participant)
    }

    async fn find_participant(&self, participant_id: ObjectId) -> DaoResult<Participant> {
        self.inner
            .read()
            .participants
            .get(&participant_id)
            .cloned()
            .ok_or(DaoError::NotFound)
    }

    async fn find_member(
        &self,
        room_id: ObjectId,
        user_id: ObjectId,
    ) -> DaoResult<Option<Participant>> {
        let inner = self.inner.read();
        Ok(inner
            .memberships
            .get(&(room_id, user_id))
            .and_then(|id| inner.participants.get(id))
            .cloned())
    }

    async fn list_participants(
        &self,
        room_id: ObjectId,
        filter: ParticipantFilter,
    ) -> DaoResult<Vec<Participant>> {
        let inner = self.inner.read();
        let mut items: Vec<Participant> = inner
            .participants
            .values()
            .filter(|p| p.room_id == room_id && filter.matches(p))
            .cloned()
            .collect();
        items.sort_by_key(|p| std::cmp::Reverse(p.created_at));
        Ok(items)
    }

    async fn save_participant(&self, participant: &Participant) -> DaoResult<Participant> {
        let id = participant.id.ok_or(DaoError::NotFound)?;
        let mut inner = self.inner.write();
        let stored = inner.participants.get_mut(&id).ok_or(DaoError::NotFound)?;
        stored.role = participant.role;
        stored.status = participant.status;
        stored.joined_at = participant.joined_at;
        stored.left_at = participant.left_at;
        stored.updated_at = DateTime::now();
        Ok(stored.clone())
    }

    async fn promote_waiting(&self, room_id: ObjectId, at: DateTime) -> DaoResult<u64> {
        let mut inner = self.inner.write();
        let mut promoted = 0;
        for participant in inner.participants.values_mut() {
            if participant.room_id == room_id
                && participant.status == ParticipantStatus::Waiting
                && AUTO_JOIN_ROLES.contains(&participant.role)
            {
                participant.status = ParticipantStatus::Joined;
                participant.joined_at = Some(at);
                participant.updated_at = at;
                promoted += 1;
            }
        }
        debug!(%room_id, promoted, "Promoted waiting participants");
        Ok(promoted)
    }

    async fn remove_participant(&self, participant_id: ObjectId) -> DaoResult<bool> {
        let mut inner = self.inner.write();
        match inner.participants.remove(&participant_id) {
            Some(p) => {
                inner.memberships.remove(&(p.room_id, p.user_id));
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn remove_room_participants(&self, room_id: ObjectId) -> DaoResult<u64> {
        let mut inner = self.inner.write();
        let before = inner.participants.len();
        inner.participants.retain(|_, p| p.room_id != room_id);
        inner.memberships.retain(|(room, _), _| *room != room_id);
        Ok((before - inner.participants.len()) as u64)
    }
}

#[async_trait]
impl AttendanceStore for MemoryStore {
    async fn open_session(
        &self,
        room_id: ObjectId,
        user_id: ObjectId,
        role: ParticipantRole,
        at: DateTime,
    ) -> DaoResult<SessionOpen> {
        let mut inner = self.inner.write();
        if let Some(active) = inner
            .attendance
            .iter()
            .find(|a| a.room_id == room_id && a.user_id == user_id && a.is_active())
        {
            return Ok(SessionOpen::AlreadyOpen(active.clone()));
        }
        let record = Attendance {
            id: Some(ObjectId::new()),
            room_id,
            user_id,
            role,
            join_time: at,
            leave_time: None,
            created_at: at,
            updated_at: at,
        };
        inner.attendance.push(record.clone());
        Ok(SessionOpen::Opened(record))
    }

    async fn active_session(
        &self,
        room_id: ObjectId,
        user_id: ObjectId,
    ) -> DaoResult<Option<Attendance>> {
        Ok(self
            .inner
            .read()
            .attendance
            .iter()
            .find(|a| a.room_id == room_id && a.user_id == user_id && a.is_active())
            .cloned())
    }

    async fn close_session(
        &self,
        room_id: ObjectId,
        user_id: ObjectId,
        at: DateTime,
    ) -> DaoResult<Option<Attendance>> {
        let mut inner = self.inner.write();
        let Some(record) = inner
            .attendance
            .iter_mut()
            .find(|a| a.room_id == room_id && a.user_id == user_id && a.is_active())
        else {
            return Ok(None);
        };
        record.leave_time = Some(at.max(record.join_time));
        record.updated_at = at;
        Ok(Some(record.clone()))
    }

    async fn close_all_sessions(&self, room_id: ObjectId, at: DateTime) -> DaoResult<u64> {
        let mut inner = self.inner.write();
        let mut closed = 0;
        for record in inner
            .attendance
            .iter_mut()
            .filter(|a| a.room_id == room_id && a.is_active())
        {
            record.leave_time = Some(at.max(record.join_time));
            record.updated_at = at;
            closed += 1;
        }
        Ok(closed)
    }

    async fn count_active(&self, room_id: ObjectId) -> DaoResult<u64> {
        Ok(self
            .inner
            .read()
            .attendance
            .iter()
            .filter(|a| a.room_id == room_id && a.is_active())
            .count() as u64)
    }

    async fn find_session(&self, session_id: ObjectId) -> DaoResult<Attendance> {
        self.inner
            .read()
            .attendance
            .iter()
            .find(|a| a.id == Some(session_id))
            .cloned()
            .ok_or(DaoError::NotFound)
    }

    async fn amend_session(
        &self,
        session_id: ObjectId,
        amendment: SessionAmendment,
    ) -> DaoResult<Option<Attendance>> {
        let mut inner = self.inner.write();
        let record = inner
            .attendance
            .iter_mut()
            .find(|a| a.id == Some(session_id))
            .ok_or(DaoError::NotFound)?;
        if record.is_active() {
            return Ok(None);
        }
        if let Some(leave_time) = amendment.leave_time {
            record.leave_time = Some(leave_time);
        }
        if let Some(role) = amendment.role {
            record.role = role;
        }
        record.updated_at = DateTime::now();
        Ok(Some(record.clone()))
    }

    async fn list_for_room(&self, room_id: ObjectId) -> DaoResult<Vec<Attendance>> {
        let mut items: Vec<Attendance> = self
            .inner
            .read()
            .attendance
            .iter()
            .filter(|a| a.room_id == room_id)
            .cloned()
            .collect();
        items.sort_by_key(|a| std::cmp::Reverse(a.join_time));
        Ok(items)
    }

    async fn list_for_user(&self, user_id: ObjectId) -> DaoResult<Vec<Attendance>> {
        let mut items: Vec<Attendance> = self
            .inner
            .read()
            .attendance
            .iter()
            .filter(|a| a.user_id == user_id)
            .cloned()
            .collect();
        items.sort_by_key(|a| std::cmp::Reverse(a.join_time));
        Ok(items)
    }
}

#[async_trait]
impl DirectoryStore for MemoryStore {
    async fn find_user(&self, user_id: ObjectId) -> DaoResult<User> {
        self.inner
            .read()
            .users
            .get(&user_id)
            .cloned()
            .ok_or(DaoError::NotFound)
    }

    async fn has_active_host_account(&self, user_id: ObjectId) -> DaoResult<bool> {
        Ok(self
            .inner
            .read()
            .host_accounts
            .values()
            .any(|h| h.user_id == user_id && h.is_active))
    }

    async fn insert_user(&self, mut user: User) -> DaoResult<User> {
        let mut inner = self.inner.write();
        if inner.users.values().any(|u| u.email == user.email) {
            return Err(DaoError::DuplicateKey(format!("email {}", user.email)));
        }
        let id = user.id.unwrap_or_else(ObjectId::new);
        user.id = Some(id);
        inner.users.insert(id, user.clone());
        Ok(user)
    }

    async fn insert_host_account(&self, mut account: HostAccount) -> DaoResult<HostAccount> {
        let mut inner = self.inner.write();
        if inner
            .host_accounts
            .values()
            .any(|h| h.user_id == account.user_id || h.host_code == account.host_code)
        {
            return Err(DaoError::DuplicateKey(format!(
                "host account for {}",
                account.user_id
            )));
        }
        let id = ObjectId::new();
        account.id = Some(id);
        inner.host_accounts.insert(id, account.clone());
        Ok(account)
    }
}
