use async_trait::async_trait;
use bson::{doc, oid::ObjectId, DateTime};
use mongodb::Database;
use roomgate_db::models::{Attendance, ParticipantRole};

use super::base::{BaseDao, DaoError, DaoResult};
use crate::store::{AttendanceStore, SessionAmendment, SessionOpen};

/// Attempts before giving up when sessions are opened and closed underneath us.
const OPEN_ATTEMPTS: usize = 3;

pub struct AttendanceDao {
    pub base: BaseDao<Attendance>,
}

impl AttendanceDao {
    pub fn new(db: &Database) -> Self {
        Self {
            base: BaseDao::new(db, Attendance::COLLECTION),
        }
    }

    /// Pipeline update clamping `leave_time` so it never precedes `join_time`.
    fn close_pipeline(at: DateTime) -> Vec<bson::Document> {
        vec![doc! {
            "$set": {
                "leave_time": { "$max": ["$join_time", at] },
                "updated_at": at,
            }
        }]
    }
}

#[async_trait]
impl AttendanceStore for AttendanceDao {
    async fn open_session(
        &self,
        room_id: ObjectId,
        user_id: ObjectId,
        role: ParticipantRole,
        at: DateTime,
    ) -> DaoResult<SessionOpen> {
        let active = doc! { "room_id": room_id, "user_id": user_id, "leave_time": null };
        let on_insert = doc! {
            "role": bson::to_bson(&role)?,
            "join_time": at,
            "leave_time": null,
            "created_at": at,
            "updated_at": at,
        };

        // the unique partial index on active sessions settles concurrent upserts
        for _ in 0..OPEN_ATTEMPTS {
            match self.base.insert_if_absent(active.clone(), on_insert.clone()).await {
                Ok(Some(id)) => {
                    return Ok(SessionOpen::Opened(Attendance {
                        id: Some(id),
                        room_id,
                        user_id,
                        role,
                        join_time: at,
                        leave_time: None,
                        created_at: at,
                        updated_at: at,
                    }));
                }
                Ok(None) | Err(DaoError::DuplicateKey(_)) => {}
                Err(e) => return Err(e),
            }
            if let Some(existing) = self.base.find_one(active.clone()).await? {
                return Ok(SessionOpen::AlreadyOpen(existing));
            }
        }
        Err(DaoError::DuplicateKey(format!(
            "attendance session for user {user_id} in room {room_id} changed concurrently"
        )))
    }

    async fn active_session(
        &self,
        room_id: ObjectId,
        user_id: ObjectId,
    ) -> DaoResult<Option<Attendance>> {
        self.base
            .find_one(doc! { "room_id": room_id, "user_id": user_id, "leave_time": null })
            .await
    }

    async fn close_session(
        &self,
        room_id: ObjectId,
        user_id: ObjectId,
        at: DateTime,
    ) -> DaoResult<Option<Attendance>> {
        self.base
            .find_one_and_update(
                doc! { "room_id": room_id, "user_id": user_id, "leave_time": null },
                Self::close_pipeline(at),
            )
            .await
    }

    async fn close_all_sessions(&self, room_id: ObjectId, at: DateTime) -> DaoResult<u64> {
        let result = self
            .base
            .collection()
            .update_many(
                doc! { "room_id": room_id, "leave_time": null },
                Self::close_pipeline(at),
            )
            .await?;
        Ok(result.modified_count)
    }

    async fn count_active(&self, room_id: ObjectId) -> DaoResult<u64> {
        self.base
            .count(doc! { "room_id": room_id, "leave_time": null })
            .await
    }

    async fn find_session(&self, session_id: ObjectId) -> DaoResult<Attendance> {
        self.base.find_by_id(session_id).await
    }

    async fn amend_session(
        &self,
        session_id: ObjectId,
        amendment: SessionAmendment,
    ) -> DaoResult<Option<Attendance>> {
        let mut set = doc! {};
        if let Some(leave_time) = amendment.leave_time {
            set.insert("leave_time", leave_time);
        }
        if let Some(role) = amendment.role {
            set.insert("role", role.as_str());
        }
        let updated = self
            .base
            .find_one_and_update(
                doc! { "_id": session_id, "leave_time": { "$ne": null } },
                doc! { "$set": set },
            )
            .await?;

        if updated.is_none() && self.base.count(doc! { "_id": session_id }).await? == 0 {
            return Err(DaoError::NotFound);
        }
        Ok(updated)
    }

    async fn list_for_room(&self, room_id: ObjectId) -> DaoResult<Vec<Attendance>> {
        self.base
            .find_many(doc! { "room_id": room_id }, Some(doc! { "join_time": -1 }))
            .await
    }

    async fn list_for_user(&self, user_id: ObjectId) -> DaoResult<Vec<Attendance>> {
        self.base
            .find_many(doc! { "user_id": user_id }, Some(doc! { "join_time": -1 }))
            .await
    }
}
