use async_trait::async_trait;
use bson::{doc, oid::ObjectId, DateTime};
use mongodb::Database;
use roomgate_db::models::{Participant, ParticipantStatus};
use tracing::debug;

use super::base::{BaseDao, DaoError, DaoResult};
use crate::store::{AUTO_JOIN_ROLES, ParticipantFilter, ParticipantStore};

pub struct ParticipantDao {
    pub base: BaseDao<Participant>,
}

impl ParticipantDao {
    pub fn new(db: &Database) -> Self {
        Self {
            base: BaseDao::new(db, Participant::COLLECTION),
        }
    }
}

#[async_trait]
impl ParticipantStore for ParticipantDao {
    async fn insert_participant(&self, participant: Participant) -> DaoResult<Participant> {
        // unique (room_id, user_id) index turns a second insert into DuplicateKey
        let id = self.base.insert_one(&participant).await?;
        self.base.find_by_id(id).await
    }

    async fn find_participant(&self, participant_id: ObjectId) -> DaoResult<Participant> {
        self.base.find_by_id(participant_id).await
    }

    async fn find_member(
        &self,
        room_id: ObjectId,
        user_id: ObjectId,
    ) -> DaoResult<Option<Participant>> {
        self.base
            .find_one(doc! { "room_id": room_id, "user_id": user_id })
            .await
    }

    async fn list_participants(
        &self,
        room_id: ObjectId,
        filter: ParticipantFilter,
    ) -> DaoResult<Vec<Participant>> {
        let mut query = doc! { "room_id": room_id };
        if let Some(status) = filter.status {
            query.insert("status", status.as_str());
        }
        if let Some(role) = filter.role {
            query.insert("role", role.as_str());
        }
        self.base
            .find_many(query, Some(doc! { "created_at": -1 }))
            .await
    }

    async fn save_participant(&self, participant: &Participant) -> DaoResult<Participant> {
        let id = participant.id.ok_or(DaoError::NotFound)?;
        self.base
            .find_one_and_update(
                doc! { "_id": id, "room_id": participant.room_id },
                doc! {
                    "$set": {
                        "role": participant.role.as_str(),
                        "status": participant.status.as_str(),
                        "joined_at": participant.joined_at,
                        "left_at": participant.left_at,
                    }
                },
            )
            .await?
            .ok_or(DaoError::NotFound)
    }

    async fn promote_waiting(&self, room_id: ObjectId, at: DateTime) -> DaoResult<u64> {
        let roles: Vec<&str> = AUTO_JOIN_ROLES.iter().map(|r| r.as_str()).collect();
        let promoted = self
            .base
            .update_many(
                doc! {
                    "room_id": room_id,
                    "status": ParticipantStatus::Waiting.as_str(),
                    "role": { "$in": roles },
                },
                doc! {
                    "$set": {
                        "status": ParticipantStatus::Joined.as_str(),
                        "joined_at": at,
                    }
                },
            )
            .await?;
        debug!(%room_id, promoted, "Promoted waiting participants");
        Ok(promoted)
    }

    async fn remove_participant(&self, participant_id: ObjectId) -> DaoResult<bool> {
        self.base.delete_one(doc! { "_id": participant_id }).await
    }

    async fn remove_room_participants(&self, room_id: ObjectId) -> DaoResult<u64> {
        self.base.hard_delete(doc! { "room_id": room_id }).await
    }
}
