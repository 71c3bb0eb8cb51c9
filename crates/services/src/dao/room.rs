use async_trait::async_trait;
use bson::{doc, oid::ObjectId, DateTime, Document};
use mongodb::Database;
use roomgate_db::models::{Room, RoomStatus};

use super::base::{BaseDao, DaoError, DaoResult, PaginatedResult, PaginationParams};
use crate::store::{RoomChanges, RoomOrder, RoomQuery, RoomStore};

fn escape_regex(text: &str) -> String {
    text.chars()
        .flat_map(|c| {
            if ".*+?^${}()|[]\\".contains(c) {
                vec!['\\', c]
            } else {
                vec![c]
            }
        })
        .collect()
}

fn range(from: Option<DateTime>, to: Option<DateTime>) -> Option<Document> {
    let mut bounds = Document::new();
    if let Some(from) = from {
        bounds.insert("$gte", from);
    }
    if let Some(to) = to {
        bounds.insert("$lte", to);
    }
    (!bounds.is_empty()).then_some(bounds)
}

fn status_in(from: &[RoomStatus]) -> Document {
    let from: Vec<&str> = from.iter().map(RoomStatus::as_str).collect();
    doc! { "$in": from }
}

pub struct RoomDao {
    pub base: BaseDao<Room>,
}

impl RoomDao {
    pub fn new(db: &Database) -> Self {
        Self {
            base: BaseDao::new(db, Room::COLLECTION),
        }
    }

    fn query_filter(query: &RoomQuery) -> Document {
        let mut filter = Document::new();
        if let Some(status) = query.status {
            filter.insert("status", status.as_str());
        }
        if let Some(created_by) = query.created_by {
            filter.insert("created_by", created_by);
        }
        if let Some(is_public) = query.is_public {
            filter.insert("is_public", is_public);
        }
        if let Some(text) = query.text.as_deref() {
            let escaped = escape_regex(text);
            filter.insert(
                "$or",
                vec![
                    doc! { "title": { "$regex": &escaped, "$options": "i" } },
                    doc! { "description": { "$regex": &escaped, "$options": "i" } },
                ],
            );
        }
        if let Some(bounds) = range(query.date_from, query.date_to) {
            filter.insert("date", bounds);
        }
        if let Some(bounds) = range(query.created_from, query.created_to) {
            filter.insert("created_at", bounds);
        }
        filter
    }

    fn changes_doc(changes: &RoomChanges) -> Document {
        let mut set = Document::new();
        if let Some(title) = &changes.title {
            set.insert("title", title.as_str());
        }
        if let Some(description) = &changes.description {
            set.insert("description", description.as_str());
        }
        if let Some(date) = changes.date {
            set.insert("date", date);
        }
        if let Some(start) = &changes.start_time {
            set.insert("start_time", start.as_str());
        }
        if let Some(end) = &changes.end_time {
            set.insert("end_time", end.as_str());
        }
        if let Some(max) = changes.max_participants {
            set.insert("max_participants", i64::from(max));
        }
        if let Some(is_public) = changes.is_public {
            set.insert("is_public", is_public);
        }
        set
    }

    async fn ensure_exists(&self, room_id: ObjectId) -> DaoResult<()> {
        if self.base.count(doc! { "_id": room_id }).await? == 0 {
            return Err(DaoError::NotFound);
        }
        Ok(())
    }
}

#[async_trait]
impl RoomStore for RoomDao {
    async fn insert_room(&self, room: Room) -> DaoResult<Room> {
        let id = self.base.insert_one(&room).await?;
        self.base.find_by_id(id).await
    }

    async fn find_room(&self, room_id: ObjectId) -> DaoResult<Room> {
        self.base.find_by_id(room_id).await
    }

    async fn transition_room(
        &self,
        room_id: ObjectId,
        from: &[RoomStatus],
        to: RoomStatus,
    ) -> DaoResult<Option<Room>> {
        let updated = self
            .base
            .find_one_and_update(
                doc! { "_id": room_id, "status": status_in(from) },
                doc! { "$set": { "status": to.as_str() } },
            )
            .await?;

        if updated.is_none() {
            self.ensure_exists(room_id).await?;
        }
        Ok(updated)
    }

    async fn find_rooms(
        &self,
        query: &RoomQuery,
        page: &PaginationParams,
    ) -> DaoResult<PaginatedResult<Room>> {
        let sort = match query.order {
            RoomOrder::Schedule => doc! { "date": 1, "start_time": 1, "_id": 1 },
            RoomOrder::Newest => doc! { "created_at": -1, "_id": -1 },
        };
        self.base
            .find_paginated(Self::query_filter(query), sort, page)
            .await
    }

    async fn update_room(
        &self,
        room_id: ObjectId,
        from: &[RoomStatus],
        changes: &RoomChanges,
    ) -> DaoResult<Option<Room>> {
        let updated = self
            .base
            .find_one_and_update(
                doc! { "_id": room_id, "status": status_in(from) },
                doc! { "$set": Self::changes_doc(changes) },
            )
            .await?;

        if updated.is_none() {
            self.ensure_exists(room_id).await?;
        }
        Ok(updated)
    }

    async fn delete_room(&self, room_id: ObjectId, from: &[RoomStatus]) -> DaoResult<bool> {
        let deleted = self
            .base
            .delete_one(doc! { "_id": room_id, "status": status_in(from) })
            .await?;
        if !deleted {
            self.ensure_exists(room_id).await?;
        }
        Ok(deleted)
    }
}
