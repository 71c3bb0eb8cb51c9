use mongodb::{Database, IndexModel, options::IndexOptions};
use tracing::info;

use crate::models::{Attendance, HostAccount, Participant, Room, User};

pub async fn ensure_indexes(db: &Database) -> Result<(), mongodb::error::Error> {
    // Rooms
    create_indexes(
        db,
        Room::COLLECTION,
        vec![
            index_unique(bson::doc! { "room_name": 1 }),
            index(bson::doc! { "created_by": 1, "date": -1 }),
            index(bson::doc! { "status": 1, "date": 1 }),
        ],
    )
    .await?;

    // Participants: one live record per (room, user)
    create_indexes(
        db,
        Participant::COLLECTION,
        vec![
            index_unique(bson::doc! { "room_id": 1, "user_id": 1 }),
            index(bson::doc! { "room_id": 1, "status": 1, "role": 1 }),
        ],
    )
    .await?;

    // Attendance
    create_indexes(
        db,
        Attendance::COLLECTION,
        vec![
            index(bson::doc! { "room_id": 1, "user_id": 1, "leave_time": 1 }),
            index(bson::doc! { "user_id": 1, "join_time": -1 }),
            // at most one open session per (room, user)
            IndexModel::builder()
                .keys(bson::doc! { "room_id": 1, "user_id": 1 })
                .options(
                    IndexOptions::builder()
                        .name("one_active_session".to_string())
                        .unique(true)
                        .partial_filter_expression(bson::doc! { "leave_time": { "$type": "null" } })
                        .build(),
                )
                .build(),
        ],
    )
    .await?;

    // Users
    create_indexes(
        db,
        User::COLLECTION,
        vec![index_unique(bson::doc! { "email": 1 })],
    )
    .await?;

    // Host accounts
    create_indexes(
        db,
        HostAccount::COLLECTION,
        vec![
            index_unique(bson::doc! { "user_id": 1 }),
            index_unique(bson::doc! { "host_code": 1 }),
        ],
    )
    .await?;

    info!("All indexes ensured");
    Ok(())
}

fn index(keys: bson::Document) -> IndexModel {
    IndexModel::builder().keys(keys).build()
}

fn index_unique(keys: bson::Document) -> IndexModel {
    IndexModel::builder()
        .keys(keys)
        .options(IndexOptions::builder().unique(true).build())
        .build()
}

async fn create_indexes(
    db: &Database,
    collection: &str,
    indexes: Vec<IndexModel>,
) -> Result<(), mongodb::error::Error> {
    db.collection::<bson::Document>(collection)
        .create_indexes(indexes)
        .await?;
    info!(collection, "Indexes created");
    Ok(())
}
