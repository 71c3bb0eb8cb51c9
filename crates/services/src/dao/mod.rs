pub mod attendance;
pub mod base;
pub mod directory;
pub mod participant;
pub mod room;

use std::sync::Arc;

use mongodb::Database;

pub use base::{BaseDao, DaoError, DaoResult, PaginatedResult, PaginationParams};

use crate::store::Stores;

impl Stores {
    /// Wires every store to its MongoDB collection.
    pub fn mongo(db: &Database) -> Self {
        Self {
            rooms: Arc::new(room::RoomDao::new(db)),
            participants: Arc::new(participant::ParticipantDao::new(db)),
            attendance: Arc::new(attendance::AttendanceDao::new(db)),
            directory: Arc::new(directory::DirectoryDao::new(db)),
        }
    }
}
