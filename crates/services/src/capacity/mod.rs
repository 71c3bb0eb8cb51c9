//! Per-room occupancy counter enforcing the capacity ceiling.
//!
//! Increment-and-check is a single atomic step in every backend: a caller
//! that pushes the count past the ceiling rolls its own increment back
//! before anyone else can observe "not full". The first admission into an
//! empty room arms the counter's lifetime, so occupancy held by clients
//! that never call [`OccupancyCounter::release`] is reclaimed on expiry.

pub mod memory;
pub mod redis;

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

pub use self::memory::MemoryOccupancyCounter;
pub use self::redis::RedisOccupancyCounter;

#[derive(Debug, Error)]
pub enum CounterError {
    #[error("Occupancy store unavailable: {0}")]
    Unavailable(String),
    #[error("Unexpected occupancy store reply: {0}")]
    Protocol(String),
}

impl From<::redis::RedisError> for CounterError {
    fn from(e: ::redis::RedisError) -> Self {
        CounterError::Unavailable(e.to_string())
    }
}

pub type CounterResult<T> = Result<T, CounterError>;

/// Ceiling and lifetime for one room's counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoomConfig {
    pub max_participants: u32,
    pub ttl: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Occupancy {
    pub count: u32,
    pub remaining: u32,
    pub max: u32,
}

impl Occupancy {
    pub fn new(count: u32, max: u32) -> Self {
        Self {
            count,
            remaining: max.saturating_sub(count),
            max,
        }
    }

    pub fn is_full(&self) -> bool {
        self.remaining == 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdmitOutcome {
    pub admitted: bool,
    pub occupancy: Occupancy,
}

#[async_trait]
pub trait OccupancyCounter: Send + Sync {
    /// Stores the ceiling and lifetime read by `try_admit`. Overwrites any earlier value.
    async fn configure(&self, room: &str, config: RoomConfig) -> CounterResult<()>;

    async fn config(&self, room: &str) -> CounterResult<Option<RoomConfig>>;

    /// Atomically takes one slot, or reports the room full without changing the count.
    ///
    /// A room with no stored configuration has a ceiling of zero and admits nobody.
    async fn try_admit(&self, room: &str) -> CounterResult<AdmitOutcome>;

    /// Gives one slot back. Never takes the count below zero.
    async fn release(&self, room: &str) -> CounterResult<Occupancy>;

    async fn peek(&self, room: &str) -> CounterResult<Occupancy>;

    /// Drops the count and the configuration of a room that has ended.
    async fn reset(&self, room: &str) -> CounterResult<()>;
}
