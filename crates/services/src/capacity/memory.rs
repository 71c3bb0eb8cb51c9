use async_trait::async_trait;
use dashmap::DashMap;
use tokio::time::Instant;
use tracing::debug;

use super::{AdmitOutcome, CounterResult, Occupancy, OccupancyCounter, RoomConfig};

#[derive(Debug, Clone, Copy)]
struct Slot {
    count: u32,
    expires_at: Option<Instant>,
}

impl Slot {
    fn live_count(&self, now: Instant) -> u32 {
        match self.expires_at {
            Some(at) if at <= now => 0,
            _ => self.count,
        }
    }
}

/// Single-node counter. Each room's slot is mutated under its map entry lock.
///
/// Expiry is measured on the tokio clock so tests can drive it with paused time.
#[derive(Debug, Default)]
pub struct MemoryOccupancyCounter {
    configs: DashMap<String, RoomConfig>,
    slots: DashMap<String, Slot>,
}

impl MemoryOccupancyCounter {
    pub fn new() -> Self {
        Self::default()
    }

    fn max_for(&self, room: &str) -> u32 {
        self.configs
            .get(room)
            .map(|c| c.max_participants)
            .unwrap_or(0)
    }
}

#[async_trait]
impl OccupancyCounter for MemoryOccupancyCounter {
    async fn configure(&self, room: &str, config: RoomConfig) -> CounterResult<()> {
        self.configs.insert(room.to_string(), config);
        Ok(())
    }

    async fn config(&self, room: &str) -> CounterResult<Option<RoomConfig>> {
        Ok(self.configs.get(room).map(|c| *c))
    }

    async fn try_admit(&self, room: &str) -> CounterResult<AdmitOutcome> {
        let config = self.configs.get(room).map(|c| *c);
        let max = config.map(|c| c.max_participants).unwrap_or(0);
        let now = Instant::now();

        let mut slot = self.slots.entry(room.to_string()).or_insert(Slot {
            count: 0,
            expires_at: None,
        });
        let current = slot.live_count(now);
        if current >= max {
            debug!(room, count = current, max, "Occupancy ceiling reached");
            return Ok(AdmitOutcome {
                admitted: false,
                occupancy: Occupancy::new(current, max),
            });
        }

        let count = current + 1;
        slot.count = count;
        if current == 0 {
            slot.expires_at = config
                .filter(|c| !c.ttl.is_zero())
                .map(|c| now + c.ttl);
        }
        Ok(AdmitOutcome {
            admitted: true,
            occupancy: Occupancy::new(count, max),
        })
    }

    async fn release(&self, room: &str) -> CounterResult<Occupancy> {
        let max = self.max_for(room);
        let now = Instant::now();
        let count = match self.slots.get_mut(room) {
            Some(mut slot) => {
                let count = slot.live_count(now).saturating_sub(1);
                slot.count = count;
                count
            }
            None => 0,
        };
        self.slots.remove_if(room, |_, slot| slot.count == 0);
        Ok(Occupancy::new(count, max))
    }

    async fn peek(&self, room: &str) -> CounterResult<Occupancy> {
        let max = self.max_for(room);
        let count = self
            .slots
            .get(room)
            .map(|slot| slot.live_count(Instant::now()))
            .unwrap_or(0);
        Ok(Occupancy::new(count, max))
    }

    async fn reset(&self, room: &str) -> CounterResult<()> {
        self.slots.remove(room);
        self.configs.remove(room);
        Ok(())
    }
}
