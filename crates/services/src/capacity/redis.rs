//! Redis-backed counter for multi-node deployments.
//!
//! The count lives at `{prefix}:room:{<id>}:participants` and the room's
//! ceiling and lifetime in the hash `{prefix}:room:{<id>}:config`. The room
//! id is a hash tag so both keys land on one cluster slot and can be
//! touched by one script.

use std::time::Duration;

use ::redis::{AsyncCommands, Client, Script, aio::ConnectionManager};
use async_trait::async_trait;
use tracing::{debug, info, warn};

use super::{AdmitOutcome, CounterError, CounterResult, Occupancy, OccupancyCounter, RoomConfig};

const MAX_FIELD: &str = "max_participants";
const TTL_FIELD: &str = "ttl_secs";

/// KEYS[1] = count, KEYS[2] = config hash.
/// Returns {admitted, count, max}; a rejected caller's increment is rolled back
/// before the script returns.
const TRY_ADMIT_SCRIPT: &str = r#"
    local max = tonumber(redis.call('HGET', KEYS[2], 'max_participants') or '0')
    local ttl = tonumber(redis.call('HGET', KEYS[2], 'ttl_secs') or '0')
    local count = redis.call('INCR', KEYS[1])

    if count > max then
        count = redis.call('DECR', KEYS[1])
        if count <= 0 then
            redis.call('DEL', KEYS[1])
            count = 0
        end
        return {0, count, max}
    end

    if count == 1 and ttl > 0 then
        redis.call('EXPIRE', KEYS[1], ttl)
    end
    return {1, count, max}
"#;

/// KEYS[1] = count. Decrements with a floor at zero; an emptied counter is
/// deleted so the next admission re-arms its expiry.
const RELEASE_SCRIPT: &str = r#"
    local count = tonumber(redis.call('GET', KEYS[1]) or '0')
    if count > 0 then
        count = redis.call('DECR', KEYS[1])
    end
    if count <= 0 then
        redis.call('DEL', KEYS[1])
        return 0
    end
    return count
"#;

#[derive(Clone)]
pub struct RedisOccupancyCounter {
    conn: ConnectionManager,
    key_prefix: String,
    try_admit_script: Script,
    release_script: Script,
}

impl RedisOccupancyCounter {
    pub async fn connect(url: &str, key_prefix: &str) -> CounterResult<Self> {
        let client = Client::open(url)?;
        let conn = client.get_connection_manager().await?;
        info!(key_prefix, "Redis occupancy counter connected");
        Ok(Self::with_connection(conn, key_prefix))
    }

    pub fn with_connection(conn: ConnectionManager, key_prefix: &str) -> Self {
        Self {
            conn,
            key_prefix: key_prefix.to_string(),
            try_admit_script: Script::new(TRY_ADMIT_SCRIPT),
            release_script: Script::new(RELEASE_SCRIPT),
        }
    }

    fn count_key(&self, room: &str) -> String {
        format!("{}:room:{{{}}}:participants", self.key_prefix, room)
    }

    fn config_key(&self, room: &str) -> String {
        format!("{}:room:{{{}}}:config", self.key_prefix, room)
    }
}

fn to_u32(value: i64) -> u32 {
    u32::try_from(value.max(0)).unwrap_or(u32::MAX)
}

#[async_trait]
impl OccupancyCounter for RedisOccupancyCounter {
    async fn configure(&self, room: &str, config: RoomConfig) -> CounterResult<()> {
        let mut conn = self.conn.clone();
        let _: () = conn
            .hset_multiple(
                self.config_key(room),
                &[
                    (MAX_FIELD, u64::from(config.max_participants)),
                    (TTL_FIELD, config.ttl.as_secs()),
                ],
            )
            .await?;
        debug!(room, max = config.max_participants, "Room occupancy configured");
        Ok(())
    }

    async fn config(&self, room: &str) -> CounterResult<Option<RoomConfig>> {
        let mut conn = self.conn.clone();
        let (max, ttl): (Option<u32>, Option<u64>) = ::redis::cmd("HMGET")
            .arg(self.config_key(room))
            .arg(MAX_FIELD)
            .arg(TTL_FIELD)
            .query_async(&mut conn)
            .await?;

        Ok(max.map(|max_participants| RoomConfig {
            max_participants,
            ttl: Duration::from_secs(ttl.unwrap_or(0)),
        }))
    }

    async fn try_admit(&self, room: &str) -> CounterResult<AdmitOutcome> {
        let mut conn = self.conn.clone();
        let reply: Vec<i64> = self
            .try_admit_script
            .key(self.count_key(room))
            .key(self.config_key(room))
            .invoke_async(&mut conn)
            .await?;

        let [admitted, count, max] = reply[..] else {
            return Err(CounterError::Protocol(format!(
                "try_admit returned {} values",
                reply.len()
            )));
        };
        let occupancy = Occupancy::new(to_u32(count), to_u32(max));
        if admitted != 1 {
            warn!(
                room,
                count = occupancy.count,
                max = occupancy.max,
                "Admission rejected: room full"
            );
        }
        Ok(AdmitOutcome {
            admitted: admitted == 1,
            occupancy,
        })
    }

    async fn release(&self, room: &str) -> CounterResult<Occupancy> {
        let mut conn = self.conn.clone();
        let count: i64 = self
            .release_script
            .key(self.count_key(room))
            .invoke_async(&mut conn)
            .await?;
        let max: Option<u32> = conn.hget(self.config_key(room), MAX_FIELD).await?;
        Ok(Occupancy::new(to_u32(count), max.unwrap_or(0)))
    }

    async fn peek(&self, room: &str) -> CounterResult<Occupancy> {
        let mut conn = self.conn.clone();
        let (count, max): (Option<u32>, Option<u32>) = ::redis::pipe()
            .atomic()
            .get(self.count_key(room))
            .hget(self.config_key(room), MAX_FIELD)
            .query_async(&mut conn)
            .await?;
        Ok(Occupancy::new(count.unwrap_or(0), max.unwrap_or(0)))
    }

    async fn reset(&self, room: &str) -> CounterResult<()> {
        let mut conn = self.conn.clone();
        let _: () = conn
            .del(vec![self.count_key(room), self.config_key(room)])
            .await?;
        info!(room, "Room occupancy torn down");
        Ok(())
    }
}
