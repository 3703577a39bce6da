use futures::future::BoxFuture;
use redis::AsyncCommands;
use shared::{LeaderboardRow, ParticipantId, StorageResult};
use tracing::{debug, warn};

use super::{RedisHandle, TIER};
use crate::storage::LeaderboardTier;

const LEADERBOARD_KEY: &str = "leaderboard:global";
const NAMES_KEY: &str = "leaderboard:names";

/// Win counts as a sorted set keyed by participant id, with display names in
/// a side hash.
#[derive(Clone)]
pub struct LeaderboardCache {
    redis: RedisHandle,
}

impl LeaderboardCache {
    pub fn new(redis: RedisHandle) -> Self {
        Self { redis }
    }

    fn scores_key(&self) -> String {
        self.redis.key(LEADERBOARD_KEY)
    }

    fn names_key(&self) -> String {
        self.redis.key(NAMES_KEY)
    }
}

impl LeaderboardTier for LeaderboardCache {
    fn tier(&self) -> &'static str {
        TIER
    }

    fn increment<'a>(
        &'a self,
        participant_id: &'a ParticipantId,
        display_name: &'a str,
        delta: i64,
    ) -> BoxFuture<'a, StorageResult<()>> {
        Box::pin(async move {
            let mut conn = self.redis.connection().await?;

            let score: f64 = conn
                .zincr(self.scores_key(), participant_id.as_str(), delta)
                .await
                .map_err(|e| self.redis.fail(e))?;

            let _: () = conn
                .hset(self.names_key(), participant_id.as_str(), display_name)
                .await
                .map_err(|e| self.redis.fail(e))?;

            debug!(participant_id = %participant_id, wins = score, "Leaderboard cache updated");
            Ok(())
        })
    }

    fn top(&self, n: usize) -> BoxFuture<'_, StorageResult<Vec<LeaderboardRow>>> {
        Box::pin(async move {
            if n == 0 {
                return Ok(Vec::new());
            }

            let mut conn = self.redis.connection().await?;

            let entries: Vec<(String, i64)> = conn
                .zrevrange_withscores(self.scores_key(), 0, n as isize - 1)
                .await
                .map_err(|e| self.redis.fail(e))?;

            if entries.is_empty() {
                return Ok(Vec::new());
            }

            let ids: Vec<&str> = entries.iter().map(|(id, _)| id.as_str()).collect();
            let names: Vec<Option<String>> = redis::cmd("HMGET")
                .arg(self.names_key())
                .arg(&ids)
                .query_async(&mut conn)
                .await
                .map_err(|e| self.redis.fail(e))?;

            let mut rows = Vec::with_capacity(entries.len());
            for ((id, wins), name) in entries.into_iter().zip(names) {
                let participant_id = match ParticipantId::new(id.clone()) {
                    Ok(participant_id) => participant_id,
                    Err(_) => {
                        warn!("Invalid member in leaderboard cache: {:?}", id);
                        continue;
                    }
                };
                rows.push(LeaderboardRow {
                    display_name: name.unwrap_or_else(|| id.clone()),
                    participant_id,
                    wins,
                });
            }

            Ok(rows)
        })
    }
}
