use std::time::Duration;

use futures::future::BoxFuture;
use redis::AsyncCommands;
use shared::{GameState, SessionId, StorageResult};
use tracing::debug;

use super::{from_json, to_json, RedisHandle, TIER};
use crate::storage::SessionTier;

const SESSION_PREFIX: &str = "session:";

#[derive(Clone)]
pub struct SessionCache {
    redis: RedisHandle,
}

impl SessionCache {
    pub fn new(redis: RedisHandle) -> Self {
        Self { redis }
    }

    fn key(&self, id: &SessionId) -> String {
        self.redis.key(format_args!("{}{}", SESSION_PREFIX, id))
    }
}

impl SessionTier for SessionCache {
    fn tier(&self) -> &'static str {
        TIER
    }

    fn put<'a>(&'a self, state: &'a GameState, ttl: Option<Duration>)
        -> BoxFuture<'a, StorageResult<()>> {
        Box::pin(async move {
            let raw = to_json(state)?;
            let key = self.key(&state.id);
            let mut conn = self.redis.connection().await?;

            let _: () = match ttl {
                Some(ttl) => conn.set_ex(&key, raw, ttl.as_secs().max(1)).await,
                None => conn.set(&key, raw).await,
            }
            .map_err(|e| self.redis.fail(e))?;

            debug!(session_id = %state.id, ttl_secs = ttl.map(|t| t.as_secs()), "Session cached");
            Ok(())
        })
    }

    fn get(&self, id: SessionId) -> BoxFuture<'_, StorageResult<Option<GameState>>> {
        Box::pin(async move {
            let mut conn = self.redis.connection().await?;
            let raw: Option<String> = conn
                .get(self.key(&id))
                .await
                .map_err(|e| self.redis.fail(e))?;

            raw.map(|raw| from_json(&raw)).transpose()
        })
    }
}
