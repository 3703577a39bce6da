use std::time::Duration;

use futures::future::BoxFuture;
use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;
use shared::{ConnectionId, InviteRecord, QueueEntry, StorageResult};
use tracing::{debug, warn};

use super::{from_json, to_json, RedisHandle, TIER};
use crate::storage::QueueTier;

const QUEUE_KEY: &str = "matchmaking:queue";
const CONNECTION_PREFIX: &str = "matchmaking:connection:";
const INVITE_PREFIX: &str = "session:code:";

/// Waiting list kept as a Redis list: new entries are `LPUSH`ed and the
/// oldest is taken with `RPOP`, so pairing is FIFO and each entry is handed
/// to at most one caller.
#[derive(Clone)]
pub struct MatchmakingCache {
    redis: RedisHandle,
    marker_ttl: Duration,
}

impl MatchmakingCache {
    pub fn new(redis: RedisHandle, marker_ttl: Duration) -> Self {
        Self { redis, marker_ttl }
    }

    fn queue_key(&self) -> String {
        self.redis.key(QUEUE_KEY)
    }

    fn marker_key(&self, connection_id: &ConnectionId) -> String {
        self.redis.key(format_args!("{}{}", CONNECTION_PREFIX, connection_id))
    }

    fn invite_key(&self, code: &str) -> String {
        self.redis.key(format_args!("{}{}", INVITE_PREFIX, code))
    }

    /// Drops every waiting entry of the connection. The marker names the
    /// entry directly; once it has expired the list is scanned instead.
    async fn purge(&self, conn: &mut MultiplexedConnection, connection_id: &ConnectionId)
        -> StorageResult<()> {
        let queue = self.queue_key();
        let marker = self.marker_key(connection_id);

        let previous: Option<String> = conn.get(&marker).await.map_err(|e| self.redis.fail(e))?;

        let stale = match previous {
            Some(previous) => vec![previous],
            None => {
                let waiting: Vec<String> = conn
                    .lrange(&queue, 0, -1)
                    .await
                    .map_err(|e| self.redis.fail(e))?;
                waiting
                    .into_iter()
                    .filter(|raw| {
                        from_json::<QueueEntry>(raw)
                            .map(|queued| queued.connection_id == *connection_id)
                            .unwrap_or(false)
                    })
                    .collect()
            }
        };

        for raw in stale {
            let _: () = conn.lrem(&queue, 0, raw).await.map_err(|e| self.redis.fail(e))?;
        }
        let _: () = conn.del(&marker).await.map_err(|e| self.redis.fail(e))?;

        Ok(())
    }
}

impl QueueTier for MatchmakingCache {
    fn tier(&self) -> &'static str {
        TIER
    }

    fn pair_or_enqueue<'a>(&'a self, entry: &'a QueueEntry)
        -> BoxFuture<'a, StorageResult<Option<QueueEntry>>> {
        Box::pin(async move {
            let raw = to_json(entry)?;
            let queue = self.queue_key();
            let mut conn = self.redis.connection().await?;

            self.purge(&mut conn, &entry.connection_id).await?;

            // Entries from the caller's other connections go back to the head
            // of the queue in their original order.
            let mut held: Vec<String> = Vec::new();

            let opponent = loop {
                let popped: Option<String> = conn
                    .rpop(&queue, None)
                    .await
                    .map_err(|e| self.redis.fail(e))?;

                let Some(popped) = popped else {
                    break None;
                };

                let candidate: QueueEntry = match from_json(&popped) {
                    Ok(candidate) => candidate,
                    Err(e) => {
                        warn!(error = %e, "Discarding malformed queue entry");
                        continue;
                    }
                };

                if candidate.connection_id == entry.connection_id {
                    debug!(connection_id = %entry.connection_id, "Popped own stale entry, requeueing");
                    break None;
                }

                if candidate.participant_id == entry.participant_id {
                    held.push(popped);
                    continue;
                }

                break Some(candidate);
            };

            for popped in held.iter().rev() {
                let _: () = conn
                    .rpush(&queue, popped)
                    .await
                    .map_err(|e| self.redis.fail(e))?;
            }

            match opponent {
                Some(opponent) => {
                    let _: () = conn
                        .del(self.marker_key(&opponent.connection_id))
                        .await
                        .unwrap_or_else(|e| warn!(error = %e, "Failed to clear opponent queue marker"));
                    Ok(Some(opponent))
                }
                None => {
                    let _: () = conn
                        .lpush(&queue, &raw)
                        .await
                        .map_err(|e| self.redis.fail(e))?;
                    let marker = self.marker_key(&entry.connection_id);
                    let _: () = conn
                        .set_ex(marker, &raw, self.marker_ttl.as_secs().max(1))
                        .await
                        .map_err(|e| self.redis.fail(e))?;
                    Ok(None)
                }
            }
        })
    }

    fn remove(&self, connection_id: ConnectionId) -> BoxFuture<'_, StorageResult<()>> {
        Box::pin(async move {
            let mut conn = self.redis.connection().await?;
            self.purge(&mut conn, &connection_id).await
        })
    }

    fn put_invite<'a>(
        &'a self,
        code: &'a str,
        invite: &'a InviteRecord,
        ttl: Duration,
    ) -> BoxFuture<'a, StorageResult<()>> {
        Box::pin(async move {
            let raw = to_json(invite)?;
            let mut conn = self.redis.connection().await?;
            let _: () = conn
                .set_ex(self.invite_key(code), raw, ttl.as_secs().max(1))
                .await
                .map_err(|e| self.redis.fail(e))?;
            Ok(())
        })
    }

    fn get_invite<'a>(&'a self, code: &'a str) -> BoxFuture<'a, StorageResult<Option<InviteRecord>>> {
        Box::pin(async move {
            let mut conn = self.redis.connection().await?;
            let raw: Option<String> = conn
                .get(self.invite_key(code))
                .await
                .map_err(|e| self.redis.fail(e))?;
            raw.map(|raw| from_json(&raw)).transpose()
        })
    }

    fn take_invite<'a>(&'a self, code: &'a str)
        -> BoxFuture<'a, StorageResult<Option<InviteRecord>>> {
        Box::pin(async move {
            let mut conn = self.redis.connection().await?;
            let raw: Option<String> = conn
                .get_del(self.invite_key(code))
                .await
                .map_err(|e| self.redis.fail(e))?;
            raw.map(|raw| from_json(&raw)).transpose()
        })
    }
}
