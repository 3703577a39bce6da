pub mod leaderboard_cache;
pub mod matchmaking_cache;
pub mod session_cache;

pub use leaderboard_cache::LeaderboardCache;
pub use matchmaking_cache::MatchmakingCache;
pub use session_cache::SessionCache;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use redis::aio::MultiplexedConnection;
use redis::{Client, RedisError};
use shared::{StorageError, StorageResult};

pub(crate) const TIER: &str = "redis";

const CONNECT_TIMEOUT: Duration = Duration::from_secs(2);

/// Lazily connected Redis client shared by the cache tiers. A connection
/// that fails with an I/O error is dropped and re-established on next use.
#[derive(Clone)]
pub struct RedisHandle {
    client: Client,
    conn: Arc<Mutex<Option<MultiplexedConnection>>>,
    key_prefix: Arc<str>,
}

impl RedisHandle {
    pub fn open(url: &str) -> StorageResult<Self> {
        let client = Client::open(url)?;
        Ok(Self {
            client,
            conn: Arc::new(Mutex::new(None)),
            key_prefix: Arc::from(""),
        })
    }

    /// Namespaces every key written through this handle, so several
    /// deployments can share one Redis.
    pub fn with_key_prefix(mut self, prefix: &str) -> Self {
        self.key_prefix = Arc::from(prefix);
        self
    }

    pub fn key(&self, key: impl std::fmt::Display) -> String {
        format!("{}{}", self.key_prefix, key)
    }

    pub async fn connection(&self) -> StorageResult<MultiplexedConnection> {
        if let Some(conn) = self.cached() {
            return Ok(conn);
        }

        let conn = tokio::time::timeout(
            CONNECT_TIMEOUT,
            self.client.get_multiplexed_tokio_connection(),
        )
        .await
        .map_err(|_| StorageError::unavailable(TIER, "connection attempt timed out"))??;

        if let Ok(mut guard) = self.conn.lock() {
            *guard = Some(conn.clone());
        }

        tracing::info!("Connected to Redis");
        Ok(conn)
    }

    fn cached(&self) -> Option<MultiplexedConnection> {
        self.conn.lock().ok().and_then(|guard| guard.clone())
    }

    /// Converts a command failure, forgetting the connection if it is broken.
    pub fn fail(&self, err: RedisError) -> StorageError {
        if err.is_io_error() || err.is_connection_dropped() || err.is_timeout() {
            if let Ok(mut guard) = self.conn.lock() {
                guard.take();
            }
        }
        StorageError::from(err)
    }
}

pub(crate) fn to_json<T: serde::Serialize>(value: &T) -> StorageResult<String> {
    serde_json::to_string(value).map_err(|e| StorageError::corrupt(TIER, e.to_string()))
}

pub(crate) fn from_json<T: serde::de::DeserializeOwned>(raw: &str) -> StorageResult<T> {
    serde_json::from_str(raw).map_err(|e| StorageError::corrupt(TIER, e.to_string()))
}
