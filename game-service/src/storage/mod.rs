//! Tier seams. Every service walks an ordered list of these backends and
//! falls through to the next one when an attempt returns a `StorageError`.

pub mod local;

use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use shared::{
    CompletedGame, ConnectionId, GameState, InviteRecord, LeaderboardRow, ParticipantId,
    QueueEntry, SessionId, StorageError, StorageResult,
};

pub use local::LocalStore;

pub trait SessionTier: Send + Sync {
    fn tier(&self) -> &'static str;

    /// Upsert by session id. `ttl` bounds how long a finished session is kept.
    fn put<'a>(&'a self, state: &'a GameState, ttl: Option<Duration>)
        -> BoxFuture<'a, StorageResult<()>>;

    fn get(&self, id: SessionId) -> BoxFuture<'_, StorageResult<Option<GameState>>>;
}

pub trait QueueTier: Send + Sync {
    fn tier(&self) -> &'static str;

    /// Supersede any entry for the same connection, then take one waiting
    /// entry that is not the caller's. When nothing is taken the caller is
    /// enqueued and `None` is returned.
    fn pair_or_enqueue<'a>(&'a self, entry: &'a QueueEntry)
        -> BoxFuture<'a, StorageResult<Option<QueueEntry>>>;

    fn remove(&self, connection_id: ConnectionId) -> BoxFuture<'_, StorageResult<()>>;

    fn put_invite<'a>(
        &'a self,
        code: &'a str,
        invite: &'a InviteRecord,
        ttl: Duration,
    ) -> BoxFuture<'a, StorageResult<()>>;

    fn get_invite<'a>(&'a self, code: &'a str) -> BoxFuture<'a, StorageResult<Option<InviteRecord>>>;

    /// Read and delete in one step so a code is claimed at most once.
    fn take_invite<'a>(&'a self, code: &'a str)
        -> BoxFuture<'a, StorageResult<Option<InviteRecord>>>;
}

pub trait LeaderboardTier: Send + Sync {
    fn tier(&self) -> &'static str;

    /// A durable tier is the source of truth; a successful write to it is
    /// mirrored into the next tier so reads stay warm.
    fn durable(&self) -> bool {
        false
    }

    fn increment<'a>(
        &'a self,
        participant_id: &'a ParticipantId,
        display_name: &'a str,
        delta: i64,
    ) -> BoxFuture<'a, StorageResult<()>>;

    fn top(&self, n: usize) -> BoxFuture<'_, StorageResult<Vec<LeaderboardRow>>>;
}

pub trait HistoryTier: Send + Sync {
    fn tier(&self) -> &'static str;

    fn save<'a>(&'a self, game: &'a CompletedGame, names: &'a GameNames)
        -> BoxFuture<'a, StorageResult<()>>;

    fn recent<'a>(
        &'a self,
        participant_id: &'a ParticipantId,
        limit: usize,
        offset: usize,
    ) -> BoxFuture<'a, StorageResult<Vec<CompletedGame>>>;
}

/// Display names that travel with a completed game so the durable store can
/// upsert both participants.
#[derive(Debug, Clone)]
pub struct GameNames {
    pub x: String,
    pub o: String,
}

/// Ordered backends per concern, first entry tried first.
#[derive(Clone, Default)]
pub struct TierChain {
    pub sessions: Vec<Arc<dyn SessionTier>>,
    pub queue: Vec<Arc<dyn QueueTier>>,
    pub leaderboard: Vec<Arc<dyn LeaderboardTier>>,
    pub history: Vec<Arc<dyn HistoryTier>>,
}

impl TierChain {
    /// Chain with only the process-local fallback.
    pub fn local_only(local: Arc<LocalStore>) -> Self {
        Self::default().with_local(local)
    }

    /// Appends the local fallback as the last tier of every concern.
    pub fn with_local(mut self, local: Arc<LocalStore>) -> Self {
        self.sessions.push(local.clone());
        self.queue.push(local.clone());
        self.leaderboard.push(local.clone());
        self.history.push(local);
        self
    }
}

/// Logs and counts one failed tier attempt before the caller moves on.
pub(crate) fn note_degraded(operation: &'static str, err: &StorageError) {
    tracing::warn!(
        operation = operation,
        tier = err.tier(),
        error = %err,
        "Storage tier attempt failed, degrading to next tier"
    );
    shared::record_degraded(err.tier());
}

/// Error returned when a chain has no backend configured at all.
pub(crate) fn empty_chain(operation: &'static str) -> StorageError {
    StorageError::unavailable("none", format!("no storage tier configured for {}", operation))
}
