//! Process-local fallback tier. Constructed once at start and injected into
//! every service; contents are lost on restart and never shared between
//! processes.

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::future::{self, BoxFuture};
use shared::{
    CompletedGame, ConnectionId, GameState, InviteRecord, LeaderboardRow, ParticipantId,
    QueueEntry, SessionId, StorageError, StorageResult,
};

use super::{GameNames, HistoryTier, LeaderboardTier, QueueTier, SessionTier};

const TIER: &str = "local";

pub const DEFAULT_RECENT_LIMIT: usize = 20;

struct Expiring<T> {
    value: T,
    expires_at: Option<DateTime<Utc>>,
}

impl<T> Expiring<T> {
    fn new(value: T, ttl: Option<Duration>) -> Self {
        Self {
            value,
            expires_at: ttl.map(|ttl| Utc::now() + chrono::Duration::seconds(ttl.as_secs() as i64)),
        }
    }

    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

#[derive(Default)]
struct LocalState {
    sessions: HashMap<SessionId, Expiring<GameState>>,
    queue: VecDeque<QueueEntry>,
    invites: HashMap<String, Expiring<InviteRecord>>,
    // insertion order doubles as the tie-break for equal win counts
    leaderboard: Vec<LeaderboardRow>,
    recent: HashMap<ParticipantId, VecDeque<CompletedGame>>,
}

pub struct LocalStore {
    state: Mutex<LocalState>,
    recent_limit: usize,
}

impl LocalStore {
    pub fn new() -> Self {
        Self::with_recent_limit(DEFAULT_RECENT_LIMIT)
    }

    pub fn with_recent_limit(recent_limit: usize) -> Self {
        Self {
            state: Mutex::new(LocalState::default()),
            recent_limit,
        }
    }

    fn lock(&self) -> StorageResult<MutexGuard<'_, LocalState>> {
        self.state
            .lock()
            .map_err(|e| StorageError::unavailable(TIER, format!("Lock error: {}", e)))
    }

    /// Drops every session and invite whose expiry has passed.
    pub fn sweep_expired(&self) -> StorageResult<usize> {
        let now = Utc::now();
        let mut state = self.lock()?;

        let before = state.sessions.len() + state.invites.len();
        state.sessions.retain(|_, entry| !entry.is_expired(now));
        state.invites.retain(|_, entry| !entry.is_expired(now));

        Ok(before - state.sessions.len() - state.invites.len())
    }

    pub fn waiting(&self) -> usize {
        self.lock().map(|state| state.queue.len()).unwrap_or(0)
    }

    fn put_session(&self, state: &GameState, ttl: Option<Duration>) -> StorageResult<()> {
        let mut inner = self.lock()?;
        inner.sessions.insert(state.id, Expiring::new(state.clone(), ttl));
        Ok(())
    }

    fn get_session(&self, id: SessionId) -> StorageResult<Option<GameState>> {
        let now = Utc::now();
        let mut inner = self.lock()?;

        match inner.sessions.get(&id) {
            Some(entry) if entry.is_expired(now) => {
                inner.sessions.remove(&id);
                Ok(None)
            }
            Some(entry) => Ok(Some(entry.value.clone())),
            None => Ok(None),
        }
    }

    fn pair(&self, entry: &QueueEntry) -> StorageResult<Option<QueueEntry>> {
        let mut inner = self.lock()?;

        inner
            .queue
            .retain(|queued| queued.connection_id != entry.connection_id);

        // Another connection of the same participant keeps its place.
        let position = inner
            .queue
            .iter()
            .position(|queued| queued.participant_id != entry.participant_id);
        let opponent = position.and_then(|index| inner.queue.remove(index));

        match opponent {
            Some(opponent) => Ok(Some(opponent)),
            None => {
                inner.queue.push_back(entry.clone());
                Ok(None)
            }
        }
    }

    fn remove_connection(&self, connection_id: ConnectionId) -> StorageResult<()> {
        let mut inner = self.lock()?;
        inner
            .queue
            .retain(|queued| queued.connection_id != connection_id);
        Ok(())
    }

    fn insert_invite(&self, code: &str, invite: &InviteRecord, ttl: Duration) -> StorageResult<()> {
        let mut inner = self.lock()?;
        inner
            .invites
            .insert(code.to_string(), Expiring::new(invite.clone(), Some(ttl)));
        Ok(())
    }

    fn lookup_invite(&self, code: &str, consume: bool) -> StorageResult<Option<InviteRecord>> {
        let now = Utc::now();
        let mut inner = self.lock()?;

        let expired = match inner.invites.get(code) {
            None => return Ok(None),
            Some(entry) => entry.is_expired(now),
        };

        if expired {
            inner.invites.remove(code);
            return Ok(None);
        }

        if consume {
            Ok(inner.invites.remove(code).map(|entry| entry.value))
        } else {
            Ok(inner.invites.get(code).map(|entry| entry.value.clone()))
        }
    }

    fn increment_wins(
        &self,
        participant_id: &ParticipantId,
        display_name: &str,
        delta: i64,
    ) -> StorageResult<()> {
        let mut inner = self.lock()?;

        match inner
            .leaderboard
            .iter_mut()
            .find(|row| &row.participant_id == participant_id)
        {
            Some(row) => {
                row.wins += delta;
                row.display_name = display_name.to_string();
            }
            None => inner.leaderboard.push(LeaderboardRow {
                participant_id: participant_id.clone(),
                display_name: display_name.to_string(),
                wins: delta,
            }),
        }

        Ok(())
    }

    fn top_rows(&self, n: usize) -> StorageResult<Vec<LeaderboardRow>> {
        let inner = self.lock()?;
        let mut rows = inner.leaderboard.clone();
        rows.sort_by(|a, b| b.wins.cmp(&a.wins));
        rows.truncate(n);
        Ok(rows)
    }

    fn push_recent(&self, game: &CompletedGame) -> StorageResult<()> {
        let mut inner = self.lock()?;

        for participant_id in [&game.x_participant_id, &game.o_participant_id] {
            let games = inner.recent.entry(participant_id.clone()).or_default();
            games.retain(|existing| existing.id != game.id);
            games.push_front(game.clone());
            games.truncate(self.recent_limit);
        }

        Ok(())
    }

    fn recent_games(
        &self,
        participant_id: &ParticipantId,
        limit: usize,
        offset: usize,
    ) -> StorageResult<Vec<CompletedGame>> {
        let inner = self.lock()?;

        Ok(inner
            .recent
            .get(participant_id)
            .map(|games| games.iter().skip(offset).take(limit).cloned().collect())
            .unwrap_or_default())
    }
}

impl Default for LocalStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionTier for LocalStore {
    fn tier(&self) -> &'static str {
        TIER
    }

    fn put<'a>(&'a self, state: &'a GameState, ttl: Option<Duration>)
        -> BoxFuture<'a, StorageResult<()>> {
        Box::pin(future::ready(self.put_session(state, ttl)))
    }

    fn get(&self, id: SessionId) -> BoxFuture<'_, StorageResult<Option<GameState>>> {
        Box::pin(future::ready(self.get_session(id)))
    }
}

impl QueueTier for LocalStore {
    fn tier(&self) -> &'static str {
        TIER
    }

    fn pair_or_enqueue<'a>(&'a self, entry: &'a QueueEntry)
        -> BoxFuture<'a, StorageResult<Option<QueueEntry>>> {
        Box::pin(future::ready(self.pair(entry)))
    }

    fn remove(&self, connection_id: ConnectionId) -> BoxFuture<'_, StorageResult<()>> {
        Box::pin(future::ready(self.remove_connection(connection_id)))
    }

    fn put_invite<'a>(
        &'a self,
        code: &'a str,
        invite: &'a InviteRecord,
        ttl: Duration,
    ) -> BoxFuture<'a, StorageResult<()>> {
        Box::pin(future::ready(self.insert_invite(code, invite, ttl)))
    }

    fn get_invite<'a>(&'a self, code: &'a str) -> BoxFuture<'a, StorageResult<Option<InviteRecord>>> {
        Box::pin(future::ready(self.lookup_invite(code, false)))
    }

    fn take_invite<'a>(&'a self, code: &'a str)
        -> BoxFuture<'a, StorageResult<Option<InviteRecord>>> {
        Box::pin(future::ready(self.lookup_invite(code, true)))
    }
}

impl LeaderboardTier for LocalStore {
    fn tier(&self) -> &'static str {
        TIER
    }

    fn increment<'a>(
        &'a self,
        participant_id: &'a ParticipantId,
        display_name: &'a str,
        delta: i64,
    ) -> BoxFuture<'a, StorageResult<()>> {
        Box::pin(future::ready(self.increment_wins(participant_id, display_name, delta)))
    }

    fn top(&self, n: usize) -> BoxFuture<'_, StorageResult<Vec<LeaderboardRow>>> {
        Box::pin(future::ready(self.top_rows(n)))
    }
}

impl HistoryTier for LocalStore {
    fn tier(&self) -> &'static str {
        TIER
    }

    fn save<'a>(&'a self, game: &'a CompletedGame, _names: &'a GameNames)
        -> BoxFuture<'a, StorageResult<()>> {
        Box::pin(future::ready(self.push_recent(game)))
    }

    fn recent<'a>(
        &'a self,
        participant_id: &'a ParticipantId,
        limit: usize,
        offset: usize,
    ) -> BoxFuture<'a, StorageResult<Vec<CompletedGame>>> {
        Box::pin(future::ready(self.recent_games(participant_id, limit, offset)))
    }
}
