#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use game_service::coordinator::{ClientMessage, ConnectionContext, Coordinator, ServerMessage};
use game_service::storage::{
    GameNames, HistoryTier, LeaderboardTier, LocalStore, QueueTier, SessionTier, TierChain,
};
use game_service::websocket::ConnectionHub;
use shared::{
    CompletedGame, ConnectionId, ExpiryConfig, GameState, InviteRecord, LeaderboardRow,
    Participant, ParticipantId, QueueEntry, SessionId, StorageError, StorageResult,
};
use tokio::sync::mpsc;

/// A tier whose backend is unreachable: every call fails as unavailable.
pub struct Offline(pub &'static str);

impl Offline {
    fn down<T: Send + 'static>(&self) -> BoxFuture<'static, StorageResult<T>> {
        let tier = self.0;
        Box::pin(async move { Err(StorageError::unavailable(tier, "connection refused")) })
    }
}

impl SessionTier for Offline {
    fn tier(&self) -> &'static str {
        self.0
    }

    fn put<'a>(&'a self, _state: &'a GameState, _ttl: Option<Duration>)
        -> BoxFuture<'a, StorageResult<()>> {
        self.down()
    }

    fn get(&self, _id: SessionId) -> BoxFuture<'_, StorageResult<Option<GameState>>> {
        self.down()
    }
}

impl QueueTier for Offline {
    fn tier(&self) -> &'static str {
        self.0
    }

    fn pair_or_enqueue<'a>(&'a self, _entry: &'a QueueEntry)
        -> BoxFuture<'a, StorageResult<Option<QueueEntry>>> {
        self.down()
    }

    fn remove(&self, _connection_id: ConnectionId) -> BoxFuture<'_, StorageResult<()>> {
        self.down()
    }

    fn put_invite<'a>(
        &'a self,
        _code: &'a str,
        _invite: &'a InviteRecord,
        _ttl: Duration,
    ) -> BoxFuture<'a, StorageResult<()>> {
        self.down()
    }

    fn get_invite<'a>(&'a self, _code: &'a str) -> BoxFuture<'a, StorageResult<Option<InviteRecord>>> {
        self.down()
    }

    fn take_invite<'a>(&'a self, _code: &'a str)
        -> BoxFuture<'a, StorageResult<Option<InviteRecord>>> {
        self.down()
    }
}

impl LeaderboardTier for Offline {
    fn tier(&self) -> &'static str {
        self.0
    }

    fn durable(&self) -> bool {
        self.0 == "postgres"
    }

    fn increment<'a>(
        &'a self,
        _participant_id: &'a ParticipantId,
        _display_name: &'a str,
        _delta: i64,
    ) -> BoxFuture<'a, StorageResult<()>> {
        self.down()
    }

    fn top(&self, _n: usize) -> BoxFuture<'_, StorageResult<Vec<LeaderboardRow>>> {
        self.down()
    }
}

impl HistoryTier for Offline {
    fn tier(&self) -> &'static str {
        self.0
    }

    fn save<'a>(&'a self, _game: &'a CompletedGame, _names: &'a GameNames)
        -> BoxFuture<'a, StorageResult<()>> {
        self.down()
    }

    fn recent<'a>(
        &'a self,
        _participant_id: &'a ParticipantId,
        _limit: usize,
        _offset: usize,
    ) -> BoxFuture<'a, StorageResult<Vec<CompletedGame>>> {
        self.down()
    }
}

/// Same layout as production with Postgres and Redis both unreachable.
pub fn degraded_chain(local: Arc<LocalStore>) -> TierChain {
    let postgres = Arc::new(Offline("postgres"));
    let redis = Arc::new(Offline("redis"));

    TierChain {
        sessions: vec![redis.clone()],
        queue: vec![redis.clone()],
        leaderboard: vec![postgres.clone(), redis],
        history: vec![postgres],
    }
    .with_local(local)
}

pub struct Harness {
    pub coordinator: Arc<Coordinator>,
    pub hub: Arc<ConnectionHub>,
    pub local: Arc<LocalStore>,
}

impl Harness {
    pub fn local_only() -> Self {
        let local = Arc::new(LocalStore::new());
        Self::with_chain(TierChain::local_only(local.clone()), local)
    }

    pub fn degraded() -> Self {
        let local = Arc::new(LocalStore::new());
        Self::with_chain(degraded_chain(local.clone()), local)
    }

    pub fn with_chain(chain: TierChain, local: Arc<LocalStore>) -> Self {
        let hub = Arc::new(ConnectionHub::new());
        let coordinator = Arc::new(Coordinator::from_tiers(
            &chain,
            &ExpiryConfig::default(),
            hub.clone(),
        ));
        Self {
            coordinator,
            hub,
            local,
        }
    }

    pub fn connect(&self, participant: &str) -> TestPlayer {
        let connection_id = ConnectionId::new();
        let rx = self.hub.register(connection_id);
        let participant = Participant::new(
            ParticipantId::new(participant).expect("valid participant id"),
            participant.to_uppercase(),
        );
        TestPlayer {
            ctx: ConnectionContext::new(connection_id, participant),
            rx,
        }
    }

    pub async fn send(&self, player: &TestPlayer, message: ClientMessage) {
        self.coordinator.handle(&player.ctx, message).await;
    }

    pub async fn play(&self, player: &TestPlayer, session_id: SessionId, cell_index: usize) {
        self.send(
            player,
            ClientMessage::MoveSubmit {
                session_id,
                cell_index,
            },
        )
        .await;
    }

    pub async fn disconnect(&self, player: TestPlayer) {
        self.hub.unregister(player.ctx.connection_id);
        self.coordinator.disconnect(&player.ctx).await;
    }
}

pub struct TestPlayer {
    pub ctx: ConnectionContext,
    pub rx: mpsc::UnboundedReceiver<ServerMessage>,
}

impl TestPlayer {
    pub fn id(&self) -> &ParticipantId {
        &self.ctx.participant.id
    }

    pub fn drain(&mut self) -> Vec<ServerMessage> {
        let mut messages = Vec::new();
        while let Ok(message) = self.rx.try_recv() {
            messages.push(message);
        }
        messages
    }

    pub fn kinds(&mut self) -> Vec<&'static str> {
        self.drain().iter().map(ServerMessage::kind).collect()
    }
}

/// Session id from the first `session.matched` event in `messages`.
pub fn matched_session(messages: &[ServerMessage]) -> Option<SessionId> {
    messages.iter().find_map(|message| match message {
        ServerMessage::SessionMatched { session_id, .. } => Some(*session_id),
        _ => None,
    })
}

pub fn last_state(messages: &[ServerMessage]) -> Option<&GameState> {
    messages.iter().rev().find_map(|message| match message {
        ServerMessage::SessionState(state) => Some(state),
        _ => None,
    })
}

/// Queues two players and returns the session they were paired into. The
/// first player plays X.
pub async fn start_match(
    harness: &Harness,
    x: &mut TestPlayer,
    o: &mut TestPlayer,
) -> SessionId {
    harness.send(x, ClientMessage::QueueJoin).await;
    harness.send(o, ClientMessage::QueueJoin).await;

    let x_messages = x.drain();
    let o_messages = o.drain();
    let session_id = matched_session(&x_messages).expect("x was matched");
    assert_eq!(matched_session(&o_messages), Some(session_id));
    session_id
}
