//! Translates client intents into service calls and fans results out to the
//! connections taking part in a session.

pub mod events;

use std::sync::Arc;
use std::time::{Duration, Instant};

use shared::{
    ConnectionId, ExpiryConfig, GameState, MatchedPair, Participant, QueueEntry, ServiceError,
    SessionId,
};

pub use events::{ClientMessage, ServerMessage};

use crate::service::{GameHistory, JoinOutcome, LeaderboardAggregator, Matchmaking, SessionStore};
use crate::storage::TierChain;

/// Outbound side of the gateway. Group membership is keyed by
/// `SessionId::group()`.
pub trait Broadcaster: Send + Sync {
    fn is_live(&self, connection_id: ConnectionId) -> bool;

    fn join_group(&self, connection_id: ConnectionId, group: &str);

    fn leave_group(&self, connection_id: ConnectionId, group: &str);

    fn send_to(&self, connection_id: ConnectionId, message: ServerMessage);

    fn broadcast(&self, group: &str, message: ServerMessage);
}

/// Who sent a frame: the live connection and the identity it was admitted as.
#[derive(Debug, Clone)]
pub struct ConnectionContext {
    pub connection_id: ConnectionId,
    pub participant: Participant,
}

impl ConnectionContext {
    pub fn new(connection_id: ConnectionId, participant: Participant) -> Self {
        Self {
            connection_id,
            participant,
        }
    }

    fn queue_entry(&self) -> QueueEntry {
        QueueEntry::new(&self.participant, self.connection_id)
    }
}

pub struct Coordinator {
    matchmaking: Matchmaking,
    sessions: SessionStore,
    leaderboard: LeaderboardAggregator,
    history: GameHistory,
    hub: Arc<dyn Broadcaster>,
}

impl Coordinator {
    pub fn new(
        matchmaking: Matchmaking,
        sessions: SessionStore,
        leaderboard: LeaderboardAggregator,
        history: GameHistory,
        hub: Arc<dyn Broadcaster>,
    ) -> Self {
        Self {
            matchmaking,
            sessions,
            leaderboard,
            history,
            hub,
        }
    }

    pub fn from_tiers(chain: &TierChain, expiry: &ExpiryConfig, hub: Arc<dyn Broadcaster>) -> Self {
        Self::new(
            Matchmaking::new(
                chain.queue.clone(),
                Duration::from_secs(expiry.invite_code_ttl_secs),
            ),
            SessionStore::new(
                chain.sessions.clone(),
                Duration::from_secs(expiry.finished_session_ttl_secs),
            ),
            LeaderboardAggregator::new(chain.leaderboard.clone()),
            GameHistory::new(chain.history.clone()),
            hub,
        )
    }

    pub fn leaderboard(&self) -> &LeaderboardAggregator {
        &self.leaderboard
    }

    pub fn history(&self) -> &GameHistory {
        &self.history
    }

    #[tracing::instrument(skip(self, ctx), fields(connection_id = %ctx.connection_id))]
    pub async fn handle(&self, ctx: &ConnectionContext, message: ClientMessage) {
        match message {
            ClientMessage::QueueJoin => self.join_queue(ctx).await,
            ClientMessage::QueueLeave => self.leave_queue(ctx).await,
            ClientMessage::PrivateCreate => self.create_private(ctx).await,
            ClientMessage::PrivateJoinByCode { code } => self.join_by_code(ctx, &code).await,
            ClientMessage::MoveSubmit {
                session_id,
                cell_index,
            } => self.submit_move(ctx, session_id, cell_index).await,
            ClientMessage::SessionLeave { session_id } => self.leave_session(ctx, session_id).await,
        }
    }

    /// Pairs the caller or leaves it waiting. When one side of a fresh pair
    /// has already dropped, the survivor goes back into the queue and the
    /// attempt repeats.
    pub async fn join_queue(&self, ctx: &ConnectionContext) {
        let mut entry = ctx.queue_entry();

        loop {
            let pair = match self.matchmaking.join(&entry).await {
                Ok(JoinOutcome::Queued) => {
                    shared::record_counter("matchmaking.queued", 1);
                    if entry.connection_id == ctx.connection_id {
                        self.hub.send_to(ctx.connection_id, ServerMessage::QueueWaiting);
                    }
                    return;
                }
                Ok(JoinOutcome::Matched(pair)) => pair,
                Err(e) => {
                    self.report(ctx.connection_id, "queue.join", &e);
                    return;
                }
            };

            let first_live = self.hub.is_live(pair.first.connection_id);
            let second_live = self.hub.is_live(pair.second.connection_id);

            match (first_live, second_live) {
                (true, true) => {
                    if let Err(e) = self.start_session(&pair).await {
                        self.report(ctx.connection_id, "queue.join", &e);
                    }
                    return;
                }
                (true, false) => entry = pair.first,
                (false, true) => entry = pair.second,
                (false, false) => {
                    tracing::warn!(session_id = %pair.session_id, "Both matched connections are gone");
                    return;
                }
            }

            tracing::warn!(
                session_id = %pair.session_id,
                survivor = %entry.connection_id,
                "Matched connection dropped, requeueing survivor"
            );
        }
    }

    pub async fn leave_queue(&self, ctx: &ConnectionContext) {
        match self.matchmaking.leave(&ctx.queue_entry()).await {
            Ok(()) => self.hub.send_to(ctx.connection_id, ServerMessage::QueueLeft),
            Err(e) => self.report(ctx.connection_id, "queue.leave", &e),
        }
    }

    pub async fn create_private(&self, ctx: &ConnectionContext) {
        match self
            .matchmaking
            .create_private_code(None, &ctx.queue_entry())
            .await
        {
            Ok(created) => self.hub.send_to(
                ctx.connection_id,
                ServerMessage::PrivateCreated {
                    code: created.code,
                    session_id: created.session_id,
                },
            ),
            Err(e) => self.report(ctx.connection_id, "private.create", &e),
        }
    }

    /// The host plays X, the joiner O. The code is spent even if the host
    /// turns out to be gone.
    pub async fn join_by_code(&self, ctx: &ConnectionContext, code: &str) {
        let joiner = ctx.queue_entry();

        let invite = match self.matchmaking.claim_code(code, &joiner).await {
            Ok(invite) => invite,
            Err(e) => {
                self.report(ctx.connection_id, "private.joinByCode", &e);
                return;
            }
        };

        if !self.hub.is_live(invite.host.connection_id) {
            let err = ServiceError::InvalidCode(format!("{} (host disconnected)", code.trim()));
            self.report(ctx.connection_id, "private.joinByCode", &err);
            return;
        }

        let pair = MatchedPair {
            session_id: invite.session_id,
            first: invite.host,
            second: joiner,
        };

        // Neither side may be handed out by the open queue once seated here.
        for entry in [&pair.first, &pair.second] {
            if let Err(e) = self.matchmaking.leave(entry).await {
                tracing::warn!(
                    connection_id = %entry.connection_id,
                    error = %e,
                    "Failed to clear queue entry for private session"
                );
            }
        }

        if let Err(e) = self.start_session(&pair).await {
            self.report(ctx.connection_id, "private.joinByCode", &e);
        }
    }

    pub async fn submit_move(&self, ctx: &ConnectionContext, session_id: SessionId, cell_index: usize) {
        let started = Instant::now();

        let result = self
            .sessions
            .apply_and_persist(session_id, &ctx.participant.id, cell_index)
            .await;

        shared::record_timing("move.latency", started.elapsed().as_secs_f64());

        let state = match result {
            Ok(state) => state,
            Err(e) => {
                shared::record_counter("move.rejected", 1);
                tracing::debug!(
                    session_id = %session_id,
                    participant_id = %ctx.participant.id,
                    reason = e.reason(),
                    "Move rejected"
                );
                if !e.is_caller_error() {
                    tracing::error!(session_id = %session_id, error = %e, "Move failed");
                }
                self.hub.send_to(
                    ctx.connection_id,
                    ServerMessage::MoveRejected {
                        reason: e.reason().to_string(),
                        message: public_message(&e),
                    },
                );
                return;
            }
        };

        shared::record_counter("move.accepted", 1);

        let group = session_id.group();
        self.hub.join_group(ctx.connection_id, &group);
        self.hub.broadcast(&group, ServerMessage::SessionState(state.clone()));

        if state.is_completed() {
            self.finish(&state).await;
        }
    }

    pub async fn leave_session(&self, ctx: &ConnectionContext, session_id: SessionId) {
        self.hub.leave_group(ctx.connection_id, &session_id.group());
        self.hub
            .send_to(ctx.connection_id, ServerMessage::SessionLeft { session_id });
    }

    /// Drops any waiting entry the connection left behind. Group membership
    /// is released by the gateway when it unregisters the connection.
    pub async fn disconnect(&self, ctx: &ConnectionContext) {
        if let Err(e) = self.matchmaking.leave(&ctx.queue_entry()).await {
            tracing::warn!(
                connection_id = %ctx.connection_id,
                error = %e,
                "Failed to clear queue entry on disconnect"
            );
        }
        tracing::debug!(connection_id = %ctx.connection_id, "Connection cleaned up");
    }

    async fn start_session(&self, pair: &MatchedPair) -> shared::Result<GameState> {
        let state = self.sessions.create(pair).await?;
        let group = state.id.group();

        self.hub.join_group(pair.first.connection_id, &group);
        self.hub.join_group(pair.second.connection_id, &group);

        self.hub.broadcast(
            &group,
            ServerMessage::SessionMatched {
                session_id: state.id,
                players: state.players.clone(),
            },
        );
        self.hub.broadcast(&group, ServerMessage::SessionState(state.clone()));

        shared::record_counter("matchmaking.matched", 1);
        Ok(state)
    }

    /// Completion side effects. Leaderboard and history failures are logged
    /// and never reach the players.
    async fn finish(&self, state: &GameState) {
        let Some(winner) = state.winner else {
            return;
        };

        self.hub.broadcast(
            &state.id.group(),
            ServerMessage::SessionCompleted {
                session_id: state.id,
                winner,
            },
        );
        shared::record_counter("session.completed", 1);

        if let Some(participant) = state.winning_participant() {
            if let Err(e) = self
                .leaderboard
                .record_win(&participant.id, &participant.display_name, 1)
                .await
            {
                tracing::error!(
                    session_id = %state.id,
                    participant_id = %participant.id,
                    error = %e,
                    "Failed to record win"
                );
            }
        }

        if let Err(e) = self.history.record_completed(state).await {
            tracing::error!(session_id = %state.id, error = %e, "Failed to archive game");
        }
    }

    fn report(&self, connection_id: ConnectionId, operation: &'static str, err: &ServiceError) {
        if err.is_caller_error() {
            tracing::debug!(operation = operation, reason = err.reason(), "Request rejected");
        } else {
            tracing::error!(operation = operation, error = %err, "Request failed");
        }

        self.hub.send_to(
            connection_id,
            ServerMessage::Error {
                reason: err.reason().to_string(),
                message: public_message(err),
            },
        );
    }
}

/// Storage and internal details stay in the logs.
fn public_message(err: &ServiceError) -> String {
    if err.is_caller_error() {
        err.to_string()
    } else {
        "Service temporarily unavailable".to_string()
    }
}
