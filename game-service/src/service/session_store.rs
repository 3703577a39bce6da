use std::sync::Arc;
use std::time::Duration;

use shared::{
    GameState, MatchedPair, ParticipantId, Result, ServiceError, SessionId, StorageError,
};
use tracing::{debug, info};

use crate::domain::{self, MoveInput};
use crate::storage::{empty_chain, note_degraded, SessionTier};

/// Owns every `GameState` for its lifetime. Reads go cache first, then the
/// local fallback; writes land on the first tier that accepts them.
pub struct SessionStore {
    tiers: Vec<Arc<dyn SessionTier>>,
    finished_ttl: Duration,
}

impl SessionStore {
    pub fn new(tiers: Vec<Arc<dyn SessionTier>>, finished_ttl: Duration) -> Self {
        Self {
            tiers,
            finished_ttl,
        }
    }

    /// First queue entry plays X, second plays O. Both seats must belong to
    /// different participants or the O seat could never move.
    pub async fn create(&self, pair: &MatchedPair) -> Result<GameState> {
        if pair.first.participant_id == pair.second.participant_id {
            return Err(ServiceError::Validation(
                "A participant cannot play against itself".to_string(),
            ));
        }

        let state = domain::create_session(
            pair.session_id,
            pair.first.participant(),
            pair.second.participant(),
        );

        self.save(&state).await?;

        info!(
            session_id = %state.id,
            x = %state.players.x.id,
            o = %state.players.o.id,
            "Session created"
        );

        Ok(state)
    }

    pub async fn load(&self, session_id: SessionId) -> Result<GameState> {
        for tier in &self.tiers {
            match tier.get(session_id).await {
                Ok(Some(state)) => return Ok(state),
                Ok(None) => {
                    debug!(session_id = %session_id, tier = tier.tier(), "Session miss");
                }
                Err(e) => note_degraded("session.load", &e),
            }
        }

        Err(ServiceError::SessionNotFound(session_id.to_string()))
    }

    pub async fn save(&self, state: &GameState) -> Result<()> {
        let ttl = state.is_completed().then_some(self.finished_ttl);
        let mut last_error: Option<StorageError> = None;

        for tier in &self.tiers {
            match tier.put(state, ttl).await {
                Ok(()) => return Ok(()),
                Err(e) => {
                    note_degraded("session.save", &e);
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| empty_chain("session.save")).into())
    }

    /// The single read-modify-write path for moves. Not serialized against
    /// concurrent calls for the same session: last write wins.
    pub async fn apply_and_persist(
        &self,
        session_id: SessionId,
        participant_id: &ParticipantId,
        cell_index: usize,
    ) -> Result<GameState> {
        let state = self.load(session_id).await?;

        let mark = state
            .players
            .mark_of(participant_id)
            .ok_or_else(|| ServiceError::ParticipantNotInSession(participant_id.to_string()))?;

        let updated = domain::apply_move(
            &state,
            MoveInput {
                participant_id: participant_id.clone(),
                mark,
                cell_index,
            },
        )?;

        self.save(&updated).await?;

        debug!(
            session_id = %session_id,
            participant_id = %participant_id,
            cell_index = cell_index,
            status = ?updated.status,
            "Move applied"
        );

        Ok(updated)
    }
}
