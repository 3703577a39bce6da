use std::sync::Arc;

use shared::{CompletedGame, GameState, ParticipantId, Result, StorageError};

use crate::storage::{empty_chain, note_degraded, GameNames, HistoryTier};

pub const MAX_PAGE_SIZE: usize = 100;

/// Archive of finished games. Completion is written to every tier so the
/// local recent list stays useful when the database drops out.
pub struct GameHistory {
    tiers: Vec<Arc<dyn HistoryTier>>,
}

impl GameHistory {
    pub fn new(tiers: Vec<Arc<dyn HistoryTier>>) -> Self {
        Self { tiers }
    }

    /// Ignores sessions that are still in progress. Succeeds when at least one
    /// tier kept the record.
    pub async fn record_completed(&self, state: &GameState) -> Result<()> {
        if !state.is_completed() {
            tracing::debug!(session_id = %state.id, "Skipping history for unfinished session");
            return Ok(());
        }

        let game = CompletedGame::from_state(state);
        let names = GameNames {
            x: state.players.x.display_name.clone(),
            o: state.players.o.display_name.clone(),
        };

        let mut saved = false;
        let mut last_error: Option<StorageError> = None;

        for tier in &self.tiers {
            match tier.save(&game, &names).await {
                Ok(()) => saved = true,
                Err(e) => {
                    note_degraded("history.record_completed", &e);
                    last_error = Some(e);
                }
            }
        }

        if saved {
            tracing::info!(session_id = %game.id, winner = ?game.winner, "Game archived");
            return Ok(());
        }

        Err(last_error.unwrap_or_else(|| empty_chain("history.record_completed")).into())
    }

    /// Newest first. `limit` is clamped to `1..=100`.
    pub async fn recent_for_participant(
        &self,
        participant_id: &ParticipantId,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<CompletedGame>> {
        let limit = limit.clamp(1, MAX_PAGE_SIZE);
        let mut last_error: Option<StorageError> = None;

        for tier in &self.tiers {
            match tier.recent(participant_id, limit, offset).await {
                Ok(games) => return Ok(games),
                Err(e) => {
                    note_degraded("history.recent", &e);
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| empty_chain("history.recent")).into())
    }
}
