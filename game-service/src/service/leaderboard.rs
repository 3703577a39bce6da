use std::sync::Arc;

use shared::{LeaderboardRow, ParticipantId, Result, StorageError};

use crate::storage::{empty_chain, note_degraded, LeaderboardTier};

pub const MAX_TOP_N: usize = 100;

/// Cumulative wins per participant. Writes go to the first tier that accepts
/// them; reads come from the first tier that answers.
pub struct LeaderboardAggregator {
    tiers: Vec<Arc<dyn LeaderboardTier>>,
}

impl LeaderboardAggregator {
    pub fn new(tiers: Vec<Arc<dyn LeaderboardTier>>) -> Self {
        Self { tiers }
    }

    pub async fn record_win(
        &self,
        participant_id: &ParticipantId,
        display_name: &str,
        delta: u32,
    ) -> Result<()> {
        if delta == 0 {
            return Ok(());
        }
        let delta = i64::from(delta);
        let mut last_error: Option<StorageError> = None;

        for (index, tier) in self.tiers.iter().enumerate() {
            match tier.increment(participant_id, display_name, delta).await {
                Ok(()) => {
                    tracing::info!(
                        participant_id = %participant_id,
                        delta = delta,
                        tier = tier.tier(),
                        "Win recorded"
                    );
                    if tier.durable() {
                        self.mirror(index + 1, participant_id, display_name, delta).await;
                    }
                    return Ok(());
                }
                Err(e) => {
                    note_degraded("leaderboard.record_win", &e);
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| empty_chain("leaderboard.record_win")).into())
    }

    async fn mirror(
        &self,
        index: usize,
        participant_id: &ParticipantId,
        display_name: &str,
        delta: i64,
    ) {
        let Some(tier) = self.tiers.get(index) else {
            return;
        };
        if let Err(e) = tier.increment(participant_id, display_name, delta).await {
            tracing::warn!(
                participant_id = %participant_id,
                tier = tier.tier(),
                error = %e,
                "Leaderboard mirror write failed"
            );
        }
    }

    /// Highest win counts first, `n` clamped to `1..=100`.
    pub async fn top_n(&self, n: usize) -> Result<Vec<LeaderboardRow>> {
        let n = n.clamp(1, MAX_TOP_N);
        let mut last_error: Option<StorageError> = None;

        for tier in &self.tiers {
            match tier.top(n).await {
                Ok(rows) => return Ok(rows),
                Err(e) => {
                    note_degraded("leaderboard.top_n", &e);
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| empty_chain("leaderboard.top_n")).into())
    }
}
