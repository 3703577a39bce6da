use futures::future::BoxFuture;
use shared::{LeaderboardRow, ParticipantId, StorageError, StorageResult};
use sqlx::{PgPool, Row};
use tracing::{debug, error};

use super::participant_repo::upsert_participant;
use super::TIER;
use crate::storage::LeaderboardTier;

/// Cumulative win counts, the source of truth for the leaderboard.
#[derive(Clone)]
pub struct LeaderboardRepository {
    pool: PgPool,
}

impl LeaderboardRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn increment_wins(
        &self,
        participant_id: &ParticipantId,
        display_name: &str,
        delta: i64,
    ) -> StorageResult<i64> {
        let mut tx = self.pool.begin().await?;

        upsert_participant(&mut *tx, participant_id, display_name).await?;

        let row = sqlx::query(
            r#"
            INSERT INTO leaderboard (participant_id, display_name, wins)
            VALUES ($1, $2, $3)
            ON CONFLICT (participant_id) DO UPDATE SET
                display_name = EXCLUDED.display_name,
                wins = leaderboard.wins + EXCLUDED.wins,
                updated_at = NOW()
            RETURNING wins
            "#,
        )
        .bind(participant_id.as_str())
        .bind(display_name)
        .bind(delta)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| {
            error!(error = %e, participant_id = %participant_id, "Failed to increment wins");
            StorageError::from(e)
        })?;

        tx.commit().await?;

        let wins: i64 = row.get("wins");
        debug!(participant_id = %participant_id, wins = wins, "Leaderboard row upserted");
        Ok(wins)
    }

    pub async fn get_top(&self, limit: i64) -> StorageResult<Vec<LeaderboardRow>> {
        let rows = sqlx::query(
            r#"
            SELECT participant_id, display_name, wins
            FROM leaderboard
            ORDER BY wins DESC, display_name ASC
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| {
                let participant_id: String = row.get("participant_id");
                Ok(LeaderboardRow {
                    participant_id: ParticipantId::new(participant_id)
                        .map_err(|e| StorageError::corrupt(TIER, e.to_string()))?,
                    display_name: row.get("display_name"),
                    wins: row.get("wins"),
                })
            })
            .collect()
    }
}

impl LeaderboardTier for LeaderboardRepository {
    fn tier(&self) -> &'static str {
        TIER
    }

    fn durable(&self) -> bool {
        true
    }

    fn increment<'a>(
        &'a self,
        participant_id: &'a ParticipantId,
        display_name: &'a str,
        delta: i64,
    ) -> BoxFuture<'a, StorageResult<()>> {
        Box::pin(async move {
            self.increment_wins(participant_id, display_name, delta).await?;
            Ok(())
        })
    }

    fn top(&self, n: usize) -> BoxFuture<'_, StorageResult<Vec<LeaderboardRow>>> {
        Box::pin(async move { self.get_top(n as i64).await })
    }
}
