use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use shared::{
    CompletedGame, MoveRecord, ParticipantId, SessionId, StorageError, StorageResult, Winner,
};
use sqlx::postgres::PgRow;
use sqlx::types::Json;
use sqlx::{PgPool, Row};
use tracing::debug;

use super::participant_repo::upsert_participant;
use super::TIER;
use crate::storage::{GameNames, HistoryTier};

#[derive(Clone)]
pub struct GamesRepository {
    pool: PgPool,
}

impl GamesRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Upserts by session id, so a repeated completion notice rewrites the
    /// same row.
    pub async fn save_completed(&self, game: &CompletedGame, names: &GameNames) -> StorageResult<()> {
        let mut tx = self.pool.begin().await?;

        upsert_participant(&mut *tx, &game.x_participant_id, &names.x).await?;
        upsert_participant(&mut *tx, &game.o_participant_id, &names.o).await?;

        sqlx::query(
            r#"
            INSERT INTO games (id, x_participant_id, o_participant_id, winner, moves, started_at, ended_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (id) DO UPDATE SET
                winner = EXCLUDED.winner,
                moves = EXCLUDED.moves,
                started_at = EXCLUDED.started_at,
                ended_at = EXCLUDED.ended_at
            "#,
        )
        .bind(game.id.0)
        .bind(game.x_participant_id.as_str())
        .bind(game.o_participant_id.as_str())
        .bind(game.winner.map(|winner| winner.as_str()))
        .bind(Json(&game.moves))
        .bind(game.started_at)
        .bind(game.ended_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        debug!(session_id = %game.id, "Completed game persisted");
        Ok(())
    }

    pub async fn get_recent_by_participant(
        &self,
        participant_id: &ParticipantId,
        limit: i64,
        offset: i64,
    ) -> StorageResult<Vec<CompletedGame>> {
        let rows = sqlx::query(
            r#"
            SELECT id, x_participant_id, o_participant_id, winner, moves, started_at, ended_at
            FROM games
            WHERE x_participant_id = $1 OR o_participant_id = $1
            ORDER BY ended_at DESC NULLS LAST, started_at DESC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(participant_id.as_str())
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(completed_game_from_row).collect()
    }
}

fn completed_game_from_row(row: &PgRow) -> StorageResult<CompletedGame> {
    let corrupt = |e: shared::ServiceError| StorageError::corrupt(TIER, e.to_string());

    let winner: Option<String> = row.get("winner");
    let moves: Json<Vec<MoveRecord>> = row.get("moves");
    let started_at: DateTime<Utc> = row.get("started_at");
    let ended_at: Option<DateTime<Utc>> = row.get("ended_at");

    Ok(CompletedGame {
        id: SessionId(row.get("id")),
        x_participant_id: ParticipantId::new(row.get::<String, _>("x_participant_id"))
            .map_err(corrupt)?,
        o_participant_id: ParticipantId::new(row.get::<String, _>("o_participant_id"))
            .map_err(corrupt)?,
        winner: winner.as_deref().map(Winner::parse).transpose().map_err(corrupt)?,
        moves: moves.0,
        started_at,
        ended_at: ended_at.unwrap_or(started_at),
    })
}

impl HistoryTier for GamesRepository {
    fn tier(&self) -> &'static str {
        TIER
    }

    fn save<'a>(&'a self, game: &'a CompletedGame, names: &'a GameNames)
        -> BoxFuture<'a, StorageResult<()>> {
        Box::pin(self.save_completed(game, names))
    }

    fn recent<'a>(
        &'a self,
        participant_id: &'a ParticipantId,
        limit: usize,
        offset: usize,
    ) -> BoxFuture<'a, StorageResult<Vec<CompletedGame>>> {
        Box::pin(self.get_recent_by_participant(participant_id, limit as i64, offset as i64))
    }
}
