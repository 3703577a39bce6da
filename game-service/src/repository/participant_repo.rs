use shared::{ParticipantId, StorageResult};
use sqlx::PgConnection;

/// Insert or refresh a participant row. Identity is issued elsewhere; rows
/// exist here only so games and leaderboard entries can reference them.
pub(crate) async fn upsert_participant(
    conn: &mut PgConnection,
    id: &ParticipantId,
    display_name: &str,
) -> StorageResult<()> {
    sqlx::query(
        r#"
        INSERT INTO participants (id, display_name)
        VALUES ($1, $2)
        ON CONFLICT (id) DO UPDATE SET display_name = EXCLUDED.display_name
        "#,
    )
    .bind(id.as_str())
    .bind(display_name)
    .execute(conn)
    .await?;

    Ok(())
}
