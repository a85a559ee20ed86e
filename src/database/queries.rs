use sqlx::PgPool;
use uuid::Uuid;

use super::models::{RaceDb, RaceParticipantDb};

pub async fn create_race(pool: &PgPool, track_id: Uuid, total_laps: i32) -> Result<RaceDb, sqlx::Error> {
    sqlx::query_as::<_, RaceDb>(
        r#"INSERT INTO races (id, track_id, total_laps, status, created_at)
           VALUES ($1, $2, $3, 'waiting', now())
           RETURNING id, track_id, total_laps, status, start_time, end_time, race_data_json, results_json, created_at"#,
    )
    .bind(Uuid::new_v4())
    .bind(track_id)
    .bind(total_laps)
    .fetch_one(pool)
    .await
}

pub async fn get_race(pool: &PgPool, race_id: Uuid) -> Result<Option<RaceDb>, sqlx::Error> {
    sqlx::query_as::<_, RaceDb>(
        r#"SELECT id, track_id, total_laps, status, start_time, end_time, race_data_json, results_json, created_at
           FROM races WHERE id = $1"#,
    )
    .bind(race_id)
    .fetch_optional(pool)
    .await
}

pub async fn update_race_status(pool: &PgPool, race_id: Uuid, status: &str) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE races SET status = $2 WHERE id = $1")
        .bind(race_id)
        .bind(status)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn save_race_snapshot_json(
    pool: &PgPool,
    race_id: Uuid,
    race_data_json: serde_json::Value,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE races SET race_data_json = $2 WHERE id = $1")
        .bind(race_id)
        .bind(race_data_json)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn save_race_results(
    pool: &PgPool,
    race_id: Uuid,
    results_json: serde_json::Value,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE races SET status = 'finished', end_time = now(), results_json = $2 WHERE id = $1")
        .bind(race_id)
        .bind(results_json)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn add_participant(
    pool: &PgPool,
    race_id: Uuid,
    player_id: Uuid,
    car_id: Uuid,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"INSERT INTO race_participants (race_id, player_id, car_id)
           VALUES ($1, $2, $3)
           ON CONFLICT (race_id, player_id) DO NOTHING"#,
    )
    .bind(race_id)
    .bind(player_id)
    .bind(car_id)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn list_participants(pool: &PgPool, race_id: Uuid) -> Result<Vec<RaceParticipantDb>, sqlx::Error> {
    sqlx::query_as::<_, RaceParticipantDb>(
        r#"SELECT race_id, player_id, car_id, final_position, final_time, race_events_json
           FROM race_participants WHERE race_id = $1 ORDER BY final_position ASC NULLS LAST"#,
    )
    .bind(race_id)
    .fetch_all(pool)
    .await
}

pub async fn record_final_result(
    pool: &PgPool,
    race_id: Uuid,
    player_id: Uuid,
    final_position: i32,
    final_time: f64,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"UPDATE race_participants SET final_position = $3, final_time = $4
           WHERE race_id = $1 AND player_id = $2"#,
    )
    .bind(race_id)
    .bind(player_id)
    .bind(final_position)
    .bind(final_time)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn health_check(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT 1").execute(pool).await?;
    Ok(())
}
