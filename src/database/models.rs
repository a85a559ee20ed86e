use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Durable row for `races` (§6). `race_data_json`/`results_json` hold the
/// same shapes as `race::state::RaceState`/`protocol::RaceResult`, stored as
/// opaque JSON rather than normalized columns since only the recovery
/// coordinator's fallback path and post-race reads touch them.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct RaceDb {
    pub id: Uuid,
    pub track_id: Uuid,
    pub total_laps: i32,
    pub status: String,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub race_data_json: Option<serde_json::Value>,
    pub results_json: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

/// Durable row for `race_participants` (§6).
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct RaceParticipantDb {
    pub race_id: Uuid,
    pub player_id: Uuid,
    pub car_id: Uuid,
    pub final_position: Option<i32>,
    pub final_time: Option<f64>,
    pub race_events_json: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateRaceRequest {
    pub track_id: Uuid,
    pub total_laps: i32,
}
