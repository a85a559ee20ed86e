use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    RaceStart,
    RaceFinish,
    Overtake,
    PitStop,
    LapComplete,
    Incident,
}

/// Event-specific data. Kept as a single enum rather than a loose JSON blob
/// so the engine is the only producer and every variant is exhaustively
/// handled — no downstream consumer has to sniff a `payload` shape.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EventPayload {
    RaceStart,
    RaceFinish { results: Vec<FinishResult> },
    Overtake { overtaking: Uuid, overtaken: Uuid },
    PitStop { player_id: Uuid, actions: Vec<PitAction>, duration_ms: u64 },
    LapComplete { player_id: Uuid, lap: u32, lap_time_sec: f32 },
    Incident { player_id: Uuid, reason: IncidentReason },
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PitAction {
    Refuel,
    TireChange,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum IncidentReason {
    LowFuel,
    TireWearCritical,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct FinishResult {
    pub player_id: Uuid,
    pub position: u32,
    pub total_time_sec: f32,
}

/// Append-only event owned by a race. Truncated to the most recent K on
/// export (see `RaceState::recent_events`).
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct RaceEvent {
    pub id: Uuid,
    pub race_id: Uuid,
    pub tick_time: u64,
    pub created_at: DateTime<Utc>,
    pub event_type: EventType,
    pub involved_players: Vec<Uuid>,
    pub payload: EventPayload,
}

impl RaceEvent {
    pub fn new(
        race_id: Uuid,
        tick_time: u64,
        event_type: EventType,
        involved_players: Vec<Uuid>,
        payload: EventPayload,
    ) -> Self {
        RaceEvent {
            id: Uuid::new_v4(),
            race_id,
            tick_time,
            created_at: Utc::now(),
            event_type,
            involved_players,
            payload,
        }
    }
}

pub const MAX_RETAINED_EVENTS: usize = 100;
