use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::events::RaceEvent;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RaceStatus {
    Waiting,
    Active,
    Finished,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq)]
pub struct TireWear {
    pub front: f32,
    pub rear: f32,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq)]
pub struct Location {
    pub lap: u32,
    pub sector: u32,
    pub distance_meters: f32,
}

/// One racer's live state (§3). The engine is the sole mutator; every field
/// here is a value the engine publishes, never a handle into engine memory.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Participant {
    pub race_id: Uuid,
    pub player_id: Uuid,
    pub car_id: Uuid,
    pub position: u32,
    pub fuel_pct: f32,
    pub tire_wear: TireWear,
    pub speed_kmh: f32,
    pub location: Location,
    pub lap_time_sec: f32,
    pub total_time_sec: f32,
    pub last_command_type: Option<String>,
    pub last_command_at: Option<DateTime<Utc>>,
}

impl Participant {
    pub fn new(race_id: Uuid, player_id: Uuid, car_id: Uuid, position: u32) -> Self {
        Participant {
            race_id,
            player_id,
            car_id,
            position,
            fuel_pct: 100.0,
            tire_wear: TireWear::default(),
            speed_kmh: 0.0,
            location: Location::default(),
            lap_time_sec: 0.0,
            total_time_sec: 0.0,
            last_command_type: None,
            last_command_at: None,
        }
    }
}

/// One race's authoritative state (§3, §4.4). Held exclusively by its engine.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct RaceState {
    pub race_id: Uuid,
    pub track_id: Uuid,
    pub total_laps: u32,
    pub max_participants: usize,
    pub status: RaceStatus,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    pub race_time_sec: f32,
    pub tick_count: u64,
    pub participants: Vec<Participant>,
    pub events: Vec<RaceEvent>,
}

impl RaceState {
    pub fn new(race_id: Uuid, track_id: Uuid, total_laps: u32, max_participants: usize) -> Self {
        RaceState {
            race_id,
            track_id,
            total_laps,
            max_participants,
            status: RaceStatus::Waiting,
            created_at: Utc::now(),
            started_at: None,
            ended_at: None,
            race_time_sec: 0.0,
            tick_count: 0,
            participants: Vec::new(),
            events: Vec::new(),
        }
    }

    pub fn participant_mut(&mut self, player_id: Uuid) -> Option<&mut Participant> {
        self.participants.iter_mut().find(|p| p.player_id == player_id)
    }

    pub fn participant(&self, player_id: Uuid) -> Option<&Participant> {
        self.participants.iter().find(|p| p.player_id == player_id)
    }

    /// Safety cap from §4.4: `totalLaps * 300s`.
    pub fn max_race_time_sec(&self) -> f32 {
        self.total_laps as f32 * 300.0
    }

    pub fn recent_events(&self, limit: usize) -> &[RaceEvent] {
        let start = self.events.len().saturating_sub(limit);
        &self.events[start..]
    }

    pub fn push_event(&mut self, event: RaceEvent) {
        self.events.push(event);
        if self.events.len() > crate::events::MAX_RETAINED_EVENTS {
            let drop = self.events.len() - crate::events::MAX_RETAINED_EVENTS;
            self.events.drain(0..drop);
        }
    }
}
