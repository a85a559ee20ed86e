use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ErrorFrame;
use crate::events::{FinishResult, RaceEvent};
use crate::race::state::RaceState;

/// Client → Server frames (§6).
#[derive(Deserialize, Debug, Clone)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    #[serde(rename = "player:authenticate")]
    Authenticate { token: String },
    #[serde(rename = "race:join")]
    Join { race_id: Uuid, car_id: Uuid },
    #[serde(rename = "race:leave")]
    Leave { race_id: Uuid },
    #[serde(rename = "race:command")]
    Command { text: String },
}

#[derive(Serialize, Debug, Clone)]
pub struct PitStopNotice {
    pub player_id: Uuid,
    pub actions: Vec<crate::events::PitAction>,
    pub duration_ms: u64,
}

#[derive(Serialize, Debug, Clone)]
pub struct RaceResult {
    pub race_id: Uuid,
    pub results: Vec<FinishResult>,
}

/// Server → Client frames (§6). Serialized with an internal `type` tag
/// matching the wire names in the spec (colon-separated, not snake_case).
#[derive(Serialize, Debug, Clone)]
#[serde(tag = "type")]
#[allow(clippy::large_enum_variant)]
pub enum ServerMessage {
    #[serde(rename = "connection:authenticated")]
    Authenticated { player_id: Uuid },
    #[serde(rename = "race:state")]
    State { full_race_state: RaceState },
    #[serde(rename = "race:update")]
    Update { full_race_state: RaceState },
    #[serde(rename = "race:event")]
    Event { event: RaceEvent },
    #[serde(rename = "race:started")]
    Started { race_id: Uuid },
    #[serde(rename = "race:completed")]
    Completed { race_id: Uuid, result: RaceResult },
    #[serde(rename = "race:pitStop")]
    PitStop(PitStopNotice),
    #[serde(rename = "race:recovered")]
    Recovered { message: String, state: RaceState },
    #[serde(rename = "command:result")]
    CommandResult { success: bool, message: Option<String> },
    #[serde(rename = "error")]
    Error(ErrorFrame),
}
