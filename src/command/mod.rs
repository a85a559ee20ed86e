pub mod parser;
pub mod queue;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub use parser::{parse, render};
pub use queue::PlayerQueue;

/// The closed set of player driving commands (§3, §4.1). The parser is the
/// only producer; the physics kernel exhaustively handles every variant.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Command {
    Accelerate { intensity: f32 },
    Brake { intensity: f32 },
    Shift { gear: u8 },
    Coast,
    Pit,
}

impl Command {
    /// Maps a command to `(throttle, brake)` per §4.3. `shift`/`pit` apply a
    /// light braking effect on approach rather than leaving the car coasting.
    pub fn throttle_brake(&self) -> (f32, f32) {
        match self {
            Command::Accelerate { intensity } => (*intensity, 0.0),
            Command::Brake { intensity } => (0.0, *intensity),
            Command::Coast => (0.0, 0.0),
            Command::Shift { .. } => (0.0, 0.0),
            Command::Pit => (0.0, 0.5),
        }
    }
}

/// One entry in a per-player FIFO queue (§3).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QueuedCommand {
    pub player_id: Uuid,
    pub command: Command,
    pub enqueued_at: std::time::Instant,
}
