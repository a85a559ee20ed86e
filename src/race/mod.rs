pub mod engine;
pub mod registry;
pub mod state;

pub use engine::{EngineCommand, EngineHandle, RaceEngine};
pub use registry::RaceRegistry;
pub use state::RaceState;
