use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

/// Input errors from the command pipeline (C2/C3). Surfaced as
/// `command:result{success=false, message}`; never logged above info.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CommandError {
    #[error("command text was empty")]
    Empty,
    #[error("unrecognized command: {0}")]
    UnknownCommand(String),
    #[error("intensity must be a fraction in [0,1] or a percent in [0,100]: {0}")]
    BadIntensity(String),
    #[error("gear must be an integer in 1..8: {0}")]
    BadGear(String),
    #[error("rate limit exceeded")]
    RateLimited,
    #[error("command could not be delivered to the race engine: {0}")]
    CommandFailed(String),
}

impl CommandError {
    pub fn code(&self) -> &'static str {
        match self {
            CommandError::Empty => "EMPTY",
            CommandError::UnknownCommand(_) => "UNKNOWN_COMMAND",
            CommandError::BadIntensity(_) => "BAD_INTENSITY",
            CommandError::BadGear(_) => "BAD_GEAR",
            CommandError::RateLimited => "RATE_LIMITED",
            CommandError::CommandFailed(_) => "COMMAND_FAILED",
        }
    }
}

/// Lifecycle errors from the race registry/engine (C5/C6). Surfaced as
/// `error` frames or 4xx on HTTP; logged at warning.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LifecycleError {
    #[error("race not found: {0}")]
    RaceNotFound(String),
    #[error("race already started")]
    RaceAlreadyStarted,
    #[error("car not available: {0}")]
    CarNotAvailable(String),
    #[error("race capacity exceeded")]
    CapacityExceeded,
}

impl LifecycleError {
    pub fn code(&self) -> &'static str {
        match self {
            LifecycleError::RaceNotFound(_) => "RACE_NOT_FOUND",
            LifecycleError::RaceAlreadyStarted => "RACE_ALREADY_STARTED",
            LifecycleError::CarNotAvailable(_) => "CAR_NOT_AVAILABLE",
            LifecycleError::CapacityExceeded => "CAPACITY_EXCEEDED",
        }
    }
}

/// State errors from the snapshot/recovery subsystem (C7/C8). These trigger
/// recovery; surfaced to clients only once the recovery outcome is known.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StateError {
    #[error("snapshot not found: {0}")]
    SnapshotNotFound(String),
    #[error("snapshot failed validation: {0}")]
    SnapshotInvalid(String),
    #[error("race state corrupted: {0}")]
    RaceStateCorrupted(String),
}

impl StateError {
    pub fn code(&self) -> &'static str {
        match self {
            StateError::SnapshotNotFound(_) => "SNAPSHOT_NOT_FOUND",
            StateError::SnapshotInvalid(_) => "SNAPSHOT_INVALID",
            StateError::RaceStateCorrupted(_) => "RACE_STATE_CORRUPTED",
        }
    }
}

/// Infrastructure errors: db/cache unavailability, broadcast overflow, tick
/// panics. Logged at error, raise health alerts.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum InfraError {
    #[error("database error: {0}")]
    Database(String),
    #[error("cache error: {0}")]
    Cache(String),
    #[error("broadcast buffer overflow for socket {0}")]
    BroadcastOverflow(String),
}

impl InfraError {
    pub fn code(&self) -> &'static str {
        match self {
            InfraError::Database(_) => "DB_UNAVAILABLE",
            InfraError::Cache(_) => "CACHE_UNAVAILABLE",
            InfraError::BroadcastOverflow(_) => "BROADCAST_OVERFLOW",
        }
    }
}

/// Aggregated error type. The only error this crate's socket/HTTP adapters
/// ever serialize — everything else converts into it at the boundary.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ServerError {
    #[error(transparent)]
    Command(#[from] CommandError),
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),
    #[error(transparent)]
    State(#[from] StateError),
    #[error(transparent)]
    Infra(#[from] InfraError),
    #[error("authentication failed: {0}")]
    AuthFailed(String),
    #[error("join failed: {0}")]
    JoinFailed(String),
    #[error("leave failed: {0}")]
    LeaveFailed(String),
    #[error("server is shutting down")]
    ServerShutdown,
}

impl ServerError {
    pub fn code(&self) -> &'static str {
        match self {
            ServerError::Command(e) => e.code(),
            ServerError::Lifecycle(e) => e.code(),
            ServerError::State(e) => e.code(),
            ServerError::Infra(e) => e.code(),
            ServerError::AuthFailed(_) => "AUTH_FAILED",
            ServerError::JoinFailed(_) => "JOIN_FAILED",
            ServerError::LeaveFailed(_) => "LEAVE_FAILED",
            ServerError::ServerShutdown => "SERVER_SHUTDOWN",
        }
    }

    pub fn to_frame(&self) -> ErrorFrame {
        ErrorFrame {
            code: self.code().to_string(),
            message: self.to_string(),
            timestamp: Utc::now(),
        }
    }
}

/// Wire shape of the `error{code,message,timestamp}` frame from §6.
#[derive(Serialize, Debug, Clone)]
pub struct ErrorFrame {
    pub code: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}
