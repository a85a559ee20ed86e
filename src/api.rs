use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use uuid::Uuid;

use crate::database::queries;
use crate::error::LifecycleError;
use crate::events::FinishResult;
use crate::race::engine::EngineCommand;
use crate::AppState;

/// Thin HTTP surface (§6): race lifecycle plus observability. Everything
/// gameplay-shaped (join, command submission) happens over the websocket;
/// these routes exist for out-of-band race creation/inspection and the
/// health/metrics probes the reference server's API router also exposes.
#[derive(Debug)]
pub enum ApiError {
    NotFound(String),
    BadRequest(String),
    InternalError(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match self {
            ApiError::NotFound(m) => (StatusCode::NOT_FOUND, m),
            ApiError::BadRequest(m) => (StatusCode::BAD_REQUEST, m),
            ApiError::InternalError(m) => (StatusCode::INTERNAL_SERVER_ERROR, m),
        };
        (status, Json(ApiResponse::<()> { status: "error".to_string(), message: Some(message), data: None })).into_response()
    }
}

impl From<LifecycleError> for ApiError {
    fn from(err: LifecycleError) -> Self {
        match err {
            LifecycleError::RaceNotFound(id) => ApiError::NotFound(format!("race not found: {id}")),
            other => ApiError::BadRequest(other.to_string()),
        }
    }
}

#[derive(Debug, Serialize)]
struct ApiResponse<T> {
    status: String,
    message: Option<String>,
    data: Option<T>,
}

fn ok<T>(data: T) -> Json<ApiResponse<T>> {
    Json(ApiResponse { status: "success".to_string(), message: None, data: Some(data) })
}

#[derive(Debug, Deserialize)]
struct CreateRaceRequest {
    track_id: Uuid,
    total_laps: u32,
}

#[derive(Debug, Serialize)]
struct CreateRaceResponse {
    race_id: Uuid,
}

async fn create_race(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateRaceRequest>,
) -> Result<Json<ApiResponse<CreateRaceResponse>>, ApiError> {
    if state.tracks.get(req.track_id).is_none() {
        return Err(ApiError::BadRequest(format!("unknown track id: {}", req.track_id)));
    }
    let race_id = state.races.create(req.track_id, req.total_laps);
    if let Some(pool) = &state.db {
        if let Err(err) = queries::create_race(pool, req.track_id, req.total_laps as i32).await {
            tracing::warn!(%err, "failed to persist race creation (engine still runs in-memory)");
        }
    }
    Ok(ok(CreateRaceResponse { race_id }))
}

#[derive(Debug, Deserialize)]
struct JoinRaceRequest {
    player_id: Uuid,
    car_id: Uuid,
}

async fn join_race(
    State(state): State<Arc<AppState>>,
    Path(race_id): Path<Uuid>,
    Json(req): Json<JoinRaceRequest>,
) -> Result<Json<ApiResponse<()>>, ApiError> {
    let handle = state.races.get(race_id).ok_or_else(|| LifecycleError::RaceNotFound(race_id.to_string()))?;
    let (reply_tx, reply_rx) = tokio::sync::oneshot::channel();
    handle
        .mailbox
        .send(EngineCommand::AddParticipant { player_id: req.player_id, car_id: req.car_id, reply: reply_tx })
        .await
        .map_err(|_| ApiError::InternalError("race engine unavailable".into()))?;
    reply_rx.await.map_err(|_| ApiError::InternalError("race engine did not reply".into()))??;
    if let Some(pool) = &state.db {
        if let Err(err) = queries::add_participant(pool, race_id, req.player_id, req.car_id).await {
            tracing::warn!(%err, "failed to persist race participant (engine still runs in-memory)");
        }
    }
    Ok(ok(()))
}

#[derive(Debug, Deserialize)]
struct LeaveRaceRequest {
    player_id: Uuid,
}

async fn leave_race(
    State(state): State<Arc<AppState>>,
    Path(race_id): Path<Uuid>,
    Json(req): Json<LeaveRaceRequest>,
) -> Result<Json<ApiResponse<()>>, ApiError> {
    let handle = state.races.get(race_id).ok_or_else(|| LifecycleError::RaceNotFound(race_id.to_string()))?;
    handle
        .mailbox
        .send(EngineCommand::RemoveParticipant { player_id: req.player_id })
        .await
        .map_err(|_| ApiError::InternalError("race engine unavailable".into()))?;
    Ok(ok(()))
}

async fn start_race(State(state): State<Arc<AppState>>, Path(race_id): Path<Uuid>) -> Result<Json<ApiResponse<()>>, ApiError> {
    let handle = state.races.get(race_id).ok_or_else(|| LifecycleError::RaceNotFound(race_id.to_string()))?;
    let (reply_tx, reply_rx) = tokio::sync::oneshot::channel();
    handle
        .mailbox
        .send(EngineCommand::Start { reply: reply_tx })
        .await
        .map_err(|_| ApiError::InternalError("race engine unavailable".into()))?;
    reply_rx.await.map_err(|_| ApiError::InternalError("race engine did not reply".into()))??;
    if let Some(pool) = &state.db {
        if let Err(err) = queries::update_race_status(pool, race_id, "active").await {
            tracing::warn!(%err, "failed to persist race status (engine still runs in-memory)");
        }
    }
    Ok(ok(()))
}

async fn get_race(State(state): State<Arc<AppState>>, Path(race_id): Path<Uuid>) -> Result<Json<ApiResponse<crate::race::state::RaceState>>, ApiError> {
    let handle = state.races.get(race_id).ok_or_else(|| LifecycleError::RaceNotFound(race_id.to_string()))?;
    Ok(ok(handle.state.borrow().clone()))
}

#[derive(Debug, Serialize)]
struct RaceResultsResponse {
    race_id: Uuid,
    results: Vec<FinishResult>,
}

async fn get_race_results(State(state): State<Arc<AppState>>, Path(race_id): Path<Uuid>) -> Result<Json<ApiResponse<RaceResultsResponse>>, ApiError> {
    let handle = state.races.get(race_id).ok_or_else(|| LifecycleError::RaceNotFound(race_id.to_string()))?;
    let race_state = handle.state.borrow().clone();
    if race_state.status != crate::race::state::RaceStatus::Finished {
        return Err(ApiError::BadRequest("race has not finished".into()));
    }
    let mut ordered = race_state.participants.clone();
    ordered.sort_by_key(|p| p.position);
    let results = ordered
        .iter()
        .map(|p| FinishResult { player_id: p.player_id, position: p.position, total_time_sec: p.total_time_sec })
        .collect();
    Ok(ok(RaceResultsResponse { race_id, results }))
}

async fn health(State(state): State<Arc<AppState>>) -> Json<ApiResponse<crate::health::HealthReport>> {
    ok(state.health.probe().await)
}

async fn metrics(State(state): State<Arc<AppState>>) -> String {
    format!(
        "active_races {}\nactive_connections {}\n",
        state.races.list_active().len(),
        state.connections.socket_count(),
    )
}

pub fn create_api_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any);

    Router::new()
        .route("/races", post(create_race))
        .route("/races/{race_id}", get(get_race))
        .route("/races/{race_id}/join", post(join_race))
        .route("/races/{race_id}/leave", post(leave_race))
        .route("/races/{race_id}/start", post(start_race))
        .route("/races/{race_id}/results", get(get_race_results))
        .route("/health", get(health))
        .route("/metrics", get(metrics))
        .layer(cors)
        .with_state(state)
}
