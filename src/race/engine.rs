use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::{mpsc, oneshot, watch, Notify};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::broadcast::BroadcastDispatcher;
use crate::command::{parse, Command, PlayerQueue};
use crate::config::Config;
use crate::database::queries;
use crate::error::{LifecycleError, ServerError};
use crate::events::{EventPayload, EventType, FinishResult, PitAction, RaceEvent};
use crate::models::{CarCatalog, Environment, TrackCatalog};
use crate::physics;
use crate::protocol::{PitStopNotice, RaceResult, ServerMessage};
use crate::race::state::{Participant, RaceState, RaceStatus};
use crate::snapshot::SnapshotStore;

/// The only way any component outside the engine may act on a race (§4.4).
/// Every variant that needs a result carries a `oneshot::Sender` so callers
/// can await an answer without ever touching `RaceState` directly.
pub enum EngineCommand {
    AddParticipant {
        player_id: Uuid,
        car_id: Uuid,
        reply: oneshot::Sender<Result<(), LifecycleError>>,
    },
    RemoveParticipant {
        player_id: Uuid,
    },
    SubmitCommand {
        player_id: Uuid,
        text: String,
        reply: oneshot::Sender<Result<(), ServerError>>,
    },
    Start {
        reply: oneshot::Sender<Result<(), LifecycleError>>,
    },
    Stop,
    Recover {
        state: RaceState,
    },
    Shutdown,
}

/// What the websocket/HTTP layer holds to reach a running engine: the
/// mailbox to send `EngineCommand`s, and a `watch` channel for read-only
/// access to the latest published `RaceState` (used by `GET /races/{id}`).
#[derive(Clone)]
pub struct EngineHandle {
    pub mailbox: mpsc::Sender<EngineCommand>,
    pub state: watch::Receiver<RaceState>,
    pub shutdown: Arc<Notify>,
}

/// How the engine's task ended, reported to its `JoinHandle`'s caller so
/// `RaceRegistry` knows whether to invoke recovery (§4.7/§7).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineExit {
    Normal,
    Panicked,
}

struct PlayerRuntime {
    queue: PlayerQueue,
}

/// Owns one race's authoritative state and tick loop (C5). Single-threaded
/// internally: every mutation happens either inside `tick` or while handling
/// one `EngineCommand`, never concurrently. Grounded in shape on the
/// reference server's `RaceState::update` tick method, restructured around
/// the pure `physics::step` kernel and a typed mailbox instead of a shared
/// `Mutex<RaceState>` polled by multiple tasks.
pub struct RaceEngine {
    state: RaceState,
    runtimes: HashMap<Uuid, PlayerRuntime>,
    cars: Arc<CarCatalog>,
    tracks: Arc<TrackCatalog>,
    config: Arc<Config>,
    broadcast: Arc<BroadcastDispatcher>,
    snapshots: Arc<SnapshotStore>,
    state_tx: watch::Sender<RaceState>,
    db: Option<Arc<sqlx::PgPool>>,
}

impl RaceEngine {
    /// Spawns the engine's tick loop on a fresh task and returns a handle to
    /// it. The loop runs until `Shutdown` is received or the race completes.
    pub fn spawn(
        race_id: Uuid,
        track_id: Uuid,
        total_laps: u32,
        cars: Arc<CarCatalog>,
        tracks: Arc<TrackCatalog>,
        config: Arc<Config>,
        broadcast: Arc<BroadcastDispatcher>,
        snapshots: Arc<SnapshotStore>,
        db: Option<Arc<sqlx::PgPool>>,
    ) -> (EngineHandle, tokio::task::JoinHandle<EngineExit>) {
        let state = RaceState::new(race_id, track_id, total_laps, config.max_participants);
        let (mailbox_tx, mailbox_rx) = mpsc::channel(64);
        let (state_tx, state_rx) = watch::channel(state.clone());
        let shutdown = Arc::new(Notify::new());

        let engine = RaceEngine {
            state,
            runtimes: HashMap::new(),
            cars,
            tracks,
            config,
            broadcast,
            snapshots,
            state_tx,
            db,
        };

        let join = tokio::spawn(engine.run(mailbox_rx, shutdown.clone()));

        (
            EngineHandle {
                mailbox: mailbox_tx,
                state: state_rx,
                shutdown,
            },
            join,
        )
    }

    #[instrument(skip_all, fields(race_id = %self.state.race_id))]
    async fn run(mut self, mut mailbox: mpsc::Receiver<EngineCommand>, shutdown: Arc<Notify>) -> EngineExit {
        let mut ticker = tokio::time::interval(self.config.tick_period());
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown.notified() => {
                    info!("engine shut down on external signal");
                    self.publish_shutdown_error();
                    return EngineExit::Normal;
                }
                maybe_cmd = mailbox.recv() => {
                    match maybe_cmd {
                        Some(EngineCommand::Shutdown) | None => {
                            self.publish_shutdown_error();
                            return EngineExit::Normal;
                        }
                        Some(cmd) => self.handle_command(cmd),
                    }
                }
                _ = ticker.tick(), if self.state.status == RaceStatus::Active => {
                    match std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| self.tick())) {
                        Ok(()) => {
                            if self.state.status == RaceStatus::Finished {
                                return EngineExit::Normal;
                            }
                        }
                        Err(payload) => {
                            let reason = panic_message(&payload);
                            warn!(%reason, "race engine tick panicked; persisting best-effort snapshot before exit");
                            let _ = self.snapshots.force_snapshot(&self.state);
                            self.publish_shutdown_error();
                            return EngineExit::Panicked;
                        }
                    }
                }
            }
        }
    }

    fn handle_command(&mut self, cmd: EngineCommand) {
        match cmd {
            EngineCommand::AddParticipant { player_id, car_id, reply } => {
                let result = self.add_participant(player_id, car_id);
                let _ = reply.send(result);
            }
            EngineCommand::RemoveParticipant { player_id } => self.remove_participant(player_id),
            EngineCommand::SubmitCommand { player_id, text, reply } => {
                let result = self.submit_command(player_id, &text);
                let _ = reply.send(result);
            }
            EngineCommand::Start { reply } => {
                let result = self.start();
                let _ = reply.send(result);
            }
            EngineCommand::Stop => self.finish(),
            EngineCommand::Recover { state } => self.recover(state),
            EngineCommand::Shutdown => unreachable!("handled in run()"),
        }
    }

    fn add_participant(&mut self, player_id: Uuid, car_id: Uuid) -> Result<(), LifecycleError> {
        if self.state.status != RaceStatus::Waiting {
            return Err(LifecycleError::RaceAlreadyStarted);
        }
        if self.state.participants.len() >= self.state.max_participants {
            return Err(LifecycleError::CapacityExceeded);
        }
        if self.cars.get(car_id).is_none() {
            return Err(LifecycleError::CarNotAvailable(car_id.to_string()));
        }
        let position = self.state.participants.len() as u32 + 1;
        self.state.participants.push(Participant::new(self.state.race_id, player_id, car_id, position));
        self.runtimes.insert(
            player_id,
            PlayerRuntime {
                queue: PlayerQueue::new(player_id, self.config.max_queue_size, self.config.max_commands_per_second),
            },
        );
        Ok(())
    }

    /// Leaving during `active` compacts positions; an empty remainder stops
    /// the race with `race_finish` (§4.4).
    fn remove_participant(&mut self, player_id: Uuid) {
        self.state.participants.retain(|p| p.player_id != player_id);
        self.runtimes.remove(&player_id);
        self.reassign_positions();
        if self.state.status == RaceStatus::Active && self.state.participants.is_empty() {
            self.finish();
        }
    }

    fn submit_command(&mut self, player_id: Uuid, text: &str) -> Result<(), ServerError> {
        let command = parse(text).map_err(ServerError::Command)?;
        let runtime = self
            .runtimes
            .get_mut(&player_id)
            .ok_or_else(|| ServerError::Lifecycle(LifecycleError::RaceNotFound(player_id.to_string())))?;
        runtime.queue.enqueue(command, Instant::now()).map_err(ServerError::Command)?;
        Ok(())
    }

    fn start(&mut self) -> Result<(), LifecycleError> {
        if self.state.status != RaceStatus::Waiting {
            return Err(LifecycleError::RaceAlreadyStarted);
        }
        if self.state.participants.is_empty() {
            return Err(LifecycleError::CapacityExceeded);
        }
        self.state.status = RaceStatus::Active;
        self.state.started_at = Some(chrono::Utc::now());
        self.state.push_event(RaceEvent::new(
            self.state.race_id,
            self.state.tick_count,
            EventType::RaceStart,
            self.state.participants.iter().map(|p| p.player_id).collect(),
            EventPayload::RaceStart,
        ));
        self.broadcast.publish(self.state.race_id, ServerMessage::Started { race_id: self.state.race_id });
        self.publish_state();
        self.persist_status("active");
        Ok(())
    }

    fn recover(&mut self, state: RaceState) {
        info!(tick_count = state.tick_count, "engine reseeded from recovery coordinator");
        self.runtimes.clear();
        for p in &state.participants {
            self.runtimes.insert(
                p.player_id,
                PlayerRuntime {
                    queue: PlayerQueue::new(p.player_id, self.config.max_queue_size, self.config.max_commands_per_second),
                },
            );
        }
        self.state = state;
        self.broadcast.publish(
            self.state.race_id,
            ServerMessage::Recovered { message: "race state recovered".into(), state: self.state.clone() },
        );
        self.publish_state();
    }

    /// One simulation step, per §4.4's eight-step sequence.
    fn tick(&mut self) {
        let dt = self.config.tick_period().as_secs_f32();
        let previous_positions: HashMap<Uuid, u32> =
            self.state.participants.iter().map(|p| (p.player_id, p.position)).collect();

        let Some(track) = self.tracks.get(self.state.track_id).cloned() else {
            warn!(track_id = %self.state.track_id, "track missing from catalog; skipping tick");
            return;
        };
        let environment = Environment::dry();

        let mut pit_notices = Vec::new();
        for i in 0..self.state.participants.len() {
            let player_id = self.state.participants[i].player_id;
            let car_id = self.state.participants[i].car_id;
            let Some(car) = self.cars.get(car_id).cloned() else { continue };

            let command = self
                .runtimes
                .get_mut(&player_id)
                .and_then(|rt| rt.queue.dequeue())
                .map(|q| q.command)
                .unwrap_or(Command::Coast);

            let is_pit = matches!(command, Command::Pit);
            let fuel_before = self.state.participants[i].fuel_pct;
            let tire_before = self.state.participants[i].tire_wear;

            let (next, local) = physics::step(&self.state.participants[i], &car, command, &track, dt, environment);
            self.state.participants[i] = next;

            if let Some(lap) = local.lap_completed {
                let lap_time = local.lap_time_sec.unwrap_or(0.0);
                self.state.push_event(RaceEvent::new(
                    self.state.race_id,
                    self.state.tick_count,
                    EventType::LapComplete,
                    vec![player_id],
                    EventPayload::LapComplete { player_id, lap, lap_time_sec: lap_time },
                ));
            }
            for incident in physics::incident_events(self.state.race_id, self.state.tick_count, player_id, &local) {
                self.state.push_event(incident);
            }

            if is_pit {
                if let Some(notice) = self.apply_pit_stop(i, fuel_before, tire_before) {
                    pit_notices.push(notice);
                }
            }
        }

        self.reassign_positions();
        self.emit_overtakes(&previous_positions);

        for notice in pit_notices {
            self.state.push_event(RaceEvent::new(
                self.state.race_id,
                self.state.tick_count,
                EventType::PitStop,
                vec![notice.player_id],
                EventPayload::PitStop {
                    player_id: notice.player_id,
                    actions: notice.actions.clone(),
                    duration_ms: notice.duration_ms,
                },
            ));
            self.broadcast.publish(self.state.race_id, ServerMessage::PitStop(notice));
        }

        self.state.race_time_sec += dt;
        self.state.tick_count += 1;

        if self.completion_reached() {
            self.finish();
            return;
        }

        self.publish_state();
        if let Some(snapshot) = self.snapshots.maybe_snapshot(&self.state, Instant::now()) {
            info!(snapshot_id = %snapshot.id, "snapshot recorded");
        }
    }

    /// Pit-stop cost formula from §8 scenario 3: `3000 + (100-fuelBefore)*50`
    /// if refueled, plus a flat `2500` if tires were changed. Resets the
    /// triggering fields to their post-service values.
    fn apply_pit_stop(&mut self, index: usize, fuel_before: f32, tire_before: crate::race::state::TireWear) -> Option<PitStopNotice> {
        let mut actions = Vec::new();
        let mut duration_ms = 0u64;

        if fuel_before < 100.0 {
            actions.push(PitAction::Refuel);
            duration_ms += 3000 + ((100.0 - fuel_before) * 50.0) as u64;
            self.state.participants[index].fuel_pct = 100.0;
        }
        if tire_before.front.max(tire_before.rear) > 30.0 {
            actions.push(PitAction::TireChange);
            duration_ms += 2500;
            self.state.participants[index].tire_wear = crate::race::state::TireWear::default();
        }
        if actions.is_empty() {
            return None;
        }
        Some(PitStopNotice { player_id: self.state.participants[index].player_id, actions, duration_ms })
    }

    /// Dense 1..N reassignment by `(lap desc, distanceMeters desc, playerId asc)`.
    fn reassign_positions(&mut self) {
        let mut order: Vec<usize> = (0..self.state.participants.len()).collect();
        order.sort_by(|&a, &b| {
            let pa = &self.state.participants[a];
            let pb = &self.state.participants[b];
            pb.location
                .lap
                .cmp(&pa.location.lap)
                .then(pb.location.distance_meters.total_cmp(&pa.location.distance_meters))
                .then(pa.player_id.cmp(&pb.player_id))
        });
        for (rank, &idx) in order.iter().enumerate() {
            self.state.participants[idx].position = rank as u32 + 1;
        }
    }

    fn emit_overtakes(&mut self, previous: &HashMap<Uuid, u32>) {
        let mut current: Vec<(Uuid, u32)> =
            self.state.participants.iter().map(|p| (p.player_id, p.position)).collect();
        current.sort_by_key(|&(_, pos)| pos);

        for &(player_id, new_pos) in &current {
            let Some(&old_pos) = previous.get(&player_id) else { continue };
            if new_pos >= old_pos {
                continue;
            }
            let overtaken = current
                .iter()
                .find(|&&(other, pos)| other != player_id && pos == new_pos + 1 && previous.get(&other).copied().unwrap_or(pos) <= old_pos)
                .map(|&(other, _)| other);
            if let Some(overtaken) = overtaken {
                self.state.push_event(RaceEvent::new(
                    self.state.race_id,
                    self.state.tick_count,
                    EventType::Overtake,
                    vec![player_id, overtaken],
                    EventPayload::Overtake { overtaking: player_id, overtaken },
                ));
            }
        }
    }

    fn completion_reached(&self) -> bool {
        if self.state.participants.iter().any(|p| p.location.lap >= self.state.total_laps) {
            return true;
        }
        self.state.race_time_sec >= self.state.max_race_time_sec()
    }

    fn finish(&mut self) {
        if self.state.status == RaceStatus::Finished {
            return;
        }
        self.state.status = RaceStatus::Finished;
        self.state.ended_at = Some(chrono::Utc::now());

        let mut ordered = self.state.participants.clone();
        ordered.sort_by_key(|p| p.position);
        let results: Vec<FinishResult> = ordered
            .iter()
            .map(|p| FinishResult { player_id: p.player_id, position: p.position, total_time_sec: p.total_time_sec })
            .collect();

        self.state.push_event(RaceEvent::new(
            self.state.race_id,
            self.state.tick_count,
            EventType::RaceFinish,
            results.iter().map(|r| r.player_id).collect(),
            EventPayload::RaceFinish { results: results.clone() },
        ));
        self.broadcast.publish(
            self.state.race_id,
            ServerMessage::Completed { race_id: self.state.race_id, result: RaceResult { race_id: self.state.race_id, results } },
        );
        self.publish_state();
        let _ = self.snapshots.force_snapshot(&self.state);
        self.persist_results(&results);
    }

    /// Best-effort status transition write, mirroring `persist_results` below
    /// (§6's persisted-state schema; recovery's durable-store fallback tier
    /// reads this same table via `queries::list_participants`/`get_race`).
    fn persist_status(&self, status: &'static str) {
        let Some(pool) = self.db.clone() else { return };
        let race_id = self.state.race_id;
        tokio::spawn(async move {
            if let Err(err) = queries::update_race_status(&pool, race_id, status).await {
                warn!(%race_id, %err, "failed to persist race status (engine still runs in-memory)");
            }
        });
    }

    fn persist_results(&self, results: &[FinishResult]) {
        let Some(pool) = self.db.clone() else { return };
        let race_id = self.state.race_id;
        let Ok(results_json) = serde_json::to_value(results) else { return };
        tokio::spawn(async move {
            if let Err(err) = queries::save_race_results(&pool, race_id, results_json).await {
                warn!(%race_id, %err, "failed to persist race results (engine still runs in-memory)");
            }
        });
    }

    fn publish_state(&self) {
        let _ = self.state_tx.send(self.state.clone());
        self.broadcast.publish(self.state.race_id, ServerMessage::Update { full_race_state: self.state.clone() });
        for event in self.state.recent_events(1) {
            self.broadcast.publish(self.state.race_id, ServerMessage::Event { event: event.clone() });
        }
        self.snapshots.mirror_state(&self.state);
    }

    /// §5's shutdown sequence: one `SERVER_SHUTDOWN` error frame per
    /// participant, no further `race:update`.
    fn publish_shutdown_error(&self) {
        let frame = ServerError::ServerShutdown.to_frame();
        self.broadcast.publish(self.state.race_id, ServerMessage::Error(frame));
    }
}

/// Best-effort extraction of a panic payload's message, for the warn log
/// emitted when a tick panics (§7).
fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::NullCache;
    use crate::connection::ConnectionRegistry;
    use crate::models::{Car, Drivetrain, Surface, Track, TrackPoint};
    use crate::race::state::Location;

    fn test_car() -> Car {
        Car {
            id: Uuid::new_v4(),
            name: "Test Car".into(),
            horsepower: 400.0,
            weight_kg: 1200.0,
            drag_coef: 0.32,
            frontal_area_m2: 2.0,
            drivetrain: Drivetrain::Rwd,
            tire_grip: 1.2,
            gear_ratios: vec![3.0, 2.0, 1.5, 1.0],
            aero_downforce_kg_at_100mph: 50.0,
            fuel_economy_l100: 10.0,
            top_speed_kmh: 300.0,
        }
    }

    fn test_track() -> Track {
        Track {
            id: Uuid::new_v4(),
            name: "Test Oval".into(),
            length_m: 1000.0,
            sectors: 2,
            corners: 2,
            elevation_change_m: 0.0,
            surface: Surface::Asphalt,
            difficulty: 0.2,
            sampled_curvature: vec![TrackPoint { x: 0.0, y: 0.0, curvature: 0.0 }],
        }
    }

    fn test_engine(total_laps: u32, car: Car, track: Track) -> RaceEngine {
        let race_id = Uuid::new_v4();
        let config = Arc::new(Config::from_env());
        let cars = Arc::new(CarCatalog::new(vec![car.clone()]));
        let tracks = Arc::new(TrackCatalog::new(vec![track.clone()]));
        let connections = Arc::new(ConnectionRegistry::new());
        let broadcast = Arc::new(BroadcastDispatcher::new(connections));
        let snapshots = Arc::new(SnapshotStore::new(config.max_snapshots_per_race, config.snapshot_period, Arc::new(NullCache)));
        let state = RaceState::new(race_id, track.id, total_laps, config.max_participants);
        let (state_tx, _state_rx) = watch::channel(state.clone());

        RaceEngine { state, runtimes: HashMap::new(), cars, tracks, config, broadcast, snapshots, state_tx, db: None }
    }

    #[test]
    fn add_participant_rejects_unknown_car() {
        let mut engine = test_engine(3, test_car(), test_track());
        let result = engine.add_participant(Uuid::new_v4(), Uuid::new_v4());
        assert!(matches!(result, Err(LifecycleError::CarNotAvailable(_))));
    }

    #[test]
    fn add_participant_rejects_after_start() {
        let car = test_car();
        let mut engine = test_engine(3, car.clone(), test_track());
        engine.add_participant(Uuid::new_v4(), car.id).unwrap();
        engine.start().unwrap();
        let result = engine.add_participant(Uuid::new_v4(), car.id);
        assert!(matches!(result, Err(LifecycleError::RaceAlreadyStarted)));
    }

    #[test]
    fn start_rejects_empty_grid() {
        let mut engine = test_engine(3, test_car(), test_track());
        let result = engine.start();
        assert!(matches!(result, Err(LifecycleError::CapacityExceeded)));
    }

    #[test]
    fn tick_advances_distance_and_publishes_state() {
        let car = test_car();
        let mut engine = test_engine(3, car.clone(), test_track());
        let player_id = Uuid::new_v4();
        engine.add_participant(player_id, car.id).unwrap();
        engine.start().unwrap();

        engine.submit_command(player_id, "accelerate 1.0").unwrap();
        engine.tick();

        let participant = engine.state.participant(player_id).unwrap();
        assert!(participant.location.distance_meters > 0.0);
        assert_eq!(engine.state.tick_count, 1);
    }

    #[test]
    fn pit_stop_refuels_and_changes_tires_when_due() {
        let car = test_car();
        let mut engine = test_engine(3, car.clone(), test_track());
        engine.state.participants.push(Participant::new(engine.state.race_id, Uuid::new_v4(), car.id, 1));
        let tire_before = crate::race::state::TireWear { front: 40.0, rear: 35.0 };
        engine.state.participants[0].fuel_pct = 40.0;
        engine.state.participants[0].tire_wear = tire_before;

        let notice = engine.apply_pit_stop(0, 40.0, tire_before).expect("pit stop should have been serviced");

        assert_eq!(notice.actions.len(), 2);
        assert_eq!(notice.duration_ms, 3000 + (60.0 * 50.0) as u64 + 2500);
        assert_eq!(engine.state.participants[0].fuel_pct, 100.0);
        assert_eq!(engine.state.participants[0].tire_wear, crate::race::state::TireWear::default());
    }

    #[test]
    fn pit_stop_is_a_no_op_when_nothing_is_due() {
        let car = test_car();
        let mut engine = test_engine(3, car.clone(), test_track());
        engine.state.participants.push(Participant::new(engine.state.race_id, Uuid::new_v4(), car.id, 1));
        engine.state.participants[0].fuel_pct = 100.0;

        let notice = engine.apply_pit_stop(0, 100.0, crate::race::state::TireWear::default());
        assert!(notice.is_none());
    }

    #[test]
    fn reassign_positions_orders_by_lap_then_distance_then_player_id() {
        let car = test_car();
        let mut engine = test_engine(3, car.clone(), test_track());
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let (low, high) = if a < b { (a, b) } else { (b, a) };

        let mut p1 = Participant::new(engine.state.race_id, low, car.id, 1);
        p1.location = Location { lap: 1, sector: 0, distance_meters: 200.0 };
        let mut p2 = Participant::new(engine.state.race_id, high, car.id, 2);
        p2.location = Location { lap: 2, sector: 0, distance_meters: 10.0 };
        engine.state.participants = vec![p1, p2];

        engine.reassign_positions();

        assert_eq!(engine.state.participant(high).unwrap().position, 1);
        assert_eq!(engine.state.participant(low).unwrap().position, 2);
    }

    #[test]
    fn remove_participant_during_active_race_finishes_when_grid_empties() {
        let car = test_car();
        let mut engine = test_engine(3, car.clone(), test_track());
        let player_id = Uuid::new_v4();
        engine.add_participant(player_id, car.id).unwrap();
        engine.start().unwrap();

        engine.remove_participant(player_id);

        assert_eq!(engine.state.status, RaceStatus::Finished);
    }

    #[test]
    fn completion_reached_when_leader_hits_total_laps() {
        let car = test_car();
        let mut engine = test_engine(2, car.clone(), test_track());
        let mut p = Participant::new(engine.state.race_id, Uuid::new_v4(), car.id, 1);
        p.location.lap = 2;
        engine.state.participants.push(p);
        assert!(engine.completion_reached());
    }
}
