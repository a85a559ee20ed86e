use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use dashmap::DashMap;
use tracing::{info, warn};
use uuid::Uuid;

use crate::broadcast::BroadcastDispatcher;
use crate::config::Config;
use crate::error::LifecycleError;
use crate::models::{CarCatalog, TrackCatalog};
use crate::race::engine::{EngineExit, EngineHandle, RaceEngine};
use crate::race::state::RaceStatus;
use crate::recovery::{RecoveryCoordinator, RecoveryOutcome};
use crate::snapshot::SnapshotStore;

/// Maps `raceId → engine` (C6, §4.5). Grounded in shape on the reference
/// server's `Database`-backed race lookup, replacing a row fetch with an
/// in-memory handle to a live, independently-ticking engine.
pub struct RaceRegistry {
    engines: DashMap<Uuid, EngineHandle>,
    sequence: AtomicU64,
    cars: Arc<CarCatalog>,
    tracks: Arc<TrackCatalog>,
    config: Arc<Config>,
    broadcast: Arc<BroadcastDispatcher>,
    snapshots: Arc<SnapshotStore>,
    recovery: Arc<RecoveryCoordinator>,
    db: Option<Arc<sqlx::PgPool>>,
    self_ref: Weak<RaceRegistry>,
}

impl RaceRegistry {
    pub fn new(
        cars: Arc<CarCatalog>,
        tracks: Arc<TrackCatalog>,
        config: Arc<Config>,
        broadcast: Arc<BroadcastDispatcher>,
        snapshots: Arc<SnapshotStore>,
        recovery: Arc<RecoveryCoordinator>,
        db: Option<Arc<sqlx::PgPool>>,
    ) -> Arc<Self> {
        Arc::new_cyclic(|self_ref| RaceRegistry {
            engines: DashMap::new(),
            sequence: AtomicU64::new(1),
            cars,
            tracks,
            config,
            broadcast,
            snapshots,
            recovery,
            db,
            self_ref: self_ref.clone(),
        })
    }

    /// Race ids combine a monotonic sequence with a random suffix so they
    /// sort roughly by creation order while remaining unguessable, per §4.5.
    fn next_race_id(&self) -> Uuid {
        let seq = self.sequence.fetch_add(1, Ordering::Relaxed);
        let mut bytes = uuid::Uuid::new_v4().into_bytes();
        bytes[0..8].copy_from_slice(&seq.to_be_bytes());
        Uuid::from_bytes(bytes)
    }

    pub fn create(&self, track_id: Uuid, total_laps: u32) -> Uuid {
        let race_id = self.next_race_id();
        let (handle, join) = RaceEngine::spawn(
            race_id,
            track_id,
            total_laps,
            self.cars.clone(),
            self.tracks.clone(),
            self.config.clone(),
            self.broadcast.clone(),
            self.snapshots.clone(),
            self.db.clone(),
        );
        self.engines.insert(race_id, handle);
        self.supervise(race_id, track_id, total_laps, join);
        info!(%race_id, %track_id, total_laps, "race created");
        race_id
    }

    /// Awaits the engine task's `JoinHandle` on a separate task and invokes
    /// `recover_abnormal_termination` on a panic or an unexplained task exit,
    /// per §7's "unexpected panics in tick... recovery then decides whether
    /// to restart the race". A clean `Shutdown`/race-finish exit (`Normal`)
    /// is left alone — `remove`/the caller already handles that path.
    fn supervise(&self, race_id: Uuid, track_id: Uuid, total_laps: u32, join: tokio::task::JoinHandle<EngineExit>) {
        let Some(registry) = self.self_ref.upgrade() else { return };
        tokio::spawn(async move {
            let abnormal = !matches!(join.await, Ok(EngineExit::Normal));
            if abnormal {
                registry.recover_abnormal_termination(race_id, track_id, total_laps).await;
            }
        });
    }

    pub fn get(&self, race_id: Uuid) -> Option<EngineHandle> {
        self.engines.get(&race_id).map(|e| e.clone())
    }

    pub fn list_active(&self) -> Vec<Uuid> {
        self.engines
            .iter()
            .filter(|e| e.state.borrow().status == RaceStatus::Active)
            .map(|e| *e.key())
            .collect()
    }

    pub async fn stop(&self, race_id: Uuid) -> Result<(), LifecycleError> {
        let handle = self.get(race_id).ok_or_else(|| LifecycleError::RaceNotFound(race_id.to_string()))?;
        let _ = handle.mailbox.send(crate::race::engine::EngineCommand::Stop).await;
        Ok(())
    }

    /// Called when an engine's handle is found unresponsive (mailbox closed
    /// without a clean `Shutdown`/`Stop`). Signals the recovery coordinator
    /// and, on success, respawns a fresh engine seeded with the recovered
    /// state, replacing the dead handle in place (§4.5, §4.7).
    pub async fn recover_abnormal_termination(&self, race_id: Uuid, track_id: Uuid, total_laps: u32) {
        warn!(%race_id, "race engine terminated abnormally; invoking recovery coordinator");
        match self.recovery.recover(race_id).await {
            RecoveryOutcome::Recovered(state) | RecoveryOutcome::Fallback(state) => {
                let (handle, join) = RaceEngine::spawn(
                    race_id,
                    track_id,
                    total_laps,
                    self.cars.clone(),
                    self.tracks.clone(),
                    self.config.clone(),
                    self.broadcast.clone(),
                    self.snapshots.clone(),
                    self.db.clone(),
                );
                let _ = handle.mailbox.send(crate::race::engine::EngineCommand::Recover { state }).await;
                self.engines.insert(race_id, handle);
                self.supervise(race_id, track_id, total_laps, join);
            }
            RecoveryOutcome::Failed(reason) => {
                warn!(%race_id, %reason, "recovery failed; race will not be restarted");
            }
        }
    }

    /// Removes the engine's handle. Deferred until the caller has confirmed
    /// `SnapshotStore::cleanup` has already run for this race (§4.5).
    pub fn remove(&self, race_id: Uuid) {
        self.engines.remove(&race_id);
        self.snapshots.cleanup(race_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::NullCache;
    use crate::connection::ConnectionRegistry;
    use crate::models::{Car, Drivetrain, Surface, Track, TrackPoint};

    fn test_registry() -> Arc<RaceRegistry> {
        let config = Arc::new(Config::from_env());
        let car = Car {
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
        };
        let track = Track {
            id: Uuid::new_v4(),
            name: "Test Oval".into(),
            length_m: 1000.0,
            sectors: 2,
            corners: 2,
            elevation_change_m: 0.0,
            surface: Surface::Asphalt,
            difficulty: 0.2,
            sampled_curvature: vec![TrackPoint { x: 0.0, y: 0.0, curvature: 0.0 }],
        };
        let cars = Arc::new(CarCatalog::new(vec![car]));
        let tracks = Arc::new(TrackCatalog::new(vec![track]));
        let connections = Arc::new(ConnectionRegistry::new());
        let broadcast = Arc::new(BroadcastDispatcher::new(connections));
        let cache = Arc::new(NullCache);
        let snapshots = Arc::new(SnapshotStore::new(config.max_snapshots_per_race, config.snapshot_period, cache));
        let recovery = Arc::new(RecoveryCoordinator::new(snapshots.clone(), None));
        RaceRegistry::new(cars, tracks, config, broadcast, snapshots, recovery, None)
    }

    #[tokio::test]
    async fn create_then_get_returns_the_same_engine() {
        let registry = test_registry();
        let race_id = registry.create(Uuid::nil(), 5);
        assert!(registry.get(race_id).is_some());
    }

    #[tokio::test]
    async fn unknown_race_id_returns_none() {
        let registry = test_registry();
        assert!(registry.get(Uuid::new_v4()).is_none());
    }

    #[tokio::test]
    async fn list_active_excludes_races_still_waiting() {
        let registry = test_registry();
        let race_id = registry.create(Uuid::nil(), 5);
        assert!(!registry.list_active().contains(&race_id));
    }

    #[tokio::test]
    async fn next_race_id_increases_with_each_call() {
        let registry = test_registry();
        let first = registry.next_race_id();
        let second = registry.next_race_id();
        assert!(first.as_bytes()[0..8] < second.as_bytes()[0..8]);
    }

    #[tokio::test]
    async fn recovering_without_a_snapshot_or_durable_store_leaves_the_race_absent() {
        let registry = test_registry();
        let race_id = Uuid::new_v4();
        registry.recover_abnormal_termination(race_id, Uuid::nil(), 5).await;
        assert!(registry.get(race_id).is_none());
    }
}
