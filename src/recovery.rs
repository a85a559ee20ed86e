use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::broadcast;
use tracing::{info, warn};
use uuid::Uuid;

use crate::database::queries;
use crate::error::{LifecycleError, StateError};
use crate::race::state::{Participant, RaceState, RaceStatus};
use crate::snapshot::SnapshotStore;

/// Outcome of a recovery attempt (§4.7).
#[derive(Debug, Clone)]
pub enum RecoveryOutcome {
    Recovered(RaceState),
    Fallback(RaceState),
    Failed(String),
}

/// Chooses snapshot vs durable-store fallback and reseeds an engine (C8,
/// §4.7). Grounded in shape on the reference server's
/// `watchdog::RaceWatchdog::check_races`/`load_upcoming_race` reconciliation
/// against durable storage, generalized from a 60s scheduled poll into an
/// on-demand, de-duplicated recovery for one race id.
pub struct RecoveryCoordinator {
    snapshots: Arc<SnapshotStore>,
    db: Option<Arc<sqlx::PgPool>>,
    in_flight: Mutex<HashMap<Uuid, Arc<tokio::sync::Notify>>>,
    results: Mutex<HashMap<Uuid, RecoveryOutcome>>,
}

impl RecoveryCoordinator {
    pub fn new(snapshots: Arc<SnapshotStore>, db: Option<Arc<sqlx::PgPool>>) -> Self {
        RecoveryCoordinator {
            snapshots,
            db,
            in_flight: Mutex::new(HashMap::new()),
            results: Mutex::new(HashMap::new()),
        }
    }

    /// Idempotent: concurrent requests for the same `race_id` are
    /// de-duplicated to a single in-flight operation; late callers await the
    /// same result rather than re-running the tiering logic.
    pub async fn recover(&self, race_id: Uuid) -> RecoveryOutcome {
        let notify = {
            let mut guard = self.in_flight.lock();
            if let Some(existing) = guard.get(&race_id).cloned() {
                drop(guard);
                existing.notified().await;
                return self
                    .results
                    .lock()
                    .get(&race_id)
                    .cloned()
                    .unwrap_or(RecoveryOutcome::Failed("recovery result missing".into()));
            }
            let notify = Arc::new(tokio::sync::Notify::new());
            guard.insert(race_id, notify.clone());
            notify
        };

        let outcome = self.recover_uncoordinated(race_id).await;
        self.results.lock().insert(race_id, outcome.clone());
        self.in_flight.lock().remove(&race_id);
        notify.notify_waiters();
        outcome
    }

    async fn recover_uncoordinated(&self, race_id: Uuid) -> RecoveryOutcome {
        for id in self.snapshots.list_ids_newest_first(race_id) {
            if let Some(snapshot) = self.snapshots.get_validated(race_id, Some(id)) {
                info!(%race_id, snapshot_id = %id, "recovered race from snapshot");
                return RecoveryOutcome::Recovered(snapshot.state);
            }
        }

        match self.fallback_from_durable_store(race_id).await {
            Ok(Some(state)) => {
                warn!(%race_id, "no valid snapshot; reseeded from durable configuration fallback");
                RecoveryOutcome::Fallback(state)
            }
            Ok(None) => RecoveryOutcome::Failed(LifecycleError::RaceNotFound(race_id.to_string()).to_string()),
            Err(err) => RecoveryOutcome::Failed(StateError::RaceStateCorrupted(err).to_string()),
        }
    }

    async fn fallback_from_durable_store(&self, race_id: Uuid) -> Result<Option<RaceState>, String> {
        let Some(pool) = &self.db else {
            return Ok(None);
        };
        let Some(race) = queries::get_race(pool, race_id).await.map_err(|e| e.to_string())? else {
            return Ok(None);
        };
        let rows = queries::list_participants(pool, race_id).await.map_err(|e| e.to_string())?;

        let mut state = RaceState::new(race.id, race.track_id, race.total_laps as u32, 20);
        state.status = RaceStatus::Waiting;
        for (position, row) in rows.into_iter().enumerate() {
            let mut participant = Participant::new(race_id, row.player_id, row.car_id, position as u32 + 1);
            participant.fuel_pct = 100.0;
            state.participants.push(participant);
        }
        Ok(Some(state))
    }
}
