use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::cache::Cache;
use crate::error::StateError;
use crate::race::state::RaceState;

/// {id, raceId, tickTime, wallTime, state, checksum} (§3). `checksum` covers
/// a canonical subset only — see `checksum_of`.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Snapshot {
    pub id: Uuid,
    pub race_id: Uuid,
    pub tick_time: u64,
    pub wall_time: DateTime<Utc>,
    pub state: RaceState,
    pub checksum: u64,
}

/// Canonical checksum input, exactly as named in §9's "ad-hoc checksum" note:
/// raceId, currentLap (the leader's), raceTime, participant count, and each
/// participant's (playerId, position, totalTime) in position order. FNV-1a
/// over this canonical byte form so the value is stable across processes and
/// platforms, unlike hashing an arbitrary JSON rendering.
pub fn checksum_of(state: &RaceState) -> u64 {
    let mut bytes = Vec::new();
    bytes.extend_from_slice(state.race_id.as_bytes());
    let current_lap = state.participants.iter().map(|p| p.location.lap).max().unwrap_or(0);
    bytes.extend_from_slice(&current_lap.to_le_bytes());
    bytes.extend_from_slice(&state.race_time_sec.to_bits().to_le_bytes());
    bytes.extend_from_slice(&(state.participants.len() as u32).to_le_bytes());

    let mut ordered: Vec<&crate::race::state::Participant> = state.participants.iter().collect();
    ordered.sort_by_key(|p| p.position);
    for p in ordered {
        bytes.extend_from_slice(p.player_id.as_bytes());
        bytes.extend_from_slice(&p.position.to_le_bytes());
        bytes.extend_from_slice(&p.total_time_sec.to_bits().to_le_bytes());
    }

    fnv1a(&bytes)
}

fn fnv1a(bytes: &[u8]) -> u64 {
    const OFFSET: u64 = 0xcbf29ce484222325;
    const PRIME: u64 = 0x100000001b3;
    let mut hash = OFFSET;
    for &b in bytes {
        hash ^= b as u64;
        hash = hash.wrapping_mul(PRIME);
    }
    hash
}

/// Validates structural invariants from §4.6: every participant position is
/// at least 1, player/car ids are non-nil, and the stored race id matches.
pub fn validate(snapshot: &Snapshot) -> Result<(), StateError> {
    if checksum_of(&snapshot.state) != snapshot.checksum {
        return Err(StateError::SnapshotInvalid("checksum mismatch".into()));
    }
    if snapshot.state.race_id != snapshot.race_id {
        return Err(StateError::SnapshotInvalid("race id mismatch".into()));
    }
    for p in &snapshot.state.participants {
        if p.position < 1 {
            return Err(StateError::SnapshotInvalid("position below 1".into()));
        }
        if p.player_id.is_nil() || p.car_id.is_nil() {
            return Err(StateError::SnapshotInvalid("nil player/car id".into()));
        }
    }
    Ok(())
}

struct RaceSnapshots {
    ordered: VecDeque<Snapshot>,
    last_snapshot_at: Instant,
}

/// Periodic snapshots keyed by race, validated on read (C7, §4.6). The
/// ordered, capped in-memory list is the primary read path; the `Cache`
/// mirror is best-effort (§5: "persistence ... may be dropped under
/// pressure").
pub struct SnapshotStore {
    per_race: DashMap<Uuid, Mutex<RaceSnapshots>>,
    max_per_race: usize,
    period: Duration,
    cache: Arc<dyn Cache>,
}

impl SnapshotStore {
    pub fn new(max_per_race: usize, period: Duration, cache: Arc<dyn Cache>) -> Self {
        SnapshotStore {
            per_race: DashMap::new(),
            max_per_race,
            period,
            cache,
        }
    }

    /// Called once per tick by the engine; records a snapshot only if
    /// `period` has elapsed since the last one for this race.
    pub fn maybe_snapshot(&self, state: &RaceState, now: Instant) -> Option<Snapshot> {
        let mut entry = self
            .per_race
            .entry(state.race_id)
            .or_insert_with(|| Mutex::new(RaceSnapshots { ordered: VecDeque::new(), last_snapshot_at: now - self.period }));
        let mut guard = entry.value_mut().lock();
        if now.duration_since(guard.last_snapshot_at) < self.period {
            return None;
        }
        guard.last_snapshot_at = now;
        let snapshot = self.build(state);

        guard.ordered.push_back(snapshot.clone());
        while guard.ordered.len() > self.max_per_race {
            guard.ordered.pop_front();
        }
        drop(guard);

        self.mirror_to_cache(&snapshot);
        Some(snapshot)
    }

    /// Forces a snapshot regardless of the period (used for best-effort
    /// persistence ahead of an engine-panic shutdown, §7).
    pub fn force_snapshot(&self, state: &RaceState) -> Snapshot {
        let snapshot = self.build(state);
        let entry = self
            .per_race
            .entry(state.race_id)
            .or_insert_with(|| Mutex::new(RaceSnapshots { ordered: VecDeque::new(), last_snapshot_at: Instant::now() }));
        let mut guard = entry.value().lock();
        guard.ordered.push_back(snapshot.clone());
        while guard.ordered.len() > self.max_per_race {
            guard.ordered.pop_front();
        }
        drop(guard);
        self.mirror_to_cache(&snapshot);
        snapshot
    }

    fn build(&self, state: &RaceState) -> Snapshot {
        Snapshot {
            id: Uuid::new_v4(),
            race_id: state.race_id,
            tick_time: state.tick_count,
            wall_time: Utc::now(),
            state: state.clone(),
            checksum: checksum_of(state),
        }
    }

    fn mirror_to_cache(&self, snapshot: &Snapshot) {
        let cache = self.cache.clone();
        let ids = self.list_ids_newest_first(snapshot.race_id);
        let snapshot = snapshot.clone();
        tokio::spawn(async move {
            let Ok(bytes) = serde_json::to_vec(&snapshot) else { return };
            let key = format!("race_snapshot:{}:{}", snapshot.race_id, snapshot.id);
            if let Err(err) = cache.set_with_ttl(&key, &bytes, Duration::from_secs(3600)).await {
                debug!(%err, "cache mirror of snapshot failed (best effort)");
            }

            let Ok(ids_bytes) = serde_json::to_vec(&ids) else { return };
            let list_key = format!("race_snapshots:{}", snapshot.race_id);
            if let Err(err) = cache.set_with_ttl(&list_key, &ids_bytes, Duration::from_secs(3600)).await {
                debug!(%err, "cache mirror of snapshot id list failed (best effort)");
            }
        });
    }

    /// Mirrors the race's latest published state into the cache under
    /// `race_state:{raceId}` (§6), best-effort like the snapshot mirror
    /// above. Called once per tick alongside the `watch` channel publish.
    pub fn mirror_state(&self, state: &RaceState) {
        let cache = self.cache.clone();
        let state = state.clone();
        tokio::spawn(async move {
            let Ok(bytes) = serde_json::to_vec(&state) else { return };
            let key = format!("race_state:{}", state.race_id);
            if let Err(err) = cache.set_with_ttl(&key, &bytes, Duration::from_secs(3600)).await {
                debug!(%err, "cache mirror of race state failed (best effort)");
            }
        });
    }

    /// Newest-to-oldest snapshot ids for a race, for the recovery coordinator.
    pub fn list_ids_newest_first(&self, race_id: Uuid) -> Vec<Uuid> {
        self.per_race
            .get(&race_id)
            .map(|e| e.lock().ordered.iter().rev().map(|s| s.id).collect())
            .unwrap_or_default()
    }

    /// Fetches `id` (or the most recent if `None`), validates it, and
    /// returns it only if valid; an invalid snapshot is logged and skipped,
    /// never returned (§4.6).
    pub fn get_validated(&self, race_id: Uuid, id: Option<Uuid>) -> Option<Snapshot> {
        let entry = self.per_race.get(&race_id)?;
        let guard = entry.lock();
        let candidate = match id {
            Some(id) => guard.ordered.iter().find(|s| s.id == id).cloned(),
            None => guard.ordered.back().cloned(),
        };
        drop(guard);
        let candidate = candidate?;
        match validate(&candidate) {
            Ok(()) => Some(candidate),
            Err(err) => {
                warn!(%race_id, snapshot_id = %candidate.id, %err, "skipping invalid snapshot");
                None
            }
        }
    }

    /// Removes all snapshots and the index list for a finished race (§4.6).
    pub fn cleanup(&self, race_id: Uuid) {
        self.per_race.remove(&race_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::NullCache;
    use crate::race::state::RaceState;

    fn store() -> SnapshotStore {
        SnapshotStore::new(3, Duration::from_millis(10), Arc::new(NullCache))
    }

    #[test]
    fn checksum_round_trips_through_validation() {
        let state = RaceState::new(Uuid::new_v4(), Uuid::new_v4(), 3, 10);
        let snap = Snapshot {
            id: Uuid::new_v4(),
            race_id: state.race_id,
            tick_time: 0,
            wall_time: Utc::now(),
            checksum: checksum_of(&state),
            state,
        };
        assert!(validate(&snap).is_ok());
    }

    #[test]
    fn corrupted_checksum_is_rejected() {
        let state = RaceState::new(Uuid::new_v4(), Uuid::new_v4(), 3, 10);
        let mut snap = Snapshot {
            id: Uuid::new_v4(),
            race_id: state.race_id,
            tick_time: 0,
            wall_time: Utc::now(),
            checksum: checksum_of(&state),
            state,
        };
        snap.checksum ^= 1;
        assert!(validate(&snap).is_err());
    }

    #[test]
    fn retention_evicts_oldest_beyond_cap() {
        let store = store();
        let race_id = Uuid::new_v4();
        let mut now = Instant::now();
        let mut ids = Vec::new();
        for _ in 0..5 {
            let state = RaceState::new(race_id, Uuid::new_v4(), 3, 10);
            let snap = store.maybe_snapshot(&state, now).unwrap();
            ids.push(snap.id);
            now += Duration::from_millis(20);
        }
        assert_eq!(store.list_ids_newest_first(race_id).len(), 3);
        assert!(store.list_ids_newest_first(race_id).contains(&ids[4]));
        assert!(!store.list_ids_newest_first(race_id).contains(&ids[0]));
    }

    #[test]
    fn cleanup_removes_all_snapshots() {
        let store = store();
        let race_id = Uuid::new_v4();
        let state = RaceState::new(race_id, Uuid::new_v4(), 3, 10);
        store.maybe_snapshot(&state, Instant::now());
        store.cleanup(race_id);
        assert_eq!(store.list_ids_newest_first(race_id).len(), 0);
    }
}
