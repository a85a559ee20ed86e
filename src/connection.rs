use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::{DashMap, DashSet};
use tokio::sync::{mpsc, Notify};
use tracing::{debug, info};
use uuid::Uuid;

use crate::protocol::ServerMessage;

/// Bounded per-socket outbound buffer; exceeding it is the backpressure
/// policy's trigger (§4.9) rather than blocking the broadcaster.
pub const SOCKET_SEND_BUFFER: usize = 64;

pub struct SocketEntry {
    pub sender: mpsc::Sender<ServerMessage>,
    pub kill: Arc<Notify>,
    pub player_id: Option<Uuid>,
    pub race_id: Option<Uuid>,
    pub last_keepalive: Instant,
}

/// Sockets ↔ player ↔ race membership (C9, §4.8). Grounded in shape on
/// `f1-nexus-telemetry`'s `ClientConnection`/heartbeat tracking, which the
/// reference racing server's own `Clients` map lacks entirely.
pub struct ConnectionRegistry {
    sockets: DashMap<Uuid, SocketEntry>,
    by_player: DashMap<Uuid, Uuid>,
    by_race: DashMap<Uuid, DashSet<Uuid>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        ConnectionRegistry {
            sockets: DashMap::new(),
            by_player: DashMap::new(),
            by_race: DashMap::new(),
        }
    }

    pub fn register(&self) -> (Uuid, mpsc::Receiver<ServerMessage>, Arc<Notify>) {
        let socket_id = Uuid::new_v4();
        let (tx, rx) = mpsc::channel(SOCKET_SEND_BUFFER);
        let kill = Arc::new(Notify::new());
        self.sockets.insert(
            socket_id,
            SocketEntry {
                sender: tx,
                kill: kill.clone(),
                player_id: None,
                race_id: None,
                last_keepalive: Instant::now(),
            },
        );
        (socket_id, rx, kill)
    }

    /// Enforces the one-connection-per-player invariant: a prior socket for
    /// the same player is evicted (removed from every map and signaled to
    /// close) before the new one is recorded.
    pub fn authenticate(&self, socket_id: Uuid, player_id: Uuid) {
        if let Some(prev) = self.by_player.get(&player_id).map(|e| *e) {
            if prev != socket_id {
                info!(%player_id, old_socket = %prev, new_socket = %socket_id, "evicting prior connection on re-authentication");
                self.remove(prev);
            }
        }
        if let Some(mut entry) = self.sockets.get_mut(&socket_id) {
            entry.player_id = Some(player_id);
        }
        self.by_player.insert(player_id, socket_id);
    }

    pub fn join_race(&self, socket_id: Uuid, race_id: Uuid) {
        if let Some(mut entry) = self.sockets.get_mut(&socket_id) {
            entry.race_id = Some(race_id);
        }
        self.by_race.entry(race_id).or_insert_with(DashSet::new).insert(socket_id);
    }

    pub fn race_for_socket(&self, socket_id: Uuid) -> Option<Uuid> {
        self.sockets.get(&socket_id).and_then(|e| e.race_id)
    }

    pub fn leave_race(&self, socket_id: Uuid) {
        let race_id = self.sockets.get(&socket_id).and_then(|e| e.race_id);
        if let Some(race_id) = race_id {
            if let Some(set) = self.by_race.get(&race_id) {
                set.remove(&socket_id);
            }
        }
        if let Some(mut entry) = self.sockets.get_mut(&socket_id) {
            entry.race_id = None;
        }
    }

    pub fn touch_keepalive(&self, socket_id: Uuid) {
        if let Some(mut entry) = self.sockets.get_mut(&socket_id) {
            entry.last_keepalive = Instant::now();
        }
    }

    pub fn sockets_for_race(&self, race_id: Uuid) -> Vec<(Uuid, mpsc::Sender<ServerMessage>)> {
        self.by_race
            .get(&race_id)
            .map(|set| {
                set.iter()
                    .filter_map(|id| self.sockets.get(&id).map(|e| (*id, e.sender.clone())))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn remove(&self, socket_id: Uuid) {
        if let Some((_, entry)) = self.sockets.remove(&socket_id) {
            entry.kill.notify_waiters();
            if let Some(player_id) = entry.player_id {
                self.by_player.remove_if(&player_id, |_, v| *v == socket_id);
            }
            if let Some(race_id) = entry.race_id {
                if let Some(set) = self.by_race.get(&race_id) {
                    set.remove(&socket_id);
                }
            }
        }
    }

    pub fn socket_count(&self) -> usize {
        self.sockets.len()
    }

    /// Disconnects and removes any socket whose last keepalive predates
    /// `now - stale_after` (§4.8).
    pub fn cleanup_stale(&self, stale_after: Duration, now: Instant) -> Vec<Uuid> {
        let stale: Vec<Uuid> = self
            .sockets
            .iter()
            .filter(|entry| now.duration_since(entry.last_keepalive) >= stale_after)
            .map(|entry| *entry.key())
            .collect();
        for socket_id in &stale {
            debug!(%socket_id, "removing stale connection");
            self.remove(*socket_id);
        }
        stale
    }
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reauthentication_evicts_prior_socket() {
        let reg = ConnectionRegistry::new();
        let (a, _rx_a, _kill_a) = reg.register();
        let (b, _rx_b, _kill_b) = reg.register();
        let player = Uuid::new_v4();

        reg.authenticate(a, player);
        assert_eq!(reg.socket_count(), 2);

        reg.authenticate(b, player);
        assert_eq!(reg.socket_count(), 1, "socket A must be evicted");
    }

    #[test]
    fn stale_sockets_are_removed() {
        let reg = ConnectionRegistry::new();
        let (a, _rx, _kill) = reg.register();
        if let Some(mut entry) = reg.sockets.get_mut(&a) {
            entry.last_keepalive = Instant::now() - Duration::from_secs(300);
        }
        let removed = reg.cleanup_stale(Duration::from_secs(120), Instant::now());
        assert_eq!(removed, vec![a]);
        assert_eq!(reg.socket_count(), 0);
    }

    #[test]
    fn race_membership_tracks_join_and_leave() {
        let reg = ConnectionRegistry::new();
        let (a, _rx, _kill) = reg.register();
        let race = Uuid::new_v4();
        reg.join_race(a, race);
        assert_eq!(reg.sockets_for_race(race).len(), 1);
        reg.leave_race(a);
        assert_eq!(reg.sockets_for_race(race).len(), 0);
    }
}
