use std::sync::Arc;

use tracing::warn;
use uuid::Uuid;

use crate::connection::ConnectionRegistry;
use crate::protocol::ServerMessage;

/// Per-race fan-out with backpressure (C10, §4.9). Grounded in shape on the
/// reference server's `broadcast_state` loop over its `Clients` map,
/// enriched with the bounded-channel/lagged-receiver backpressure policy
/// `f1-nexus-telemetry`'s websocket server uses.
pub struct BroadcastDispatcher {
    connections: Arc<ConnectionRegistry>,
}

impl BroadcastDispatcher {
    pub fn new(connections: Arc<ConnectionRegistry>) -> Self {
        BroadcastDispatcher { connections }
    }

    /// Sends `message` to every socket currently in `race_id`'s membership
    /// set. Delivery is non-blocking: a socket whose bounded buffer is full
    /// is disconnected rather than allowed to slow the caller (the tick
    /// loop). Per-socket order is preserved; there is no cross-socket
    /// ordering guarantee.
    pub fn publish(&self, race_id: Uuid, message: ServerMessage) {
        for (socket_id, sender) in self.connections.sockets_for_race(race_id) {
            if let Err(err) = sender.try_send(message.clone()) {
                warn!(%socket_id, %race_id, "disconnecting socket on backpressure: {err}");
                self.connections.remove(socket_id);
            }
        }
    }

    pub fn send_to_socket(&self, socket_id: Uuid, sender: &tokio::sync::mpsc::Sender<ServerMessage>, message: ServerMessage) {
        if sender.try_send(message).is_err() {
            warn!(%socket_id, "disconnecting socket on backpressure");
            self.connections.remove(socket_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorFrame;
    use chrono::Utc;

    #[tokio::test]
    async fn delivers_to_every_socket_in_race() {
        let connections = Arc::new(ConnectionRegistry::new());
        let dispatcher = BroadcastDispatcher::new(connections.clone());
        let race_id = Uuid::new_v4();

        let (a, mut rx_a, _kill_a) = connections.register();
        let (b, mut rx_b, _kill_b) = connections.register();
        connections.join_race(a, race_id);
        connections.join_race(b, race_id);

        dispatcher.publish(
            race_id,
            ServerMessage::Error(ErrorFrame {
                code: "TEST".into(),
                message: "hi".into(),
                timestamp: Utc::now(),
            }),
        );

        assert!(rx_a.try_recv().is_ok());
        assert!(rx_b.try_recv().is_ok());
    }

    #[tokio::test]
    async fn overflowing_socket_is_disconnected() {
        let connections = Arc::new(ConnectionRegistry::new());
        let dispatcher = BroadcastDispatcher::new(connections.clone());
        let race_id = Uuid::new_v4();
        let (a, _rx, _kill) = connections.register(); // never drained
        connections.join_race(a, race_id);

        for _ in 0..(crate::connection::SOCKET_SEND_BUFFER + 5) {
            dispatcher.publish(
                race_id,
                ServerMessage::CommandResult { success: true, message: None },
            );
        }

        assert_eq!(connections.sockets_for_race(race_id).len(), 0);
    }
}
