use std::collections::HashMap;

use tokio::sync::{mpsc, RwLock};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::protocol::ServerMessage;

/// Outcome of one broadcast fan-out
///
/// A failed channel never aborts delivery to the rest of the room; it is
/// recorded here and removed from the manager after the iteration.
#[derive(Debug, Default)]
pub struct DeliveryReport {
    /// Number of connections the message was handed to
    pub delivered: usize,
    /// Connections whose channel was already closed
    pub failed: Vec<String>,
}

/// Information about one connected client channel
pub struct ConnectionInfo {
    pub id: String,
    pub room_id: String,
    pub sender: mpsc::UnboundedSender<ServerMessage>,
}

/// Tracks the set of live client channels per room and fans events out
/// to them
///
/// Owns every channel for its lifetime; registration and removal go
/// through the same locks as broadcast snapshotting, so the per-room set
/// never mutates under an in-flight iteration.
pub struct ConnectionManager {
    /// Map of connection ID to connection info
    connections: RwLock<HashMap<String, ConnectionInfo>>,
    /// Map of room ID to the IDs of its connections
    rooms: RwLock<HashMap<String, Vec<String>>>,
}

impl ConnectionManager {
    /// Create a new connection manager
    pub fn new() -> Self {
        Self {
            connections: RwLock::new(HashMap::new()),
            rooms: RwLock::new(HashMap::new()),
        }
    }

    /// Register a new channel under a room
    pub async fn register(
        &self,
        room_id: &str,
        sender: mpsc::UnboundedSender<ServerMessage>,
    ) -> String {
        let connection_id = Uuid::new_v4().to_string();
        let info = ConnectionInfo {
            id: connection_id.clone(),
            room_id: room_id.to_string(),
            sender,
        };

        self.connections
            .write()
            .await
            .insert(connection_id.clone(), info);
        self.rooms
            .write()
            .await
            .entry(room_id.to_string())
            .or_default()
            .push(connection_id.clone());

        info!("Connection {} joined room {}", connection_id, room_id);
        connection_id
    }

    /// Remove a channel, dropping its room entry when the room empties
    pub async fn unregister(&self, connection_id: &str) {
        let removed = self.connections.write().await.remove(connection_id);

        let Some(info) = removed else {
            debug!("Attempted to unregister unknown connection {}", connection_id);
            return;
        };

        let mut rooms = self.rooms.write().await;
        if let Some(ids) = rooms.get_mut(&info.room_id) {
            ids.retain(|id| id != connection_id);
            if ids.is_empty() {
                rooms.remove(&info.room_id);
            }
        }

        info!("Connection {} left room {}", connection_id, info.room_id);
    }

    /// Get the number of live connections in a room
    pub async fn count(&self, room_id: &str) -> usize {
        self.rooms
            .read()
            .await
            .get(room_id)
            .map(|ids| ids.len())
            .unwrap_or(0)
    }

    /// Get the total number of live connections across all rooms
    pub async fn total_connections(&self) -> usize {
        self.connections.read().await.len()
    }

    /// Send a message to one specific connection
    pub async fn send_to(&self, connection_id: &str, message: ServerMessage) {
        let connections = self.connections.read().await;
        if let Some(info) = connections.get(connection_id) {
            if info.sender.send(message).is_err() {
                warn!("Failed to send message to connection {}", connection_id);
            }
        }
    }

    /// Broadcast a message to every connection in a room except `exclude`
    ///
    /// Iterates a point-in-time copy of the room's connection set. Dead
    /// channels are flagged in the report and unregistered after the loop,
    /// never mid-iteration.
    pub async fn broadcast(
        &self,
        room_id: &str,
        message: ServerMessage,
        exclude: Option<&str>,
    ) -> DeliveryReport {
        let targets: Vec<String> = {
            let rooms = self.rooms.read().await;
            match rooms.get(room_id) {
                Some(ids) => ids.clone(),
                None => {
                    debug!("No connections in room {} to broadcast to", room_id);
                    return DeliveryReport::default();
                }
            }
        };

        let mut report = DeliveryReport::default();
        {
            let connections = self.connections.read().await;
            for connection_id in &targets {
                if Some(connection_id.as_str()) == exclude {
                    continue;
                }

                // The connection may have unregistered since the snapshot
                let Some(info) = connections.get(connection_id) else {
                    continue;
                };

                if info.sender.send(message.clone()).is_ok() {
                    report.delivered += 1;
                } else {
                    warn!(
                        "Failed to deliver to connection {} in room {}",
                        connection_id, room_id
                    );
                    report.failed.push(connection_id.clone());
                }
            }
        }

        for connection_id in &report.failed {
            self.unregister(connection_id).await;
        }

        report
    }

    /// Broadcast the room's current connection count to all its members
    pub async fn broadcast_user_count(&self, room_id: &str) -> DeliveryReport {
        let count = self.count(room_id).await;
        let report = self
            .broadcast(room_id, ServerMessage::UserCount { count }, None)
            .await;

        debug!("Broadcast user count {} to room {}", count, room_id);
        report
    }

    /// Drop every channel in a room, closing the clients' send loops
    ///
    /// Returns the number of connections closed.
    pub async fn close_room(&self, room_id: &str) -> usize {
        let ids = match self.rooms.write().await.remove(room_id) {
            Some(ids) => ids,
            None => return 0,
        };

        let mut connections = self.connections.write().await;
        for id in &ids {
            connections.remove(id);
        }

        info!("Closed {} connections in room {}", ids.len(), room_id);
        ids.len()
    }

    /// Drop every channel across all rooms; shutdown path
    pub async fn close_all(&self) -> usize {
        let mut connections = self.connections.write().await;
        let count = connections.len();
        connections.clear();
        self.rooms.write().await.clear();

        info!("Closed all {} connections", count);
        count
    }
}

impl Default for ConnectionManager {
    fn default() -> Self {
        Self::new()
    }
}
