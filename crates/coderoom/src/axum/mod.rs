use axum::{
    extract::{Path, State, WebSocketUpgrade},
    response::Response,
    routing::get,
    Router,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

pub mod api;
pub mod handler;

pub use handler::WebSocketHandler;

use crate::connection::ConnectionManager;
use crate::room::RoomRegistry;

/// Default grace period before an empty room is evicted from the registry
pub const DEFAULT_EVICTION_GRACE: Duration = Duration::from_secs(60);

/// Axum state wrapper for the sync engine
///
/// Created once per process and injected into every handler; torn down on
/// shutdown by closing all channels.
#[derive(Clone)]
pub struct SyncState {
    registry: Arc<RoomRegistry>,
    connections: Arc<ConnectionManager>,
    eviction_grace: Option<Duration>,
    idle_timeout: Option<Duration>,
}

impl SyncState {
    /// Create a new sync state around a room registry
    pub fn new(registry: Arc<RoomRegistry>) -> Self {
        Self {
            registry,
            connections: Arc::new(ConnectionManager::new()),
            eviction_grace: Some(DEFAULT_EVICTION_GRACE),
            idle_timeout: None,
        }
    }

    /// Get the room registry
    pub fn registry(&self) -> &Arc<RoomRegistry> {
        &self.registry
    }

    /// Get the connection manager
    pub fn connections(&self) -> &Arc<ConnectionManager> {
        &self.connections
    }

    /// Set the grace period before an empty room is evicted from the
    /// registry; `None` keeps idle rooms cached forever
    pub fn set_eviction_grace(&mut self, grace: Option<Duration>) {
        self.eviction_grace = grace;
    }

    /// Set the window after which a silent connection is proactively
    /// closed (a normal disconnect, not an error); `None` disables it
    pub fn set_idle_timeout(&mut self, timeout: Option<Duration>) {
        self.idle_timeout = timeout;
    }

    pub(crate) fn eviction_grace(&self) -> Option<Duration> {
        self.eviction_grace
    }

    pub(crate) fn idle_timeout(&self) -> Option<Duration> {
        self.idle_timeout
    }

    /// Close every live channel; the store keeps the durable copies
    pub async fn shutdown(&self) {
        let closed = self.connections.close_all().await;
        info!("Shutdown complete, closed {} connections", closed);
    }
}

/// Create a router with the realtime websocket endpoint and the room API
pub fn router_with_sync(state: SyncState) -> Router<SyncState> {
    Router::new()
        .route("/ws/{room_id}", get(websocket_handler))
        .merge(api::api_router())
        .with_state(state)
}

/// WebSocket handler endpoint
async fn websocket_handler(
    ws: WebSocketUpgrade,
    Path(room_id): Path<String>,
    State(state): State<SyncState>,
) -> Response {
    ws.on_upgrade(move |socket| WebSocketHandler::new(socket, room_id, state).handle())
}
