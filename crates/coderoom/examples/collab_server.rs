use std::sync::Arc;
use std::time::Duration;

use coderoom::{router_with_sync, RoomRegistry, RoomStore, SyncState};
use tokio::net::TcpListener;
use tracing::{info, Level};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt().with_max_level(Level::INFO).init();

    info!("Starting collaboration server...");

    // An unreachable store is fatal; never serve traffic without one
    let store = Arc::new(RoomStore::open("./data/rooms").await?);
    let registry = Arc::new(RoomRegistry::new(store));

    let mut sync_state = SyncState::new(registry);
    sync_state.set_eviction_grace(Some(Duration::from_secs(60)));
    sync_state.set_idle_timeout(Some(Duration::from_secs(600)));

    let app = router_with_sync(sync_state.clone()).with_state(sync_state.clone());

    // Start server
    let listener = TcpListener::bind("127.0.0.1:3001").await?;
    info!("Server running on http://127.0.0.1:3001");
    info!("WebSocket endpoint available at ws://127.0.0.1:3001/ws/{{room_id}}");
    info!("API endpoints:");
    info!("  POST   /rooms           - Create a room");
    info!("  GET    /rooms/:id       - Fetch a room");
    info!("  DELETE /rooms/:id       - Delete a room");
    info!("  POST   /autocomplete    - Completion suggestion");
    info!("  GET    /health          - Health check");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(sync_state))
        .await?;

    Ok(())
}

async fn shutdown_signal(state: SyncState) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        return;
    }

    info!("Shutting down...");
    state.shutdown().await;
}
