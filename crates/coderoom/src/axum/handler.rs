use std::sync::Arc;

use axum::extract::ws::{CloseFrame, Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use super::SyncState;
use crate::protocol::{decode_message, encode_message, ClientMessage, ServerMessage};
use crate::room::RoomHandle;
use crate::{SyncError, SyncResult};

/// Close code sent when a client joins a room that does not exist
pub const ROOM_NOT_FOUND_CLOSE_CODE: u16 = 4004;

/// Handles one WebSocket connection for the lifetime of its session
pub struct WebSocketHandler {
    socket: WebSocket,
    room_id: String,
    state: SyncState,
}

impl WebSocketHandler {
    /// Create a new WebSocket handler
    pub fn new(socket: WebSocket, room_id: String, state: SyncState) -> Self {
        Self {
            socket,
            room_id,
            state,
        }
    }

    /// Run the session: join, relay messages both ways, clean up
    pub async fn handle(mut self) {
        // The room must exist before the channel reaches the room's set
        let room = match self.state.registry().get(&self.room_id).await {
            Ok(room) => room,
            Err(SyncError::RoomNotFound { .. }) => {
                warn!("Connection rejected: room {} not found", self.room_id);
                let close = Message::Close(Some(CloseFrame {
                    code: ROOM_NOT_FOUND_CLOSE_CODE,
                    reason: "Room not found".into(),
                }));
                if let Err(e) = self.socket.send(close).await {
                    debug!("Failed to send close frame: {}", e);
                }
                return;
            }
            Err(e) => {
                error!("Failed to look up room {}: {}", self.room_id, e);
                return;
            }
        };

        let (mut ws_sender, mut ws_receiver) = self.socket.split();
        let (tx, mut rx) = mpsc::unbounded_channel::<ServerMessage>();

        let connection_id = join_room(&self.state, &room, tx).await;
        info!(
            "Connection {} established in room {}",
            connection_id, self.room_id
        );

        // Forward queued server messages onto the socket
        let mut sender_task = {
            let connection_id = connection_id.clone();
            tokio::spawn(async move {
                while let Some(message) = rx.recv().await {
                    match encode_message(&message) {
                        Ok(encoded) => {
                            if let Err(e) = ws_sender.send(Message::Text(encoded.into())).await {
                                warn!("Failed to send to connection {}: {}", connection_id, e);
                                break;
                            }
                        }
                        Err(e) => {
                            error!(
                                "Failed to encode message for connection {}: {}",
                                connection_id, e
                            );
                        }
                    }
                }
                debug!("Sender task ended for connection {}", connection_id);
            })
        };

        // Dispatch inbound frames until the client goes away
        let mut receiver_task = {
            let state = self.state.clone();
            let room_id = self.room_id.clone();
            let connection_id = connection_id.clone();
            let idle_timeout = self.state.idle_timeout();

            tokio::spawn(async move {
                loop {
                    let next = match idle_timeout {
                        Some(window) => {
                            match tokio::time::timeout(window, ws_receiver.next()).await {
                                Ok(next) => next,
                                Err(_) => {
                                    info!(
                                        "Closing idle connection {} in room {}",
                                        connection_id, room_id
                                    );
                                    break;
                                }
                            }
                        }
                        None => ws_receiver.next().await,
                    };

                    match next {
                        Some(Ok(Message::Text(text))) => {
                            handle_client_message(&state, &room_id, &connection_id, text.as_str())
                                .await;
                        }
                        Some(Ok(Message::Close(_))) => {
                            info!("Connection {} closed normally", connection_id);
                            break;
                        }
                        Some(Ok(Message::Binary(_))) => {
                            warn!(
                                "Ignoring unexpected binary frame from connection {}",
                                connection_id
                            );
                        }
                        Some(Ok(Message::Ping(_))) | Some(Ok(Message::Pong(_))) => {
                            // Axum answers pings for us
                        }
                        Some(Err(e)) => {
                            warn!("WebSocket error for connection {}: {}", connection_id, e);
                            break;
                        }
                        None => break,
                    }
                }
                debug!("Receiver task ended for connection {}", connection_id);
            })
        };

        // Either direction ending closes the session; aborting the other
        // task drops its socket half and finishes the disconnect
        tokio::select! {
            _ = &mut sender_task => receiver_task.abort(),
            _ = &mut receiver_task => sender_task.abort(),
        }

        leave_room(&self.state, &self.room_id, &connection_id).await;
        info!("Connection {} cleaned up", connection_id);
    }
}

/// Register a channel in a room and run the join sequence: the snapshot
/// to the joiner, then the new participant count to the whole room
pub(crate) async fn join_room(
    state: &SyncState,
    room: &RoomHandle,
    sender: mpsc::UnboundedSender<ServerMessage>,
) -> String {
    let connection_id = {
        // Registration and snapshot read hold the room's edit gate, so a
        // concurrent edit cannot broadcast between them and leave the
        // joiner with a stale snapshot.
        let _gate = room.lock_edits().await;
        let connection_id = state.connections().register(room.id(), sender).await;
        let snapshot = room.snapshot();
        state
            .connections()
            .send_to(
                &connection_id,
                ServerMessage::Sync {
                    code: snapshot.code,
                    language: snapshot.language,
                },
            )
            .await;
        connection_id
    };

    state.connections().broadcast_user_count(room.id()).await;
    connection_id
}

/// Apply an accepted edit: replace the live buffer, fan it out to the
/// other participants, then persist off the broadcast path
pub(crate) async fn apply_code_update(
    state: &SyncState,
    room_id: &str,
    connection_id: &str,
    code: String,
) -> SyncResult<()> {
    let room = state.registry().get(room_id).await?;

    let applied_at = {
        // Accept and fan out under the room's gate so every recipient
        // observes edits in acceptance order
        let _gate = room.lock_edits().await;
        let applied_at = room.apply_edit(code.clone());
        state
            .connections()
            .broadcast(
                room_id,
                ServerMessage::CodeUpdate { code: code.clone() },
                Some(connection_id),
            )
            .await;
        applied_at
    };

    // Fire-and-forget persistence: failures are logged and never unwind
    // the in-memory state or the already-delivered broadcast
    let store = Arc::clone(state.registry().store());
    let room_id = room_id.to_string();
    tokio::spawn(async move {
        if let Err(e) = store.save(&room_id, &code).await {
            warn!("Failed to save room {}: {}", room_id, e);
        }
        if let Err(e) = store.append_snapshot(&room_id, &code, applied_at).await {
            warn!("Failed to append snapshot for room {}: {}", room_id, e);
        }
    });

    Ok(())
}

/// Remove a channel, notify the remaining participants, and schedule the
/// room for eviction once the grace window passes without a reconnect
pub(crate) async fn leave_room(state: &SyncState, room_id: &str, connection_id: &str) {
    state.connections().unregister(connection_id).await;
    state.connections().broadcast_user_count(room_id).await;
    schedule_eviction(state, room_id);
}

fn schedule_eviction(state: &SyncState, room_id: &str) {
    let Some(grace) = state.eviction_grace() else {
        return;
    };

    let state = state.clone();
    let room_id = room_id.to_string();
    tokio::spawn(async move {
        tokio::time::sleep(grace).await;
        if state.connections().count(&room_id).await == 0 {
            state.registry().evict(&room_id);
        }
    });
}

/// Dispatch one inbound frame
///
/// Malformed or unrecognized messages are logged and dropped; the
/// connection stays open either way.
pub(crate) async fn handle_client_message(
    state: &SyncState,
    room_id: &str,
    connection_id: &str,
    text: &str,
) {
    let message = match decode_message::<ClientMessage>(text) {
        Ok(message) => message,
        Err(e) => {
            warn!("Ignoring malformed message in room {}: {}", room_id, e);
            return;
        }
    };

    match message {
        ClientMessage::CodeUpdate { code } => {
            if let Err(e) = apply_code_update(state, room_id, connection_id, code).await {
                warn!("Failed to apply edit in room {}: {}", room_id, e);
            }
        }
        ClientMessage::Unknown => {
            debug!(
                "Ignoring unrecognized message type from connection {}",
                connection_id
            );
        }
    }
}
