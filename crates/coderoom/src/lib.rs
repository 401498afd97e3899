//! # Coderoom - Real-time Collaborative Code Rooms
//!
//! A room-based synchronization engine for Axum servers: shared code
//! buffers, per-room broadcast with last-write-wins semantics, and
//! durable room storage that survives reconnects.
//!
//! Each room keeps its live buffer in memory so the broadcast path never
//! waits on storage; accepted edits are fanned out to the room's other
//! participants and persisted asynchronously.

pub mod completion;
pub mod connection;
pub mod error;
pub mod protocol;
pub mod room;

#[cfg(feature = "axum")]
pub mod axum;

// Re-exports for convenience
pub use completion::Suggestion;
pub use connection::{ConnectionManager, DeliveryReport};
pub use error::{SyncError, SyncResult};
pub use protocol::{decode_message, encode_message, ClientMessage, ServerMessage};
pub use room::{default_code, CodeSnapshot, Room, RoomHandle, RoomRegistry, RoomStore};

#[cfg(feature = "axum")]
pub use axum::{router_with_sync, SyncState, WebSocketHandler};
