use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tokio::sync::MutexGuard;
use tracing::{debug, info};

use super::model::Room;
use super::store::RoomStore;
use crate::SyncResult;

/// In-memory state of a room that currently has traffic
///
/// Holds the authoritative live code buffer so the hot broadcast path
/// never waits on the store.
pub struct ActiveRoom {
    id: String,
    language: String,
    created_at: DateTime<Utc>,
    buffer: Mutex<BufferState>,
    /// Serializes apply+broadcast for this room only; rooms share no locks
    edit_gate: tokio::sync::Mutex<()>,
}

struct BufferState {
    code: String,
    updated_at: DateTime<Utc>,
}

impl ActiveRoom {
    fn from_record(record: Room) -> Self {
        Self {
            id: record.id,
            language: record.language,
            created_at: record.created_at,
            buffer: Mutex::new(BufferState {
                code: record.code,
                updated_at: record.updated_at,
            }),
            edit_gate: tokio::sync::Mutex::new(()),
        }
    }
}

/// Registry of live rooms, lazily hydrated from the store
///
/// The cached entry is a cache of the store record, not a second owner:
/// evicting it never touches the persisted copy.
pub struct RoomRegistry {
    rooms: DashMap<String, Arc<ActiveRoom>>,
    store: Arc<RoomStore>,
}

impl RoomRegistry {
    /// Create a registry backed by the given store
    pub fn new(store: Arc<RoomStore>) -> Self {
        Self {
            rooms: DashMap::new(),
            store,
        }
    }

    /// Get the backing store
    pub fn store(&self) -> &Arc<RoomStore> {
        &self.store
    }

    /// Get a handle to a room, hydrating it from the store on first access
    pub async fn get(&self, id: &str) -> SyncResult<RoomHandle> {
        if let Some(entry) = self.rooms.get(id) {
            return Ok(RoomHandle::new(entry.value().clone()));
        }

        let record = self.store.load(id).await?;
        let room = self
            .rooms
            .entry(id.to_string())
            .or_insert_with(|| {
                info!("Hydrated room {} into registry", id);
                Arc::new(ActiveRoom::from_record(record))
            })
            .clone();

        Ok(RoomHandle::new(room))
    }

    /// Replace a room's live code buffer, last write wins
    ///
    /// Returns the effective timestamp of the accepted edit. Code content
    /// is opaque; only an unknown room id fails.
    pub async fn apply_edit(&self, id: &str, code: String) -> SyncResult<DateTime<Utc>> {
        let room = self.get(id).await?;
        Ok(room.apply_edit(code))
    }

    /// Check whether a room is currently cached
    pub fn contains(&self, id: &str) -> bool {
        self.rooms.contains_key(id)
    }

    /// Get the number of cached rooms
    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    /// Drop a room's cached entry; the store record is untouched
    ///
    /// Returns true if an entry was evicted, false if none was cached.
    pub fn evict(&self, id: &str) -> bool {
        match self.rooms.remove(id) {
            Some(_) => {
                info!("Evicted idle room {} from registry", id);
                true
            }
            None => {
                debug!("Attempted to evict non-cached room {}", id);
                false
            }
        }
    }
}

/// A cloneable handle to a live room
#[derive(Clone)]
pub struct RoomHandle {
    inner: Arc<ActiveRoom>,
}

impl std::fmt::Debug for RoomHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RoomHandle")
            .field("id", &self.inner.id)
            .finish()
    }
}

impl RoomHandle {
    fn new(room: Arc<ActiveRoom>) -> Self {
        Self { inner: room }
    }

    /// Get the room id
    pub fn id(&self) -> &str {
        &self.inner.id
    }

    /// Get the room's language tag
    pub fn language(&self) -> &str {
        &self.inner.language
    }

    /// Get the current code buffer
    pub fn code(&self) -> String {
        self.inner.buffer.lock().unwrap().code.clone()
    }

    /// Get the timestamp of the most recently accepted edit
    pub fn updated_at(&self) -> DateTime<Utc> {
        self.inner.buffer.lock().unwrap().updated_at
    }

    /// Get a point-in-time copy of the full room record
    pub fn snapshot(&self) -> Room {
        let buffer = self.inner.buffer.lock().unwrap();
        Room {
            id: self.inner.id.clone(),
            code: buffer.code.clone(),
            language: self.inner.language.clone(),
            created_at: self.inner.created_at,
            updated_at: buffer.updated_at,
        }
    }

    /// Replace the code buffer and bump `updated_at`, last write wins
    pub fn apply_edit(&self, code: String) -> DateTime<Utc> {
        let mut buffer = self.inner.buffer.lock().unwrap();
        buffer.code = code;
        buffer.updated_at = Utc::now();
        buffer.updated_at
    }

    /// Acquire this room's edit gate
    ///
    /// Held across apply+broadcast so edits for one room are accepted and
    /// fanned out in a single serial order.
    pub async fn lock_edits(&self) -> MutexGuard<'_, ()> {
        self.inner.edit_gate.lock().await
    }
}
