use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};
use uuid::Uuid;

use super::model::{default_code, CodeSnapshot, Room};
use crate::{SyncError, SyncResult};

/// Durable store for room records and their snapshot logs
///
/// Each room is persisted as a `<id>.room` JSON file plus an append-only
/// `<id>.snapshots` log with one JSON snapshot per line. The store is the
/// source of truth across restarts; the registry only caches it.
pub struct RoomStore {
    root: PathBuf,
}

impl RoomStore {
    /// Open a store rooted at the given directory, creating it if needed
    ///
    /// An unreachable storage directory is fatal; the process must not
    /// serve traffic without a working store.
    pub async fn open(root: impl Into<PathBuf>) -> SyncResult<Self> {
        let root = root.into();
        tokio::fs::create_dir_all(&root).await?;

        info!("Opened room store at {:?}", root);
        Ok(Self { root })
    }

    fn room_path(&self, id: &str) -> PathBuf {
        self.root.join(format!("{}.room", id))
    }

    fn snapshot_path(&self, id: &str) -> PathBuf {
        self.root.join(format!("{}.snapshots", id))
    }

    /// Create a new room with a generated id and a language-specific
    /// starter template
    pub async fn create(&self, language: &str) -> SyncResult<Room> {
        // Short ids are easier to share than full UUIDs
        let id = Uuid::new_v4().to_string()[..8].to_string();
        let now = Utc::now();

        let room = Room {
            id: id.clone(),
            code: default_code(language),
            language: language.to_string(),
            created_at: now,
            updated_at: now,
        };

        write_room(&self.room_path(&id), &room).await?;

        info!("Created room {} with language {}", id, language);
        Ok(room)
    }

    /// Load a room record by id
    pub async fn load(&self, id: &str) -> SyncResult<Room> {
        let data = match tokio::fs::read_to_string(self.room_path(id)).await {
            Ok(data) => data,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(SyncError::RoomNotFound { id: id.to_string() });
            }
            Err(e) => return Err(e.into()),
        };

        Ok(serde_json::from_str(&data)?)
    }

    /// Upsert the mutable fields of a room record
    ///
    /// Saving the code a room already holds is a no-op, so repeated saves
    /// of the same value leave the store observably unchanged.
    pub async fn save(&self, id: &str, code: &str) -> SyncResult<()> {
        let mut room = self.load(id).await?;

        if room.code == code {
            debug!("Room {} already holds this code, skipping save", id);
            return Ok(());
        }

        room.code = code.to_string();
        room.updated_at = Utc::now();

        write_room(&self.room_path(id), &room).await?;

        debug!("Saved room {}", id);
        Ok(())
    }

    /// Append one snapshot to the room's history log
    ///
    /// The log is append-only; retention is an external concern.
    pub async fn append_snapshot(
        &self,
        id: &str,
        code: &str,
        timestamp: DateTime<Utc>,
    ) -> SyncResult<()> {
        let snapshot = CodeSnapshot {
            room_id: id.to_string(),
            code: code.to_string(),
            timestamp,
        };

        let mut line = serde_json::to_string(&snapshot)?;
        line.push('\n');

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.snapshot_path(id))
            .await?;
        file.write_all(line.as_bytes()).await?;

        debug!("Appended snapshot for room {}", id);
        Ok(())
    }

    /// Read the room's snapshot history in append order
    pub async fn read_snapshots(&self, id: &str) -> SyncResult<Vec<CodeSnapshot>> {
        let data = match tokio::fs::read_to_string(self.snapshot_path(id)).await {
            Ok(data) => data,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        data.lines()
            .map(|line| Ok(serde_json::from_str(line)?))
            .collect()
    }

    /// Delete a room record and its snapshot log
    pub async fn delete(&self, id: &str) -> SyncResult<()> {
        match tokio::fs::remove_file(self.room_path(id)).await {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(SyncError::RoomNotFound { id: id.to_string() });
            }
            Err(e) => return Err(e.into()),
        }

        // The snapshot log may not exist if the room was never edited
        match tokio::fs::remove_file(self.snapshot_path(id)).await {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }

        info!("Deleted room {}", id);
        Ok(())
    }
}

async fn write_room(path: &Path, room: &Room) -> SyncResult<()> {
    let json = serde_json::to_string_pretty(room)?;
    tokio::fs::write(path, json).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn open_store() -> (RoomStore, TempDir) {
        let dir = TempDir::new().unwrap();
        let store = RoomStore::open(dir.path()).await.unwrap();
        (store, dir)
    }

    #[tokio::test]
    async fn create_then_load_round_trip() {
        let (store, _dir) = open_store().await;

        let room = store.create("python").await.unwrap();
        assert_eq!(room.id.len(), 8);
        assert_eq!(room.code, default_code("python"));

        let loaded = store.load(&room.id).await.unwrap();
        assert_eq!(loaded.id, room.id);
        assert_eq!(loaded.code, room.code);
        assert_eq!(loaded.language, "python");
    }

    #[tokio::test]
    async fn load_missing_room_is_not_found() {
        let (store, _dir) = open_store().await;

        let err = store.load("does-not-exist").await.unwrap_err();
        assert!(matches!(err, SyncError::RoomNotFound { id } if id == "does-not-exist"));
    }

    #[tokio::test]
    async fn save_replaces_code_and_bumps_updated_at() {
        let (store, _dir) = open_store().await;

        let room = store.create("python").await.unwrap();
        store.save(&room.id, "x = 1").await.unwrap();

        let loaded = store.load(&room.id).await.unwrap();
        assert_eq!(loaded.code, "x = 1");
        assert!(loaded.updated_at >= room.updated_at);
    }

    #[tokio::test]
    async fn save_is_idempotent_for_identical_code() {
        let (store, _dir) = open_store().await;

        let room = store.create("python").await.unwrap();
        store.save(&room.id, "x = 1").await.unwrap();
        let first = store.load(&room.id).await.unwrap();

        store.save(&room.id, "x = 1").await.unwrap();
        let second = store.load(&room.id).await.unwrap();

        assert_eq!(first.code, second.code);
        assert_eq!(first.updated_at, second.updated_at);
    }

    #[tokio::test]
    async fn save_missing_room_is_not_found() {
        let (store, _dir) = open_store().await;

        let err = store.save("nope", "x = 1").await.unwrap_err();
        assert!(matches!(err, SyncError::RoomNotFound { .. }));
    }

    #[tokio::test]
    async fn snapshots_append_in_order() {
        let (store, _dir) = open_store().await;

        let room = store.create("python").await.unwrap();
        store
            .append_snapshot(&room.id, "x = 1", Utc::now())
            .await
            .unwrap();
        store
            .append_snapshot(&room.id, "x = 2", Utc::now())
            .await
            .unwrap();

        let snapshots = store.read_snapshots(&room.id).await.unwrap();
        assert_eq!(snapshots.len(), 2);
        assert_eq!(snapshots[0].code, "x = 1");
        assert_eq!(snapshots[1].code, "x = 2");
        assert_eq!(snapshots[0].room_id, room.id);
    }

    #[tokio::test]
    async fn read_snapshots_for_unedited_room_is_empty() {
        let (store, _dir) = open_store().await;

        let room = store.create("python").await.unwrap();
        let snapshots = store.read_snapshots(&room.id).await.unwrap();
        assert!(snapshots.is_empty());
    }

    #[tokio::test]
    async fn delete_removes_record_and_log() {
        let (store, _dir) = open_store().await;

        let room = store.create("python").await.unwrap();
        store
            .append_snapshot(&room.id, "x = 1", Utc::now())
            .await
            .unwrap();

        store.delete(&room.id).await.unwrap();

        assert!(matches!(
            store.load(&room.id).await.unwrap_err(),
            SyncError::RoomNotFound { .. }
        ));
        let err = store.delete(&room.id).await.unwrap_err();
        assert!(matches!(err, SyncError::RoomNotFound { .. }));
    }
}
