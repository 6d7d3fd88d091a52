use std::{future::Future, io::ErrorKind, ops::Deref, path::PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use fs4::tokio::AsyncFileExt;
use serde::{Deserialize, Serialize};
use tokio::{
    fs::File,
    io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt},
};
use tracing::debug;

use crate::planner::{state::PlannerState, Origin};

/// Name of the local state file inside the application directory.
pub const STATE_FILE: &str = "state.json";

/// What is written to disk. `revision` grows with every save so that several processes sharing
/// the file can tell whether somebody else changed it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredSnapshot {
    pub revision: u64,
    pub saved_at: DateTime<Utc>,
    /// Missing in files written before origins were tracked.
    #[serde(default)]
    pub origin: Origin,
    pub state: PlannerState,
}

/// Interface for abstracting the durable copy of the local state.
pub trait SnapshotStorage: Send + Sync + 'static {
    /// Returns the saved snapshot. `None` means nothing was ever saved.
    fn load(&self) -> impl Future<Output = Result<Option<StoredSnapshot>>> + Send;

    /// Replaces the saved snapshot.
    fn save(&self, snapshot: &StoredSnapshot) -> impl Future<Output = Result<()>> + Send;
}

impl<T: Deref + Send + Sync + 'static> SnapshotStorage for T
where
    T::Target: SnapshotStorage,
{
    fn load(&self) -> impl Future<Output = Result<Option<StoredSnapshot>>> + Send {
        self.deref().load()
    }

    fn save(&self, snapshot: &StoredSnapshot) -> impl Future<Output = Result<()>> + Send {
        self.deref().save(snapshot)
    }
}

/// Keeps the snapshot in a single JSON file guarded by advisory locks, so the CLI and the daemon
/// can share it.
pub struct FileSnapshotStorage {
    path: PathBuf,
}

impl FileSnapshotStorage {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn in_dir(dir: PathBuf) -> Self {
        Self::new(dir.join(STATE_FILE))
    }

    async fn read(file: &mut File) -> Result<String> {
        let mut text = String::new();
        file.read_to_string(&mut text).await?;
        Ok(text)
    }

    async fn write(file: &mut File, bytes: &[u8]) -> Result<()> {
        file.set_len(0).await?;
        file.rewind().await?;
        file.write_all(bytes).await?;
        file.flush().await?;
        file.sync_data().await?;
        Ok(())
    }
}

impl SnapshotStorage for FileSnapshotStorage {
    async fn load(&self) -> Result<Option<StoredSnapshot>> {
        let mut file = match File::open(&self.path).await {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("No snapshot at {:?}", self.path);
                return Ok(None);
            }
            Err(e) => Err(e).with_context(|| format!("Can't open {:?}", self.path))?,
        };

        file.lock_shared()?;
        let text = Self::read(&mut file).await;
        file.unlock_async().await?;
        let text = text?;

        if text.trim().is_empty() {
            return Ok(None);
        }
        let snapshot = serde_json::from_str(&text)
            .with_context(|| format!("Snapshot at {:?} is corrupted", self.path))?;
        Ok(Some(snapshot))
    }

    async fn save(&self, snapshot: &StoredSnapshot) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(snapshot)?;

        let mut file = File::options()
            .write(true)
            .create(true)
            .read(true)
            .truncate(false)
            .open(&self.path)
            .await
            .with_context(|| format!("Can't open {:?}", self.path))?;

        // Truncation happens under the lock so readers never see a half written file.
        file.lock_exclusive()?;
        let result = Self::write(&mut file, &bytes).await;
        file.unlock_async().await?;
        debug!("Saved revision {} to {:?}", snapshot.revision, self.path);
        result
    }
}

/// In memory storage used by tests.
#[cfg(test)]
#[derive(Default)]
pub struct MemorySnapshotStorage {
    snapshot: std::sync::Mutex<Option<StoredSnapshot>>,
}

#[cfg(test)]
impl MemorySnapshotStorage {
    pub fn with(snapshot: StoredSnapshot) -> Self {
        Self {
            snapshot: std::sync::Mutex::new(Some(snapshot)),
        }
    }

    pub fn current(&self) -> Option<StoredSnapshot> {
        self.snapshot.lock().unwrap().clone()
    }
}

#[cfg(test)]
impl SnapshotStorage for MemorySnapshotStorage {
    async fn load(&self) -> Result<Option<StoredSnapshot>> {
        Ok(self.current())
    }

    async fn save(&self, snapshot: &StoredSnapshot) -> Result<()> {
        *self.snapshot.lock().unwrap() = Some(snapshot.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use anyhow::Result;
    use chrono::{NaiveDate, TimeZone, Utc};
    use tempfile::tempdir;

    use crate::planner::{commands::Command, day_index::DayIndex};

    use super::*;

    fn snapshot(revision: u64) -> StoredSnapshot {
        let mut state = PlannerState::starting_on(NaiveDate::from_ymd_opt(2026, 2, 19).unwrap());
        state
            .apply(Command::SetDailyPages {
                day: DayIndex::clamped(revision as i64),
                pages: 10,
            })
            .unwrap();
        StoredSnapshot {
            revision,
            saved_at: Utc.with_ymd_and_hms(2026, 2, 20, 10, 0, 0).unwrap(),
            origin: Origin::Local,
            state,
        }
    }

    #[test]
    fn files_without_origin_are_local() -> Result<()> {
        let mut value = serde_json::to_value(snapshot(3))?;
        value
            .as_object_mut()
            .unwrap()
            .remove("origin")
            .unwrap();
        let parsed: StoredSnapshot = serde_json::from_value(value)?;
        assert_eq!(parsed, snapshot(3));
        Ok(())
    }

    #[tokio::test]
    async fn missing_file_is_empty() -> Result<()> {
        let dir = tempdir()?;
        let storage = FileSnapshotStorage::in_dir(dir.path().to_path_buf());
        assert_eq!(storage.load().await?, None);
        Ok(())
    }

    #[tokio::test]
    async fn saves_and_overwrites() -> Result<()> {
        let dir = tempdir()?;
        let storage = FileSnapshotStorage::in_dir(dir.path().to_path_buf());

        storage.save(&snapshot(7)).await?;
        assert_eq!(storage.load().await?, Some(snapshot(7)));

        // A shorter document must not leave trailing bytes of the previous one behind.
        let mut small = snapshot(8);
        small.state.daily_pages.clear();
        storage.save(&small).await?;
        assert_eq!(storage.load().await?, Some(small));
        Ok(())
    }

    #[tokio::test]
    async fn corrupted_file_is_an_error() -> Result<()> {
        let dir = tempdir()?;
        std::fs::write(dir.path().join(STATE_FILE), "{\"revision\": ")?;
        let storage = FileSnapshotStorage::in_dir(dir.path().to_path_buf());
        assert!(storage.load().await.is_err());
        Ok(())
    }

    #[tokio::test]
    async fn shared_through_arc() -> Result<()> {
        let storage = std::sync::Arc::new(MemorySnapshotStorage::default());
        storage.save(&snapshot(1)).await?;
        assert_eq!(storage.load().await?.map(|v| v.revision), Some(1));
        Ok(())
    }
}
