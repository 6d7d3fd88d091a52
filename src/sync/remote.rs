use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
    time::Duration,
};

use anyhow::{ensure, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use fs4::tokio::AsyncFileExt;
use futures::{stream::BoxStream, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::{
    fs::File,
    io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt},
    time::MissedTickBehavior,
};
use tokio_stream::wrappers::IntervalStream;
use tracing::{debug, warn};

#[cfg(test)]
use mockall::automock;

/// Full copy of a user's state as kept by the backend. `data` is a backup document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteSnapshot {
    pub user_id: String,
    pub data: serde_json::Value,
    pub updated_at: DateTime<Utc>,
}

/// Key value store of snapshots by user identity.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Point read. `None` means the user has nothing stored yet.
    async fn fetch(&self, user_id: &str) -> Result<Option<RemoteSnapshot>>;

    /// Inserts or overwrites the user's snapshot. The whole blob is replaced.
    async fn upsert(&self, snapshot: RemoteSnapshot) -> Result<()>;

    /// Change notifications for a user, when the store supports them. Only snapshots newer than
    /// `since` are reported, and writes made through this store never are.
    fn subscribe(
        &self,
        user_id: &str,
        since: Option<DateTime<Utc>>,
    ) -> Option<BoxStream<'static, RemoteSnapshot>>;
}

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Store backed by a directory with one `<user>.json` file per user. The directory can be shared
/// between machines by any file synchronisation tool. Change notifications are produced by
/// polling.
pub struct DirectoryRemoteStore {
    dir: PathBuf,
    poll_interval: Duration,
    last_written: Arc<Mutex<Option<DateTime<Utc>>>>,
}

impl DirectoryRemoteStore {
    pub fn new(dir: PathBuf) -> Result<Self> {
        std::fs::create_dir_all(&dir).with_context(|| format!("Can't create {dir:?}"))?;
        Ok(Self {
            dir,
            poll_interval: DEFAULT_POLL_INTERVAL,
            last_written: Arc::new(Mutex::new(None)),
        })
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    fn path_for(&self, user_id: &str) -> Result<PathBuf> {
        ensure!(
            !user_id.is_empty() && !user_id.contains(['/', '\\', '.']),
            "User id {user_id:?} can't be used as a file name"
        );
        Ok(self.dir.join(format!("{user_id}.json")))
    }

    fn remember_write(&self, updated_at: DateTime<Utc>) {
        if let Ok(mut last) = self.last_written.lock() {
            *last = Some(updated_at);
        }
    }
}

async fn read_snapshot(path: &Path) -> Result<Option<RemoteSnapshot>> {
    let mut file = match File::open(path).await {
        Ok(file) => file,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => Err(e).with_context(|| format!("Can't open {path:?}"))?,
    };

    file.lock_shared()?;
    let mut text = String::new();
    let read = file.read_to_string(&mut text).await;
    file.unlock_async().await?;
    read?;

    if text.trim().is_empty() {
        return Ok(None);
    }
    Ok(Some(serde_json::from_str(&text).with_context(|| {
        format!("Remote snapshot at {path:?} is corrupted")
    })?))
}

async fn write_snapshot(path: &Path, snapshot: &RemoteSnapshot) -> Result<()> {
    let bytes = serde_json::to_vec(snapshot)?;
    let mut file = File::options()
        .write(true)
        .create(true)
        .read(true)
        .truncate(false)
        .open(path)
        .await
        .with_context(|| format!("Can't open {path:?}"))?;

    file.lock_exclusive()?;
    let result = async {
        file.set_len(0).await?;
        file.rewind().await?;
        file.write_all(&bytes).await?;
        file.flush().await?;
        anyhow::Ok(())
    }
    .await;
    file.unlock_async().await?;
    result
}

#[async_trait]
impl RemoteStore for DirectoryRemoteStore {
    async fn fetch(&self, user_id: &str) -> Result<Option<RemoteSnapshot>> {
        read_snapshot(&self.path_for(user_id)?).await
    }

    async fn upsert(&self, snapshot: RemoteSnapshot) -> Result<()> {
        let path = self.path_for(&snapshot.user_id)?;
        write_snapshot(&path, &snapshot).await?;
        self.remember_write(snapshot.updated_at);
        Ok(())
    }

    fn subscribe(
        &self,
        user_id: &str,
        since: Option<DateTime<Utc>>,
    ) -> Option<BoxStream<'static, RemoteSnapshot>> {
        let path = self
            .path_for(user_id)
            .inspect_err(|e| warn!("Can't watch remote snapshot {e:?}"))
            .ok()?;
        let own_writes = self.last_written.clone();

        let mut interval = tokio::time::interval(self.poll_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut seen = since;

        let stream = IntervalStream::new(interval)
            .then(move |_| {
                let path = path.clone();
                async move { read_snapshot(&path).await }
            })
            .filter_map(move |read| {
                let snapshot = match read {
                    Ok(snapshot) => snapshot,
                    Err(e) => {
                        warn!("Polling remote snapshot failed {e:?}");
                        None
                    }
                };
                let fresh = snapshot.filter(|v| Some(v.updated_at) > seen);
                if let Some(v) = &fresh {
                    seen = Some(v.updated_at);
                }
                let own = own_writes.lock().ok().and_then(|v| *v);
                let fresh = fresh.filter(|v| Some(v.updated_at) != own);
                if let Some(v) = &fresh {
                    debug!("Remote snapshot changed at {}", v.updated_at);
                }
                async move { fresh }
            });
        Some(stream.boxed())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use anyhow::Result;
    use chrono::{TimeZone, Utc};
    use futures::StreamExt;
    use serde_json::json;
    use tempfile::tempdir;

    use super::*;

    fn snapshot(user: &str, second: u32) -> RemoteSnapshot {
        RemoteSnapshot {
            user_id: user.into(),
            data: json!({ "notificationsEnabled": false }),
            updated_at: Utc.with_ymd_and_hms(2026, 2, 20, 9, 0, second).unwrap(),
        }
    }

    #[tokio::test]
    async fn fetch_returns_latest_upsert() -> Result<()> {
        let dir = tempdir()?;
        let store = DirectoryRemoteStore::new(dir.path().to_path_buf())?;
        assert_eq!(store.fetch("alice").await?, None);

        store.upsert(snapshot("alice", 1)).await?;
        store.upsert(snapshot("alice", 2)).await?;
        assert_eq!(store.fetch("alice").await?, Some(snapshot("alice", 2)));
        assert_eq!(store.fetch("bob").await?, None);
        Ok(())
    }

    #[tokio::test]
    async fn rejects_path_like_user_ids() -> Result<()> {
        let dir = tempdir()?;
        let store = DirectoryRemoteStore::new(dir.path().to_path_buf())?;
        assert!(store.fetch("../etc").await.is_err());
        assert!(store.subscribe("a/b", None).is_none());
        Ok(())
    }

    #[tokio::test]
    async fn notifies_foreign_writes_only() -> Result<()> {
        let dir = tempdir()?;
        let ours = DirectoryRemoteStore::new(dir.path().to_path_buf())?
            .with_poll_interval(Duration::from_millis(20));
        let theirs = DirectoryRemoteStore::new(dir.path().to_path_buf())?;

        theirs.upsert(snapshot("alice", 1)).await?;
        let mut changes = ours
            .subscribe("alice", Some(snapshot("alice", 1).updated_at))
            .unwrap();

        ours.upsert(snapshot("alice", 2)).await?;
        // Nothing new for this side.
        assert!(
            tokio::time::timeout(Duration::from_millis(100), changes.next())
                .await
                .is_err()
        );

        theirs.upsert(snapshot("alice", 3)).await?;

        let change = tokio::time::timeout(Duration::from_secs(2), changes.next()).await?;
        assert_eq!(change, Some(snapshot("alice", 3)));
        Ok(())
    }
}
