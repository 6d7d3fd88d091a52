//! The planner owns the local authoritative [PlannerState].
//!
//! All mutations go through [Planner::execute] (a named [Command]), [Planner::replace] (a whole
//! state coming from a backup) or [Planner::replace_with_remote]. Each successful mutation is
//! saved, bumps the revision and is announced to the single [StateEvent] subscriber.

use std::sync::Arc;

use anyhow::Result;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, info, warn};

use crate::storage::{
    backup,
    snapshot::{SnapshotStorage, StoredSnapshot},
};

use commands::Command;
use state::PlannerState;

pub mod commands;
pub mod day_index;
pub mod progress;
pub mod records;
pub mod state;

/// Where the latest state came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Origin {
    #[default]
    Local,
    /// Copied from the remote snapshot store.
    Remote,
}

/// Announces that the local state changed and now has `revision`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateEvent {
    pub revision: u64,
    pub origin: Origin,
}

struct Inner {
    state: PlannerState,
    revision: u64,
    subscriber: Option<mpsc::UnboundedSender<StateEvent>>,
}

struct Shared<S> {
    storage: S,
    inner: Mutex<Inner>,
}

/// Cheap to clone handle to the local state.
pub struct Planner<S: SnapshotStorage> {
    shared: Arc<Shared<S>>,
}

impl<S: SnapshotStorage> Clone for Planner<S> {
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
        }
    }
}

impl<S: SnapshotStorage> Planner<S> {
    /// Loads the saved state. A first run starts from defaults without writing anything.
    pub async fn open(storage: S) -> Result<Self> {
        let (state, revision) = match storage.load().await? {
            Some(stored) => (stored.state, stored.revision),
            None => {
                info!("No saved state, starting from defaults");
                (PlannerState::default(), 0)
            }
        };
        Ok(Self::with_state(storage, state, revision))
    }

    pub fn with_state(storage: S, state: PlannerState, revision: u64) -> Self {
        Self {
            shared: Arc::new(Shared {
                storage,
                inner: Mutex::new(Inner {
                    state,
                    revision,
                    subscriber: None,
                }),
            }),
        }
    }

    /// Registers the only subscriber. A previous one stops receiving events.
    pub async fn subscribe(&self) -> mpsc::UnboundedReceiver<StateEvent> {
        let (sender, receiver) = mpsc::unbounded_channel();
        self.shared.inner.lock().await.subscriber = Some(sender);
        receiver
    }

    pub async fn snapshot(&self) -> PlannerState {
        self.shared.inner.lock().await.state.clone()
    }

    pub async fn revision(&self) -> u64 {
        self.shared.inner.lock().await.revision
    }

    /// Applies a command and saves the result. Returns the new revision.
    pub async fn execute(&self, command: Command) -> Result<u64> {
        let mut inner = self.shared.inner.lock().await;
        let mut state = inner.state.clone();
        state.apply(command)?;
        self.commit(&mut inner, state, Origin::Local).await
    }

    /// Swaps in a whole new state. Returns the new revision.
    pub async fn replace(&self, state: PlannerState) -> Result<u64> {
        let mut inner = self.shared.inner.lock().await;
        self.commit(&mut inner, state, Origin::Local).await
    }

    /// Swaps in the state of a remote snapshot. The saved copy remembers that, so other processes
    /// reloading it don't send it back.
    pub async fn replace_with_remote(&self, state: PlannerState) -> Result<u64> {
        let mut inner = self.shared.inner.lock().await;
        self.commit(&mut inner, state, Origin::Remote).await
    }

    /// Imports a backup document. A document that fails to migrate or decode changes nothing.
    pub async fn import_backup(&self, text: &str) -> Result<u64> {
        let state = backup::import(text)?;
        self.replace(state).await
    }

    pub async fn export_backup(&self) -> Result<String> {
        backup::export(&self.snapshot().await)
    }

    /// Picks up a state saved by another process. Returns the adopted revision, if any.
    pub async fn reload(&self) -> Result<Option<u64>> {
        let Some(stored) = self.shared.storage.load().await? else {
            return Ok(None);
        };
        let mut inner = self.shared.inner.lock().await;
        if stored.revision == inner.revision {
            return Ok(None);
        }
        debug!(
            "Adopting {:?} revision {} over {}",
            stored.origin, stored.revision, inner.revision
        );
        inner.state = stored.state;
        inner.revision = stored.revision;
        Self::notify(&mut inner, stored.origin);
        Ok(Some(stored.revision))
    }

    async fn commit(&self, inner: &mut Inner, state: PlannerState, origin: Origin) -> Result<u64> {
        // Another process may have saved in the meantime, the revision must still move forward.
        let on_disk = match self.shared.storage.load().await {
            Ok(stored) => stored.map_or(0, |v| v.revision),
            Err(e) => {
                warn!("Couldn't read the saved revision {e:?}");
                0
            }
        };
        let revision = inner.revision.max(on_disk) + 1;

        let snapshot = StoredSnapshot {
            revision,
            saved_at: Utc::now(),
            origin,
            state,
        };
        self.shared.storage.save(&snapshot).await?;

        inner.state = snapshot.state;
        inner.revision = revision;
        Self::notify(inner, origin);
        Ok(revision)
    }

    fn notify(inner: &mut Inner, origin: Origin) {
        let event = StateEvent {
            revision: inner.revision,
            origin,
        };
        if let Some(subscriber) = &inner.subscriber {
            if subscriber.send(event).is_err() {
                debug!("State subscriber is gone");
                inner.subscriber = None;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use anyhow::Result;
    use chrono::NaiveDate;

    use crate::storage::snapshot::MemorySnapshotStorage;

    use super::{day_index::DayIndex, records::FastingStatus, *};

    fn fasting(day: i64) -> Command {
        Command::SetFasting {
            day: DayIndex::clamped(day),
            status: Some(FastingStatus::Completed),
        }
    }

    fn start() -> PlannerState {
        PlannerState::starting_on(NaiveDate::from_ymd_opt(2026, 2, 19).unwrap())
    }

    #[tokio::test]
    async fn mutations_are_saved_and_announced() -> Result<()> {
        let storage = Arc::new(MemorySnapshotStorage::default());
        let planner = Planner::with_state(storage.clone(), start(), 0);
        let mut events = planner.subscribe().await;

        let revision = planner.execute(fasting(1)).await?;
        assert_eq!(revision, 1);
        assert_eq!(
            events.recv().await,
            Some(StateEvent {
                revision: 1,
                origin: Origin::Local
            })
        );

        let saved = storage.current().unwrap();
        assert_eq!(saved.revision, 1);
        assert_eq!(
            saved.state.fasting_for(DayIndex::FIRST),
            Some(FastingStatus::Completed)
        );
        Ok(())
    }

    #[tokio::test]
    async fn open_restores_saved_revision() -> Result<()> {
        let mut state = start();
        state.apply(fasting(3))?;
        let storage = Arc::new(MemorySnapshotStorage::with(StoredSnapshot {
            revision: 7,
            saved_at: Utc::now(),
            origin: Origin::Local,
            state: state.clone(),
        }));

        let planner = Planner::open(storage).await?;
        assert_eq!(planner.revision().await, 7);
        assert_eq!(planner.snapshot().await, state);
        assert_eq!(planner.execute(fasting(4)).await?, 8);
        Ok(())
    }

    #[tokio::test]
    async fn rejected_commands_are_silent() -> Result<()> {
        let storage = Arc::new(MemorySnapshotStorage::default());
        let planner = Planner::with_state(storage.clone(), start(), 0);
        let mut events = planner.subscribe().await;

        assert!(planner
            .execute(Command::ToggleJuz { juz: 0 })
            .await
            .is_err());
        assert_eq!(planner.revision().await, 0);
        assert!(storage.current().is_none());
        assert!(events.try_recv().is_err());
        Ok(())
    }

    #[tokio::test]
    async fn reload_adopts_foreign_revisions() -> Result<()> {
        let storage = Arc::new(MemorySnapshotStorage::default());
        let daemon = Planner::with_state(storage.clone(), start(), 0);
        let mut events = daemon.subscribe().await;

        let cli = Planner::open(storage.clone()).await?;
        cli.execute(fasting(2)).await?;

        assert_eq!(daemon.reload().await?, Some(1));
        assert_eq!(
            events.recv().await,
            Some(StateEvent {
                revision: 1,
                origin: Origin::Local
            })
        );
        assert_eq!(daemon.reload().await?, None);
        assert_eq!(
            daemon.snapshot().await.fasting_for(DayIndex::clamped(2)),
            Some(FastingStatus::Completed)
        );

        // Revisions keep moving forward even when both sides saved.
        assert_eq!(daemon.execute(fasting(3)).await?, 2);
        assert_eq!(cli.execute(fasting(4)).await?, 3);
        Ok(())
    }

    #[tokio::test]
    async fn reload_keeps_remote_origin() -> Result<()> {
        let storage = Arc::new(MemorySnapshotStorage::default());
        let daemon = Planner::with_state(storage.clone(), start(), 0);
        let mut events = daemon.subscribe().await;

        let cli = Planner::open(storage.clone()).await?;
        let mut remote = start();
        remote.apply(fasting(6))?;
        cli.replace_with_remote(remote.clone()).await?;
        assert_eq!(storage.current().unwrap().origin, Origin::Remote);

        assert_eq!(daemon.reload().await?, Some(1));
        assert_eq!(
            events.recv().await,
            Some(StateEvent {
                revision: 1,
                origin: Origin::Remote
            })
        );
        assert_eq!(daemon.snapshot().await, remote);

        cli.execute(fasting(7)).await?;
        assert_eq!(storage.current().unwrap().origin, Origin::Local);
        Ok(())
    }

    #[tokio::test]
    async fn broken_backup_changes_nothing() -> Result<()> {
        let storage = Arc::new(MemorySnapshotStorage::default());
        let planner = Planner::with_state(storage, start(), 0);
        planner.execute(fasting(1)).await?;
        let before = planner.snapshot().await;

        assert!(planner.import_backup("{\"prayers\": 4}").await.is_err());
        assert_eq!(planner.snapshot().await, before);
        assert_eq!(planner.revision().await, 1);

        let exported = planner.export_backup().await?;
        planner.execute(Command::ResetAll).await?;
        planner.import_backup(&exported).await?;
        assert_eq!(planner.snapshot().await, before);
        Ok(())
    }
}
