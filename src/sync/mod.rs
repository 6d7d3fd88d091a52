//! Keeps the remote snapshot store in step with the local planner.
//!
//! - On start the remote snapshot is pulled once and, when present, replaces the local state.
//! - Every local [StateEvent] (re)starts a debounce window; when it expires the whole state is
//!   upserted. Mutations inside the window are coalesced into one push.
//! - Remote change notifications go through the same replace path as the initial pull.
//!
//! A replace caused by remote data produces a [StateEvent] with [Origin::Remote], also when another
//! process applied it and the planner reloaded it from disk. Such events and anything queued
//! before them are skipped, so inbound data is never echoed back. Conflicts are resolved by the
//! last writer of the whole blob, there is no field level merge.

use std::time::Duration;

use anyhow::Result;
use chrono::{DateTime, Utc};
use futures::{stream::BoxStream, StreamExt};
use tokio::{sync::mpsc, time::Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::{
    planner::{Origin, Planner, StateEvent},
    storage::{backup, snapshot::SnapshotStorage},
    utils::clock::Clock,
};

use remote::{RemoteSnapshot, RemoteStore};

pub mod remote;
pub mod rest;

pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(2000);

pub struct SyncReconciler<S: SnapshotStorage> {
    planner: Planner<S>,
    remote: Box<dyn RemoteStore>,
    user_id: String,
    clock: Box<dyn Clock>,
    debounce: Duration,
    events: mpsc::UnboundedReceiver<StateEvent>,
    shutdown: CancellationToken,
    /// Revision of the last remote apply. Events up to it must not cause a push.
    last_remote: Option<u64>,
}

impl<S: SnapshotStorage> SyncReconciler<S> {
    /// Creates the reconciler and registers it as the planner's subscriber.
    pub async fn new(
        planner: Planner<S>,
        remote: Box<dyn RemoteStore>,
        user_id: String,
        clock: Box<dyn Clock>,
        debounce: Duration,
        shutdown: CancellationToken,
    ) -> Self {
        let events = planner.subscribe().await;
        Self {
            planner,
            remote,
            user_id,
            clock,
            debounce,
            events,
            shutdown,
            last_remote: None,
        }
    }

    /// Fetches the remote snapshot and applies it. Returns its timestamp, `None` when the user has
    /// nothing stored remotely.
    #[instrument(skip(self), fields(user = %self.user_id))]
    pub async fn pull(&mut self) -> Result<Option<DateTime<Utc>>> {
        let Some(snapshot) = self.remote.fetch(&self.user_id).await? else {
            info!("No remote snapshot yet, keeping local state");
            return Ok(None);
        };
        let updated_at = snapshot.updated_at;
        self.apply_remote(snapshot).await?;
        Ok(Some(updated_at))
    }

    /// Uploads the current local state.
    #[instrument(skip(self), fields(user = %self.user_id))]
    pub async fn push(&self) -> Result<()> {
        let state = self.planner.snapshot().await;
        let snapshot = RemoteSnapshot {
            user_id: self.user_id.clone(),
            data: backup::export_value(&state)?,
            updated_at: self.clock.time(),
        };
        self.remote.upsert(snapshot).await?;
        info!("Pushed local state");
        Ok(())
    }

    async fn apply_remote(&mut self, snapshot: RemoteSnapshot) -> Result<()> {
        let state = backup::import_value(snapshot.data)?;
        let revision = self.planner.replace_with_remote(state).await?;
        debug!("Applied remote snapshot as revision {revision}");
        self.last_remote = self.last_remote.max(Some(revision));
        Ok(())
    }

    /// Whether an event should start the debounce window.
    fn is_local(&mut self, event: StateEvent) -> bool {
        if event.origin == Origin::Remote {
            self.last_remote = self.last_remote.max(Some(event.revision));
            return false;
        }
        // Anything up to the remote apply was overwritten by it.
        self.last_remote.map_or(true, |revision| event.revision > revision)
    }

    /// Executes the reconciler loop until shutdown or until the planner goes away. A pending push
    /// is flushed before returning.
    pub async fn run(mut self) -> Result<()> {
        let since = match self.pull().await {
            Ok(since) => since,
            Err(e) => {
                warn!("Initial pull failed, continuing with local state {e:?}");
                None
            }
        };
        let mut notifications = self.remote.subscribe(&self.user_id, since);
        let mut deadline: Option<Instant> = None;

        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => break,
                event = self.events.recv() => {
                    let Some(event) = event else {
                        debug!("Planner closed the event channel");
                        break;
                    };
                    if self.is_local(event) {
                        debug!("Local change {}, push postponed", event.revision);
                        deadline = Some(self.clock.instant() + self.debounce);
                    } else {
                        debug!("Skipping remote originated change {}", event.revision);
                    }
                }
                snapshot = next_notification(&mut notifications) => {
                    match self.apply_remote(snapshot).await {
                        Ok(()) => deadline = None,
                        Err(e) => warn!("Couldn't apply remote change {e:?}"),
                    }
                }
                _ = wait_until(self.clock.as_ref(), deadline) => {
                    deadline = None;
                    if let Err(e) = self.push().await {
                        error!("Push failed, it will be retried after the next change {e:?}");
                    }
                }
            }
        }

        if deadline.is_some() {
            info!("Flushing pending push");
            if let Err(e) = self.push().await {
                error!("Final push failed {e:?}");
            }
        }
        Ok(())
    }
}

async fn next_notification(
    stream: &mut Option<BoxStream<'static, RemoteSnapshot>>,
) -> RemoteSnapshot {
    if let Some(changes) = stream.as_mut() {
        if let Some(snapshot) = changes.next().await {
            return snapshot;
        }
        debug!("Remote notifications ended");
        *stream = None;
    }
    std::future::pending().await
}

async fn wait_until(clock: &dyn Clock, deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => clock.sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use std::{
        sync::{Arc, Mutex},
        time::Duration,
    };

    use anyhow::{anyhow, Result};
    use async_trait::async_trait;
    use chrono::{NaiveDate, TimeZone, Utc};
    use futures::{stream::BoxStream, StreamExt};
    use tokio::{sync::mpsc, task::JoinHandle, time::Instant};
    use tokio_stream::wrappers::UnboundedReceiverStream;
    use tokio_util::sync::CancellationToken;

    use crate::{
        daemon::watcher::LocalWatcher,
        planner::{
            commands::Command, day_index::DayIndex, records::FastingStatus, state::PlannerState,
            Planner,
        },
        storage::{backup, snapshot::MemorySnapshotStorage},
        sync::remote::{MockRemoteStore, RemoteSnapshot, RemoteStore},
        utils::{clock::FixedClock, logging::TEST_LOGGING},
    };

    use super::{SyncReconciler, DEFAULT_DEBOUNCE};

    type TestPlanner = Planner<Arc<MemorySnapshotStorage>>;

    /// Remote that records every push together with the moment it happened.
    #[derive(Clone, Default)]
    struct RecordingRemote {
        stored: Arc<Mutex<Option<RemoteSnapshot>>>,
        pushes: Arc<Mutex<Vec<(Instant, RemoteSnapshot)>>>,
        changes: Arc<Mutex<Option<BoxStream<'static, RemoteSnapshot>>>>,
    }

    impl RecordingRemote {
        fn push_count(&self) -> usize {
            self.pushes.lock().unwrap().len()
        }

        fn with_changes(self) -> (Self, mpsc::UnboundedSender<RemoteSnapshot>) {
            let (sender, receiver) = mpsc::unbounded_channel();
            *self.changes.lock().unwrap() = Some(UnboundedReceiverStream::new(receiver).boxed());
            (self, sender)
        }
    }

    #[async_trait]
    impl RemoteStore for RecordingRemote {
        async fn fetch(&self, _user_id: &str) -> Result<Option<RemoteSnapshot>> {
            Ok(self.stored.lock().unwrap().clone())
        }

        async fn upsert(&self, snapshot: RemoteSnapshot) -> Result<()> {
            self.pushes.lock().unwrap().push((Instant::now(), snapshot));
            Ok(())
        }

        fn subscribe(
            &self,
            _user_id: &str,
            _since: Option<chrono::DateTime<Utc>>,
        ) -> Option<BoxStream<'static, RemoteSnapshot>> {
            self.changes.lock().unwrap().take()
        }
    }

    fn start() -> PlannerState {
        PlannerState::starting_on(NaiveDate::from_ymd_opt(2026, 2, 19).unwrap())
    }

    fn planner() -> TestPlanner {
        Planner::with_state(Arc::new(MemorySnapshotStorage::default()), start(), 0)
    }

    fn fasting(day: i64) -> Command {
        Command::SetFasting {
            day: DayIndex::clamped(day),
            status: Some(FastingStatus::Completed),
        }
    }

    fn remote_snapshot(state: &PlannerState) -> RemoteSnapshot {
        RemoteSnapshot {
            user_id: "user".into(),
            data: backup::export_value(state).unwrap(),
            updated_at: Utc.with_ymd_and_hms(2026, 2, 21, 8, 0, 0).unwrap(),
        }
    }

    async fn spawn(
        planner: &TestPlanner,
        remote: impl RemoteStore + 'static,
        shutdown: &CancellationToken,
    ) -> JoinHandle<Result<()>> {
        let reconciler = SyncReconciler::new(
            planner.clone(),
            Box::new(remote),
            "user".into(),
            Box::new(FixedClock(Utc.with_ymd_and_hms(2026, 2, 21, 9, 0, 0).unwrap())),
            DEFAULT_DEBOUNCE,
            shutdown.clone(),
        )
        .await;
        let handle = tokio::spawn(reconciler.run());
        // Let the initial pull finish.
        tokio::time::sleep(Duration::from_millis(10)).await;
        handle
    }

    #[tokio::test(start_paused = true)]
    async fn bursts_of_changes_are_pushed_once() -> Result<()> {
        *TEST_LOGGING;
        let planner = planner();
        let remote = RecordingRemote::default();
        let shutdown = CancellationToken::new();
        let handle = spawn(&planner, remote.clone(), &shutdown).await;

        for day in 1..=6 {
            planner.execute(fasting(day)).await?;
            tokio::time::sleep(Duration::from_millis(300)).await;
        }
        let last_change = Instant::now() - Duration::from_millis(300);

        tokio::time::sleep(Duration::from_millis(1600)).await;
        assert_eq!(remote.push_count(), 0);

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(remote.push_count(), 1);

        tokio::time::sleep(Duration::from_secs(10)).await;
        let pushes = remote.pushes.lock().unwrap().clone();
        assert_eq!(pushes.len(), 1);
        let waited = pushes[0].0 - last_change;
        assert!(waited >= DEFAULT_DEBOUNCE && waited < DEFAULT_DEBOUNCE + Duration::from_millis(10));

        let pushed = backup::import_value(pushes[0].1.data.clone())?;
        assert_eq!(pushed, planner.snapshot().await);

        shutdown.cancel();
        handle.await??;
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn pulled_state_is_not_pushed_back() -> Result<()> {
        *TEST_LOGGING;
        let mut remote_state = start();
        remote_state.apply(fasting(9))?;
        let remote = RecordingRemote::default();
        *remote.stored.lock().unwrap() = Some(remote_snapshot(&remote_state));

        let planner = planner();
        let shutdown = CancellationToken::new();
        let handle = spawn(&planner, remote.clone(), &shutdown).await;

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(planner.snapshot().await, remote_state);
        assert_eq!(remote.push_count(), 0);

        shutdown.cancel();
        handle.await??;
        assert_eq!(remote.push_count(), 0);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn notifications_replace_state_without_echo() -> Result<()> {
        *TEST_LOGGING;
        let (remote, changes) = RecordingRemote::default().with_changes();
        let planner = planner();
        let shutdown = CancellationToken::new();
        let handle = spawn(&planner, remote.clone(), &shutdown).await;

        // A pending local push is superseded by the inbound snapshot.
        planner.execute(fasting(1)).await?;
        let mut remote_state = start();
        remote_state.apply(fasting(20))?;
        changes.send(remote_snapshot(&remote_state))?;

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(planner.snapshot().await, remote_state);
        assert_eq!(remote.push_count(), 0);

        // Local changes after that are pushed as usual.
        planner.execute(fasting(2)).await?;
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(remote.push_count(), 1);

        shutdown.cancel();
        handle.await??;
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn remote_state_saved_by_another_process_is_not_pushed() -> Result<()> {
        *TEST_LOGGING;
        let storage = Arc::new(MemorySnapshotStorage::default());
        let planner = Planner::with_state(storage.clone(), start(), 0);
        let remote = RecordingRemote::default();
        let shutdown = CancellationToken::new();
        let handle = spawn(&planner, remote.clone(), &shutdown).await;
        let watcher = LocalWatcher::new(
            planner.clone(),
            shutdown.clone(),
            Duration::from_secs(1),
            Box::new(FixedClock(Utc.with_ymd_and_hms(2026, 2, 21, 9, 0, 0).unwrap())),
        );
        let watching = tokio::spawn(watcher.run());

        // One shot pull from the command line.
        let cli = Planner::open(storage.clone()).await?;
        let mut remote_state = start();
        remote_state.apply(fasting(11))?;
        cli.replace_with_remote(remote_state.clone()).await?;

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(planner.snapshot().await, remote_state);
        assert_eq!(remote.push_count(), 0);

        cli.execute(fasting(12)).await?;
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(remote.push_count(), 1);

        shutdown.cancel();
        handle.await??;
        watching.await?;
        assert_eq!(remote.push_count(), 1);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_flushes_pending_push() -> Result<()> {
        *TEST_LOGGING;
        let planner = planner();
        let remote = RecordingRemote::default();
        let shutdown = CancellationToken::new();
        let handle = spawn(&planner, remote.clone(), &shutdown).await;

        planner.execute(fasting(3)).await?;
        tokio::time::sleep(Duration::from_millis(100)).await;
        shutdown.cancel();
        handle.await??;
        assert_eq!(remote.push_count(), 1);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn failed_pull_keeps_local_state() -> Result<()> {
        *TEST_LOGGING;
        let mut remote = MockRemoteStore::new();
        remote
            .expect_fetch()
            .times(1)
            .returning(|_| Err(anyhow!("network is down")));
        remote.expect_subscribe().returning(|_, _| None);
        remote.expect_upsert().times(1).returning(|_| Ok(()));

        let planner = planner();
        let shutdown = CancellationToken::new();
        let handle = spawn(&planner, remote, &shutdown).await;
        assert_eq!(planner.snapshot().await, start());

        planner.execute(fasting(4)).await?;
        tokio::time::sleep(Duration::from_secs(5)).await;

        shutdown.cancel();
        handle.await??;
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn failed_push_is_not_retried() -> Result<()> {
        *TEST_LOGGING;
        let mut remote = MockRemoteStore::new();
        remote.expect_fetch().returning(|_| Ok(None));
        remote.expect_subscribe().returning(|_, _| None);
        remote
            .expect_upsert()
            .times(1)
            .returning(|_| Err(anyhow!("unauthorized")));

        let planner = planner();
        let shutdown = CancellationToken::new();
        let handle = spawn(&planner, remote, &shutdown).await;

        planner.execute(fasting(5)).await?;
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(
            planner.snapshot().await.fasting_for(DayIndex::clamped(5)),
            Some(FastingStatus::Completed)
        );

        shutdown.cancel();
        handle.await??;
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn malformed_remote_snapshot_is_ignored() -> Result<()> {
        *TEST_LOGGING;
        let remote = RecordingRemote::default();
        *remote.stored.lock().unwrap() = Some(RemoteSnapshot {
            user_id: "user".into(),
            data: serde_json::json!({ "juzCompleted": "all of them" }),
            updated_at: Utc::now(),
        });

        let planner = planner();
        let shutdown = CancellationToken::new();
        let handle = spawn(&planner, remote.clone(), &shutdown).await;

        assert_eq!(planner.snapshot().await, start());
        assert_eq!(planner.revision().await, 0);

        shutdown.cancel();
        handle.await??;
        assert_eq!(remote.push_count(), 0);
        Ok(())
    }
}
