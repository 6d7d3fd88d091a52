use std::{path::PathBuf, time::Duration};

use anyhow::Result;
use reminders::{ReminderModule, DEFAULT_CHECK_FREQUENCY};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use watcher::LocalWatcher;

use crate::{
    config::Config,
    planner::Planner,
    storage::snapshot::{FileSnapshotStorage, SnapshotStorage},
    sync::SyncReconciler,
    utils::clock::DefaultClock,
};

pub mod args;
pub mod reminders;
pub mod shutdown;
pub mod watcher;

const DEFAULT_RELOAD_INTERVAL: Duration = Duration::from_secs(1);

/// Represents the starting point for the daemon
pub async fn start_daemon(dir: PathBuf) -> Result<()> {
    let config = Config::load(&dir)?;
    let planner = Planner::open(FileSnapshotStorage::in_dir(dir)).await?;

    let shutdown_token = CancellationToken::new();

    // The reconciler has to subscribe before the watcher can announce anything.
    let reconciler = create_reconciler(&config, &planner, &shutdown_token).await?;

    let watcher = LocalWatcher::new(
        planner.clone(),
        shutdown_token.clone(),
        DEFAULT_RELOAD_INTERVAL,
        Box::new(DefaultClock),
    );
    let reminders = ReminderModule::new(
        planner.clone(),
        shutdown_token.clone(),
        DEFAULT_CHECK_FREQUENCY,
        Box::new(DefaultClock),
    );

    let (_, _, _, sync_result) = tokio::join!(
        shutdown::detect_shutdown(shutdown_token.clone()),
        watcher.run(),
        reminders.run(),
        async move {
            match reconciler {
                Some(reconciler) => reconciler.run().await,
                None => Ok(()),
            }
        },
    );

    if let Err(sync_result) = sync_result {
        error!("Sync module got an error {:?}", sync_result);
    }

    info!("Daemon stopped");
    Ok(())
}

/// `None` when no remote is configured.
pub async fn create_reconciler<S: SnapshotStorage>(
    config: &Config,
    planner: &Planner<S>,
    shutdown_token: &CancellationToken,
) -> Result<Option<SyncReconciler<S>>> {
    let Some(remote) = config.remote_store()? else {
        info!("No remote configured, running local only");
        return Ok(None);
    };
    let reconciler = SyncReconciler::new(
        planner.clone(),
        remote,
        config.user_id.clone(),
        Box::new(DefaultClock),
        config.debounce(),
        shutdown_token.clone(),
    )
    .await;
    Ok(Some(reconciler))
}

#[cfg(test)]
mod daemon_tests {
    use std::path::Path;

    use anyhow::Result;
    use chrono::NaiveDate;
    use tempfile::tempdir;
    use tokio_util::sync::CancellationToken;

    use crate::{
        config::{Config, RemoteConfig, CONFIG_FILE},
        planner::{commands::Command, Planner},
        storage::snapshot::FileSnapshotStorage,
        sync::remote::{DirectoryRemoteStore, RemoteStore},
        utils::logging::TEST_LOGGING,
    };

    use super::create_reconciler;

    fn write_config(dir: &Path, remote_dir: &Path) -> Result<Config> {
        let config = Config {
            user_id: "user_1".into(),
            remote: RemoteConfig::Directory {
                path: remote_dir.to_path_buf(),
            },
            debounce_ms: 50,
            ..Config::default()
        };
        std::fs::write(dir.join(CONFIG_FILE), serde_json::to_string(&config)?)?;
        Ok(config)
    }

    /// A CLI style save in the application directory ends up in the shared remote directory.
    #[tokio::test]
    async fn smoke_test_daemon() -> Result<()> {
        *TEST_LOGGING;
        let app_dir = tempdir()?;
        let remote_dir = tempdir()?;
        let config = write_config(app_dir.path(), remote_dir.path())?;
        assert_eq!(Config::load(app_dir.path())?, config);

        let planner = Planner::open(FileSnapshotStorage::in_dir(app_dir.path().to_path_buf())).await?;
        let shutdown = CancellationToken::new();
        let reconciler = create_reconciler(&config, &planner, &shutdown)
            .await?
            .expect("remote is configured");
        let handle = tokio::spawn(reconciler.run());

        planner
            .execute(Command::SetStartDate(
                NaiveDate::from_ymd_opt(2026, 2, 19).unwrap(),
            ))
            .await?;
        tokio::time::sleep(std::time::Duration::from_millis(300)).await;
        shutdown.cancel();
        handle.await??;

        let remote = DirectoryRemoteStore::new(remote_dir.path().to_path_buf())?;
        let pushed = remote.fetch("user_1").await?.expect("state was pushed");
        assert_eq!(pushed.data["ramadanStartDate"], "2026-02-19");
        Ok(())
    }

    #[tokio::test]
    async fn no_remote_no_reconciler() -> Result<()> {
        let app_dir = tempdir()?;
        let planner = Planner::open(FileSnapshotStorage::in_dir(app_dir.path().to_path_buf())).await?;
        let reconciler =
            create_reconciler(&Config::default(), &planner, &CancellationToken::new()).await?;
        assert!(reconciler.is_none());
        Ok(())
    }
}
