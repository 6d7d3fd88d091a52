use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::{planner::Planner, storage::snapshot::SnapshotStorage, utils::clock::Clock};

/// Picks up states saved by CLI invocations. An adopted revision is announced by the planner with
/// the origin it was saved with.
pub struct LocalWatcher<S: SnapshotStorage> {
    planner: Planner<S>,
    shutdown: CancellationToken,
    poll_frequency: Duration,
    clock: Box<dyn Clock>,
}

impl<S: SnapshotStorage> LocalWatcher<S> {
    pub fn new(
        planner: Planner<S>,
        shutdown: CancellationToken,
        poll_frequency: Duration,
        clock: Box<dyn Clock>,
    ) -> Self {
        Self {
            planner,
            shutdown,
            poll_frequency,
            clock,
        }
    }

    pub async fn run(self) {
        let mut poll_point = self.clock.instant();
        loop {
            poll_point += self.poll_frequency;

            match self.planner.reload().await {
                Ok(Some(revision)) => info!("Reloaded local state at revision {revision}"),
                Ok(None) => debug!("Local state unchanged"),
                Err(e) => error!("Failed to reload local state {e:?}"),
            }

            tokio::select! {
                _ = self.shutdown.cancelled() => return,
                _ = self.clock.sleep_until(poll_point) => ()
            }
        }
    }
}
