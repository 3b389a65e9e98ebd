use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, trace};

use crate::store::{EventStore, TickOutcome};

/// Background task running [`EventStore::tick`] on a fixed period
pub struct MaintenanceTask {
    /// Cancellation token for graceful shutdown
    cancel: CancellationToken,
    /// Task handle
    task: tokio::task::JoinHandle<()>,
}

impl MaintenanceTask {
    /// Spawn the maintenance loop; the first tick runs one period from now
    pub fn spawn(store: EventStore) -> Self {
        let cancel = CancellationToken::new();
        let period = store.config().tick_interval();

        let task = {
            let cancel = cancel.clone();

            tokio::spawn(async move {
                let mut interval = tokio::time::interval_at(Instant::now() + period, period);
                interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

                loop {
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        _ = interval.tick() => {}
                    }
                    if cancel.is_cancelled() {
                        break;
                    }

                    // The tick holds the store lock for O(n) work; keep it off
                    // the async workers. A panic inside it comes back as a
                    // JoinError and the loop carries on.
                    let tick_store = store.clone();
                    match tokio::task::spawn_blocking(move || tick_store.tick()).await {
                        Ok(TickOutcome::Skipped) => trace!("paused, tick skipped"),
                        Ok(TickOutcome::Merged(report)) => {
                            if report.merged > 0 || report.eviction_ran {
                                debug!(
                                    merged = report.merged,
                                    evicted = report.evicted,
                                    change = ?report.change,
                                    "maintenance tick"
                                );
                            }
                        }
                        Err(e) => error!(error = %e, "maintenance tick failed"),
                    }
                }

                debug!("maintenance task stopped");
            })
        };

        Self { cancel, task }
    }

    /// Ask the loop to stop before its next tick
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }

    /// Stop the loop and wait for it to finish
    pub async fn stop(mut self) {
        self.cancel.cancel();
        let _ = (&mut self.task).await;
    }
}

impl Drop for MaintenanceTask {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
