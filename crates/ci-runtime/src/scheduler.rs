use std::time::Duration;

use tokio::sync::watch;

use crate::state::AppState;

/// Background ticker driving the processor and the periodic recovery
/// passes. Holds its own shutdown channel so `stop()` can cancel it with a
/// bounded wait rather than aborting the task outright.
pub struct Scheduler {
    shutdown_tx: watch::Sender<bool>,
    handle: tokio::task::JoinHandle<()>,
}

impl Scheduler {
    pub fn start(state: AppState) -> Self {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(async move {
            loop {
                let tick_secs = state.config_snapshot().processor_tick_secs.max(1);
                tokio::select! {
                    _ = tokio::time::sleep(Duration::from_secs(tick_secs)) => {
                        run_tick(&state).await;
                    }
                    _ = shutdown_rx.changed() => {
                        if *shutdown_rx.borrow() {
                            break;
                        }
                    }
                }
            }
        });
        Self { shutdown_tx, handle }
    }

    /// Signals the loop to stop and waits up to 5 seconds, matching the
    /// daemon's bounded-wait shutdown contract for every background task.
    pub async fn stop(self) {
        let _ = self.shutdown_tx.send(true);
        let _ = tokio::time::timeout(Duration::from_secs(5), self.handle).await;
    }
}

async fn run_tick(state: &AppState) {
    if let Err(err) = state.processor.run_tick().await {
        tracing::warn!(%err, "processor tick failed");
    }

    let timeout_secs = state.config_snapshot().stuck_batch_timeout_secs as i64;
    match state.db.recover_stuck_batches(timeout_secs) {
        Ok(count) if count > 0 => tracing::info!(count, "recovered stuck prompt batches"),
        Ok(_) => {}
        Err(err) => tracing::warn!(%err, "stuck-batch recovery failed"),
    }

    match state.db.recover_orphan_activities() {
        Ok(count) if count > 0 => tracing::info!(count, "recovered orphan activities"),
        Ok(_) => {}
        Err(err) => tracing::warn!(%err, "orphan-activity recovery failed"),
    }
}
