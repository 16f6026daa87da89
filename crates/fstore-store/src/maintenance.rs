//! Periodic space reclamation for each storage namespace.
//!
//! One task per namespace. On each tick the namespace's reclaimer runs on the
//! blocking pool, and runs again straight away while it reports more work, up
//! to [`MAX_PASSES_PER_TICK`] passes.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::traits::{ReclaimOutcome, SpaceReclaimer};

/// Default period between reclamation ticks.
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(300);

/// Upper bound on back-to-back passes within one tick.
pub const MAX_PASSES_PER_TICK: usize = 16;

/// Spawner for the background reclamation tasks.
pub struct MaintenanceLoop;

impl MaintenanceLoop {
    /// Start one task per reclaimer. Must be called inside a tokio runtime.
    ///
    /// The first pass happens one `interval` after spawning.
    pub fn spawn(reclaimers: Vec<Arc<dyn SpaceReclaimer>>, interval: Duration) -> MaintenanceHandle {
        let (stop_tx, stop_rx) = watch::channel(false);
        let tasks = reclaimers
            .into_iter()
            .map(|reclaimer| tokio::spawn(run(reclaimer, interval, stop_rx.clone())))
            .collect::<Vec<_>>();
        info!(namespaces = tasks.len(), interval_secs = interval.as_secs_f64(), "maintenance loop started");
        MaintenanceHandle { stop_tx, tasks }
    }
}

/// Owner of the running maintenance tasks.
///
/// Dropping the handle also stops the tasks, but without waiting for an
/// in-flight pass to finish.
pub struct MaintenanceHandle {
    stop_tx: watch::Sender<bool>,
    tasks: Vec<JoinHandle<()>>,
}

impl MaintenanceHandle {
    /// Signal every task to stop and wait for them to exit.
    pub async fn shutdown(self) {
        let _ = self.stop_tx.send(true);
        for task in self.tasks {
            if let Err(e) = task.await {
                error!(error = %e, "maintenance task panicked");
            }
        }
        info!("maintenance loop stopped");
    }

    /// Number of namespace tasks.
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

async fn run(reclaimer: Arc<dyn SpaceReclaimer>, interval: Duration, mut stop: watch::Receiver<bool>) {
    let mut tick = tokio::time::interval(interval);
    tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick fires immediately.
    tick.tick().await;

    loop {
        tokio::select! {
            _ = tick.tick() => {
                reclaim_until_idle(&reclaimer).await;
            }
            _ = stop.changed() => {
                debug!(namespace = reclaimer.namespace(), "maintenance task stopping");
                break;
            }
        }
    }
}

/// Run reclamation passes until the engine reports idle, an error occurs,
/// or the per-tick bound is reached. Returns the number of passes made.
pub(crate) async fn reclaim_until_idle(reclaimer: &Arc<dyn SpaceReclaimer>) -> usize {
    let namespace = reclaimer.namespace().to_string();
    for pass in 1..=MAX_PASSES_PER_TICK {
        let worker = Arc::clone(reclaimer);
        match tokio::task::spawn_blocking(move || worker.reclaim()).await {
            Ok(Ok(ReclaimOutcome::MoreWork)) => continue,
            Ok(Ok(ReclaimOutcome::Idle)) => {
                debug!(namespace = %namespace, passes = pass, "reclamation settled");
                return pass;
            }
            Ok(Err(e)) => {
                warn!(namespace = %namespace, error = %e, "reclamation pass failed");
                return pass;
            }
            Err(e) => {
                error!(namespace = %namespace, error = %e, "reclamation task panicked");
                return pass;
            }
        }
    }
    debug!(namespace = %namespace, passes = MAX_PASSES_PER_TICK, "reclamation pass limit reached");
    MAX_PASSES_PER_TICK
}
