use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// State that needs periodic reclamation
pub trait Maintenance: Send + Sync {
    fn name(&self) -> &'static str;

    /// Drop expired entries, returning how many were removed
    fn cleanup(&self) -> usize;
}

/// Run one sweep over every target
pub fn run_cleanup(targets: &[Arc<dyn Maintenance>]) -> usize {
    targets
        .iter()
        .map(|target| {
            let removed = target.cleanup();
            debug!(target_name = target.name(), removed, "cleanup sweep");
            removed
        })
        .sum()
}

/// Sweep `targets` every `interval` until `shutdown` is cancelled
///
/// Sweeps run one after another inside a single task and never overlap. The
/// first sweep happens one interval after spawning.
pub fn spawn_cleanup_task(
    targets: Vec<Arc<dyn Maintenance>>,
    interval: Duration,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + interval, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(interval_secs = interval.as_secs(), targets = targets.len(), "cleanup task started");
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    let removed = run_cleanup(&targets);
                    if removed > 0 {
                        info!(removed, "periodic cleanup");
                    }
                }
            }
        }
        info!("cleanup task stopped");
    })
}
