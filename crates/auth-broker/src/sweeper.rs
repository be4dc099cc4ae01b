use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::warn;

use crate::cache::CachedAuthzService;

/// Handle to the background expiry sweep. Dropping it leaves the task
/// running; call [`SweeperHandle::shutdown`] for an orderly stop.
pub struct SweeperHandle {
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl SweeperHandle {
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        let _ = self.handle.await;
    }
}

/// Spawns the recurring expiry sweep. `sweep_expired` stays independently
/// callable, so tests drive it directly instead of waiting on this timer.
pub fn spawn_sweeper(service: Arc<CachedAuthzService>, every: Duration) -> SweeperHandle {
    let (shutdown, mut signal) = watch::channel(false);
    let handle = tokio::spawn(async move {
        let mut ticker = interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let now = service.now();
                    if let Err(err) = service.sweep_expired(now).await {
                        warn!("expiry sweep failed: {err}");
                    }
                }
                changed = signal.changed() => {
                    if changed.is_err() || *signal.borrow() {
                        break;
                    }
                }
            }
        }
    });
    SweeperHandle { shutdown, handle }
}
