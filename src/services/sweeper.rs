/// Background expiry sweeper
///
/// Periodically expires sessions past their inactivity deadline and
/// garbage-collects dead refresh tokens. Clients that stop heartbeating are
/// cleaned up here rather than on their next request.
use crate::services::SessionService;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{error, info};

/// Spawn the sweep loop. The handle can be aborted on shutdown; a failed
/// pass is logged and retried on the next tick.
pub fn spawn_expiry_sweeper(sessions: SessionService) -> JoinHandle<()> {
    let interval = Duration::from_secs(sessions.sweep_interval_secs());

    tokio::spawn(async move {
        info!(interval_secs = interval.as_secs(), "Expiry sweeper started");
        let mut ticker = tokio::time::interval(interval);
        // First tick fires immediately; skip it so startup isn't a sweep.
        ticker.tick().await;

        loop {
            ticker.tick().await;
            match sessions.sweep_once().await {
                Ok(0) => {}
                Ok(count) => info!(count, "Swept expired sessions"),
                Err(e) => error!("Expiry sweep failed: {}", e),
            }
        }
    })
}
