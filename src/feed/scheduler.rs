// src/feed/scheduler.rs
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::feed::cache::SnapshotCache;

/// Spawn the background poller. The first tick fires immediately, so the
/// cache starts loading as soon as the process is up. A failed tick is not
/// retried early: the next tick is the retry.
pub fn spawn_poller(cache: SnapshotCache, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            // Outcome is recorded in the cache state and logged there.
            let _ = cache.refresh().await;
            tracing::debug!(
                target: "feed",
                next_in_secs = interval.as_secs(),
                "poller tick done"
            );
        }
    })
}
