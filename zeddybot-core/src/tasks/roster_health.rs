// zeddybot-core/src/tasks/roster_health.rs

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::cache::StatsCache;

/// Periodic full recompute while connected, to pick up changes the gateway
/// never announced (e.g. presence updates suppressed for large guilds).
pub fn spawn_roster_health_task(
    stats: Arc<StatsCache>,
    period: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    trace!("Roster health check");
                    // The cache ignores this while the upstream is down.
                    stats.resync();
                }
            }
        }
        debug!("Roster health task stopped");
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::helpers::{StaticRoster, roster_of};

    #[tokio::test(start_paused = true)]
    async fn test_resyncs_only_while_connected() {
        let roster = Arc::new(StaticRoster::default());
        roster.set(Some(roster_of("drifters", 5, 0, 1)));
        let stats = Arc::new(StatsCache::new(roster.clone()));
        let cancel = CancellationToken::new();
        let handle = spawn_roster_health_task(stats.clone(), Duration::from_secs(60), cancel.clone());

        // Never connected: no recompute.
        tokio::time::sleep(Duration::from_secs(61)).await;
        assert!(stats.read().last_updated.is_none());

        stats.mark_connected();
        assert_eq!(stats.read().total_count, 5);
        roster.set(Some(roster_of("drifters", 6, 0, 1)));
        let mut rx = stats.watch();
        rx.borrow_and_update();
        tokio::time::sleep(Duration::from_secs(60)).await;
        rx.changed().await.unwrap();
        assert_eq!(stats.read().total_count, 6);

        // Down again: later ticks leave the stale counts alone.
        stats.mark_disconnected();
        roster.set(Some(roster_of("drifters", 8, 0, 1)));
        tokio::time::sleep(Duration::from_secs(120)).await;
        let snap = stats.read();
        assert!(!snap.connected);
        assert_eq!(snap.total_count, 6);

        cancel.cancel();
        handle.await.unwrap();
    }
}
