// zeddybot-core/src/tasks/heartbeat.rs

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::hub::LiveUpdateHub;

/// Spawns a background task that heartbeats every hub subscriber and reaps
/// the ones that stopped reading.
pub fn spawn_heartbeat_task(
    hub: LiveUpdateHub,
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
                    let reaped = hub.heartbeat();
                    if reaped > 0 {
                        info!("Heartbeat removed {reaped} unresponsive subscriber(s)");
                    } else {
                        debug!("Heartbeat sent to {} subscriber(s)", hub.subscriber_count());
                    }
                }
            }
        }
        debug!("Heartbeat task stopped");
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hub::HubMessage;

    #[tokio::test(start_paused = true)]
    async fn test_subscriber_receives_heartbeats() {
        let hub = LiveUpdateHub::new(4, 3);
        let mut sub = hub.subscribe();
        let cancel = CancellationToken::new();
        let handle = spawn_heartbeat_task(hub.clone(), Duration::from_secs(15), cancel.clone());

        assert_eq!(sub.recv().await, Some(HubMessage::Heartbeat));
        cancel.cancel();
        handle.await.unwrap();
    }
}
