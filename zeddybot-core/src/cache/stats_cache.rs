// File: src/cache/stats_cache.rs

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::watch;
use tracing::{debug, info, trace};

use zeddybot_common::models::{PlatformEvent, StatsSnapshot};
use zeddybot_common::traits::RosterSource;

/// Latest guild counts, recomputed from the roster whenever membership or
/// presence changes.
///
/// Readers get an `Arc` to an immutable snapshot; writers swap in a whole new
/// one, so a read never observes a half-applied update.
///
/// The upstream link state lives here too. Recomputes and link transitions
/// both run under `link_up`, so a recompute can never relabel stale counts as
/// connected after `mark_disconnected` has run.
pub struct StatsCache {
    source: Arc<dyn RosterSource>,
    tx: watch::Sender<Arc<StatsSnapshot>>,
    link_up: Mutex<bool>,
}

impl StatsCache {
    pub fn new(source: Arc<dyn RosterSource>) -> Self {
        let (tx, _rx) = watch::channel(Arc::new(StatsSnapshot::disconnected()));
        Self {
            source,
            tx,
            link_up: Mutex::new(false),
        }
    }

    /// Applies one platform event. Only membership and presence changes
    /// trigger a recompute; everything else is ignored here.
    pub fn update(&self, event: &PlatformEvent) {
        if !event.affects_roster() {
            return;
        }
        self.recompute(event.event_type());
    }

    /// One explicit full recompute. A no-op while the upstream is down.
    pub fn resync(&self) {
        self.recompute("resync");
    }

    /// Records that the upstream is (re)established and recomputes.
    pub fn mark_connected(&self) {
        let mut link_up = self.link_up.lock();
        if !*link_up {
            info!("Stats upstream connected");
        }
        *link_up = true;
        self.recompute_locked(&link_up, "connected");
    }

    /// Keeps the last counts but flags them stale.
    pub fn mark_disconnected(&self) {
        let mut link_up = self.link_up.lock();
        *link_up = false;
        self.tx.send_if_modified(|current| {
            if !current.connected {
                return false;
            }
            *current = Arc::new(current.as_disconnected());
            true
        });
        info!("Stats marked stale: upstream connection lost");
    }

    pub fn is_connected(&self) -> bool {
        *self.link_up.lock()
    }

    pub fn read(&self) -> Arc<StatsSnapshot> {
        self.tx.borrow().clone()
    }

    pub fn watch(&self) -> watch::Receiver<Arc<StatsSnapshot>> {
        self.tx.subscribe()
    }

    fn recompute(&self, reason: &str) {
        let link_up = self.link_up.lock();
        self.recompute_locked(&link_up, reason);
    }

    fn recompute_locked(&self, link_up: &bool, reason: &str) {
        if !*link_up {
            trace!("Recompute skipped ({reason}): upstream down");
            return;
        }
        let Some(roster) = self.source.roster() else {
            debug!("Roster unavailable ({reason}); keeping previous stats");
            return;
        };
        let snapshot = StatsSnapshot::from_roster(&roster);
        debug!(
            "Stats recomputed ({reason}): total={} humans={} online={}",
            snapshot.total_count, snapshot.human_count, snapshot.online_count
        );
        self.tx.send_replace(Arc::new(snapshot));
    }
}
