// File: src/services/event_ingest.rs

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace};

use zeddybot_common::models::PlatformEvent;

use crate::cache::{ChatBacklog, StatsCache};
use crate::hub::LiveUpdateHub;

/// Routes platform events to the stats cache, the chat backlog and the live
/// hub. Runs as a single task so updates are applied in arrival order.
pub struct EventIngestor {
    stats: Arc<StatsCache>,
    hub: LiveUpdateHub,
    backlog: Arc<ChatBacklog>,
}

impl EventIngestor {
    pub fn new(stats: Arc<StatsCache>, hub: LiveUpdateHub, backlog: Arc<ChatBacklog>) -> Self {
        Self { stats, hub, backlog }
    }

    pub fn handle(&self, event: PlatformEvent) {
        trace!("ingest {}", event.event_type());
        match event {
            PlatformEvent::MessageReceived(chat) => {
                self.backlog.push(chat.clone());
                let delivered = self.hub.publish(chat);
                trace!("chat line delivered to {delivered} subscriber(s)");
            }
            PlatformEvent::Connected => self.stats.mark_connected(),
            PlatformEvent::Disconnected => self.stats.mark_disconnected(),
            other => self.stats.update(&other),
        }
    }

    /// Consumes events until the channel closes or `cancel` fires.
    pub async fn run(self, mut rx: mpsc::Receiver<PlatformEvent>, cancel: CancellationToken) {
        info!("Event ingestor started");
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!("Event ingestor cancelled");
                    break;
                }
                maybe = rx.recv() => match maybe {
                    Some(event) => self.handle(event),
                    None => {
                        debug!("Event channel closed");
                        break;
                    }
                },
            }
        }
        info!("Event ingestor stopped");
    }
}
