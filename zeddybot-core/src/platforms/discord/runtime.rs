use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use twilight_gateway::{Event, EventTypeFlags, Intents, Shard, ShardId, StreamExt};
use twilight_model::gateway::payload::outgoing::RequestGuildMembers;
use twilight_model::id::Id;
use twilight_model::id::marker::GuildMarker;

use zeddybot_common::models::PlatformEvent;
use zeddybot_common::traits::platform_traits::ConnectionStatus;

use super::roster::DiscordRoster;

/// Gateway events that carry roster data, plus lifecycle. `GatewayClose`
/// is always delivered and has no flag.
fn event_flags() -> EventTypeFlags {
    EventTypeFlags::READY
        | EventTypeFlags::RESUMED
        | EventTypeFlags::GUILD_CREATE
        | EventTypeFlags::GUILD_UPDATE
        | EventTypeFlags::MEMBER_ADD
        | EventTypeFlags::MEMBER_REMOVE
        | EventTypeFlags::MEMBER_UPDATE
        | EventTypeFlags::MEMBER_CHUNK
        | EventTypeFlags::PRESENCE_UPDATE
}

/// Maps a gateway event to the platform-neutral event the core consumes.
/// Membership events for guilds other than `tracked` are dropped.
pub fn translate_event(event: &Event, tracked: Option<Id<GuildMarker>>) -> Option<PlatformEvent> {
    let is_tracked = |guild_id: Id<GuildMarker>| tracked.is_none_or(|t| t == guild_id);

    match event {
        Event::Ready(_) | Event::Resumed => Some(PlatformEvent::Connected),
        Event::GatewayClose(_) => Some(PlatformEvent::Disconnected),
        Event::GuildCreate(guild) if is_tracked(guild.id()) => Some(PlatformEvent::Connected),
        Event::MemberChunk(chunk) if is_tracked(chunk.guild_id) => {
            // Recompute once the whole member list has arrived.
            (chunk.chunk_index + 1 == chunk.chunk_count).then_some(PlatformEvent::Connected)
        }
        Event::MemberAdd(m) if is_tracked(m.guild_id) => Some(PlatformEvent::MemberJoined {
            user_id: m.member.user.id.to_string(),
        }),
        Event::MemberRemove(m) if is_tracked(m.guild_id) => Some(PlatformEvent::MemberLeft {
            user_id: m.user.id.to_string(),
        }),
        Event::MemberUpdate(m) if is_tracked(m.guild_id) => Some(PlatformEvent::PresenceChanged {
            user_id: m.user.id.to_string(),
        }),
        Event::PresenceUpdate(p) if is_tracked(p.0.guild_id) => Some(PlatformEvent::PresenceChanged {
            user_id: p.0.user.id().to_string(),
        }),
        _ => None,
    }
}

pub struct DiscordRuntime {
    token: String,
    roster: Arc<DiscordRoster>,
}

impl DiscordRuntime {
    pub fn new(token: impl Into<String>, roster: Arc<DiscordRoster>) -> Self {
        Self {
            token: token.into(),
            roster,
        }
    }

    /// Runs one shard until cancelled. The cache is updated before each
    /// event is translated so a recompute triggered by the event sees it.
    pub async fn run(self, events: mpsc::Sender<PlatformEvent>, cancel: CancellationToken) {
        let intents = Intents::GUILDS | Intents::GUILD_MEMBERS | Intents::GUILD_PRESENCES;
        let mut shard = Shard::new(ShardId::ONE, self.token.clone(), intents);
        let cache = self.roster.cache();
        let shard_id = shard.id().number();

        info!("(ShardRunner) Shard {shard_id} started. Listening for events.");
        self.roster.set_status(ConnectionStatus::Reconnecting);

        loop {
            let item = tokio::select! {
                _ = cancel.cancelled() => break,
                item = shard.next_event(event_flags()) => item,
            };
            let Some(item) = item else {
                break;
            };

            let event = match item {
                Ok(event) => event,
                Err(err) => {
                    warn!("Shard {shard_id} => error receiving event: {err:?}");
                    continue;
                }
            };

            cache.update(&event);

            match &event {
                Event::Ready(ready) => {
                    info!("Shard {shard_id} => READY as {} (ID={})", ready.user.name, ready.user.id);
                    if let Some(first) = ready.guilds.first() {
                        self.roster.note_ready_guild(first.id);
                    }
                    self.roster.set_status(ConnectionStatus::Connected);
                }
                Event::Resumed => self.roster.set_status(ConnectionStatus::Connected),
                Event::GatewayClose(frame) => {
                    warn!("Shard {shard_id} => gateway closed: {frame:?}");
                    self.roster.set_status(ConnectionStatus::Reconnecting);
                }
                Event::GuildCreate(guild) if Some(guild.id()) == self.roster.tracked_guild() => {
                    // GUILD_CREATE only carries part of a large member list.
                    let request = RequestGuildMembers::builder(guild.id())
                        .presences(true)
                        .query("", None);
                    shard.command(&request);
                    debug!("Shard {shard_id} => requested member chunks for {}", guild.id());
                }
                _ => trace!("Shard {shard_id} => event {:?}", event.kind()),
            }

            if let Some(evt) = translate_event(&event, self.roster.tracked_guild()) {
                if events.send(evt).await.is_err() {
                    error!("Shard {shard_id} => event consumer gone, stopping");
                    break;
                }
            }
        }

        self.roster.set_status(ConnectionStatus::Disconnected);
        if events.send(PlatformEvent::Disconnected).await.is_err() {
            debug!("Shard {shard_id} => no consumer left for the final disconnect");
        }
        warn!("(ShardRunner) Shard {shard_id} event loop ended.");
    }
}
