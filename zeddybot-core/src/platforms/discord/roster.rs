use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, info};
use twilight_cache_inmemory::{InMemoryCache, ResourceType};
use twilight_model::gateway::presence::Status;
use twilight_model::id::Id;
use twilight_model::id::marker::{GuildMarker, UserMarker};

use zeddybot_common::models::{GuildRoster, RosterMember};
use zeddybot_common::traits::platform_traits::{ConnectionStatus, RosterSource};

/// Roster view over the gateway's in-memory cache.
///
/// The tracked guild is the configured id when there is one, otherwise the
/// first guild announced in READY.
pub struct DiscordRoster {
    cache: Arc<InMemoryCache>,
    configured_guild: Option<Id<GuildMarker>>,
    ready_guild: RwLock<Option<Id<GuildMarker>>>,
    status: RwLock<ConnectionStatus>,
}

impl DiscordRoster {
    pub fn new(configured_guild: Option<u64>) -> Self {
        let cache = InMemoryCache::builder()
            .resource_types(
                ResourceType::GUILD | ResourceType::MEMBER | ResourceType::PRESENCE | ResourceType::USER,
            )
            .build();

        Self {
            cache: Arc::new(cache),
            configured_guild: configured_guild.and_then(Id::new_checked),
            ready_guild: RwLock::new(None),
            status: RwLock::new(ConnectionStatus::Disconnected),
        }
    }

    pub fn cache(&self) -> Arc<InMemoryCache> {
        self.cache.clone()
    }

    pub fn tracked_guild(&self) -> Option<Id<GuildMarker>> {
        self.configured_guild.or(*self.ready_guild.read())
    }

    /// Remembers the first READY guild; later calls are ignored.
    pub fn note_ready_guild(&self, guild_id: Id<GuildMarker>) {
        let mut slot = self.ready_guild.write();
        if slot.is_none() {
            if self.configured_guild.is_none() {
                info!("No discord_guild_id configured; tracking guild {guild_id}");
            }
            *slot = Some(guild_id);
        }
    }

    pub fn set_status(&self, status: ConnectionStatus) {
        *self.status.write() = status;
    }

    pub fn status(&self) -> ConnectionStatus {
        self.status.read().clone()
    }

    fn member(&self, guild_id: Id<GuildMarker>, user_id: Id<UserMarker>) -> RosterMember {
        let is_bot = self.cache.user(user_id).map(|u| u.bot).unwrap_or(false);
        let online = self
            .cache
            .presence(guild_id, user_id)
            .map(|p| !matches!(p.status(), Status::Offline | Status::Invisible))
            .unwrap_or(false);

        RosterMember {
            user_id: user_id.to_string(),
            is_bot,
            online,
        }
    }
}

impl RosterSource for DiscordRoster {
    /// `None` unless the shard is connected; the cache goes stale while the
    /// gateway is down.
    fn roster(&self) -> Option<GuildRoster> {
        if self.status() != ConnectionStatus::Connected {
            return None;
        }
        let guild_id = self.tracked_guild()?;

        let (guild_name, member_count) = {
            let guild = self.cache.guild(guild_id)?;
            (guild.name().to_string(), guild.member_count())
        };

        let user_ids: Vec<Id<UserMarker>> = self
            .cache
            .guild_members(guild_id)?
            .iter()
            .copied()
            .collect();

        let members: Vec<RosterMember> = user_ids
            .into_iter()
            .map(|uid| self.member(guild_id, uid))
            .collect();

        debug!(
            "roster for {guild_name}: {} cached members, reported count {:?}",
            members.len(),
            member_count
        );

        Some(GuildRoster {
            guild_name,
            member_count,
            members,
        })
    }
}
