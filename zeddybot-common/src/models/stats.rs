use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One member as seen in the authoritative member list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RosterMember {
    pub user_id: String,
    pub is_bot: bool,
    pub online: bool,
}

/// Full member list of the tracked guild at one instant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuildRoster {
    pub guild_name: String,
    /// Member count as reported by the platform; may exceed `members.len()`
    /// when the member list is not fully chunked.
    pub member_count: Option<u64>,
    pub members: Vec<RosterMember>,
}

/// Aggregate guild counts shown on the dashboard.
///
/// Never mutated after construction: the stats cache swaps in a new value.
/// `last_updated` is `None` until the first successful recompute, which lets
/// readers tell "never connected" apart from "connected, then dropped".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    #[serde(rename = "total_members")]
    pub total_count: u64,
    #[serde(rename = "total_humans")]
    pub human_count: u64,
    #[serde(rename = "online_members")]
    pub online_count: u64,
    #[serde(rename = "bot_connected")]
    pub connected: bool,
    #[serde(rename = "guild_name")]
    pub source_name: String,
    pub last_updated: Option<DateTime<Utc>>,
}

impl StatsSnapshot {
    /// The process-start value: zero counts, not connected.
    pub fn disconnected() -> Self {
        Self {
            total_count: 0,
            human_count: 0,
            online_count: 0,
            connected: false,
            source_name: String::new(),
            last_updated: None,
        }
    }

    pub fn from_roster(roster: &GuildRoster) -> Self {
        let human_count = roster.members.iter().filter(|m| !m.is_bot).count() as u64;
        let online_count = roster
            .members
            .iter()
            .filter(|m| !m.is_bot && m.online)
            .count() as u64;
        let total_count = roster
            .member_count
            .unwrap_or(roster.members.len() as u64);

        Self {
            total_count,
            human_count,
            online_count,
            connected: true,
            source_name: roster.guild_name.clone(),
            last_updated: Some(Utc::now()),
        }
    }

    /// Same counts, labeled stale.
    pub fn as_disconnected(&self) -> Self {
        Self {
            connected: false,
            ..self.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn member(id: usize, is_bot: bool, online: bool) -> RosterMember {
        RosterMember { user_id: id.to_string(), is_bot, online }
    }

    #[test]
    fn counts_exclude_bots_from_humans_and_online() {
        let roster = GuildRoster {
            guild_name: "drifters".into(),
            member_count: None,
            members: vec![
                member(1, false, true),
                member(2, false, false),
                member(3, true, true),
            ],
        };
        let snap = StatsSnapshot::from_roster(&roster);
        assert_eq!(snap.total_count, 3);
        assert_eq!(snap.human_count, 2);
        assert_eq!(snap.online_count, 1);
        assert!(snap.connected);
        assert!(snap.last_updated.is_some());
    }

    #[test]
    fn serializes_with_dashboard_field_names() {
        let json = serde_json::to_value(StatsSnapshot::disconnected()).unwrap();
        for key in ["total_members", "total_humans", "online_members", "bot_connected", "guild_name", "last_updated"] {
            assert!(json.get(key).is_some(), "missing {key}");
        }
        assert_eq!(json["bot_connected"], false);
    }
}
