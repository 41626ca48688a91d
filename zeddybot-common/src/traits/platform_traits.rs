use crate::models::stats::GuildRoster;

#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionStatus {
    Connected,
    Disconnected,
    Reconnecting,
    Error(String),
}

/// Read access to the authoritative member list of the tracked guild.
/// Returns `None` while the list is unavailable (not yet received, or the
/// guild is unknown).
pub trait RosterSource: Send + Sync {
    fn roster(&self) -> Option<GuildRoster>;
}
