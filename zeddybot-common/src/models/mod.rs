pub mod chat;
pub mod credential;
pub mod platform_event;
pub mod stats;

pub use chat::ChatEvent;
pub use credential::{CredentialRecord, TokenGrant, TokenValidation};
pub use platform_event::PlatformEvent;
pub use stats::{GuildRoster, RosterMember, StatsSnapshot};
