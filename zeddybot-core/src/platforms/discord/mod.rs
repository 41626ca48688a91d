pub mod roster;
pub mod runtime;

pub use roster::DiscordRoster;
pub use runtime::{DiscordRuntime, translate_event};
