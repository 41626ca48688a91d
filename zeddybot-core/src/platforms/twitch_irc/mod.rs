pub mod client;
pub mod reader;
pub mod sender;

pub use client::ParsedTwitchMsg;
pub use reader::TwitchChatReader;
pub use sender::TwitchIrcSender;

pub const TWITCH_IRC_HOST: &str = "irc.chat.twitch.tv";
pub const TWITCH_IRC_TLS_PORT: u16 = 6697;
