pub mod auth;

pub use auth::TwitchTokenAuthority;
