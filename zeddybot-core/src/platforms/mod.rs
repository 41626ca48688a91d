// File: src/platforms/mod.rs

use async_trait::async_trait;
use thiserror::Error;

pub use zeddybot_common::traits::platform_traits::{ConnectionStatus, RosterSource};

/// Why an outbound chat message did not go out.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SendFailure {
    /// The platform refused the access token we presented.
    #[error("access token rejected")]
    TokenRejected,
    #[error("{0}")]
    Transport(String),
}

/// Outbound chat on the streaming platform. The caller supplies a token it
/// obtained immediately before the call.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ChatSender: Send + Sync {
    async fn send_message(
        &self,
        access_token: &str,
        channel: &str,
        text: &str,
    ) -> Result<(), SendFailure>;

    /// Logs in without posting anything.
    async fn check_login(&self, access_token: &str) -> Result<(), SendFailure>;
}

pub mod discord;
pub mod twitch_helix;
pub mod twitch_irc;
