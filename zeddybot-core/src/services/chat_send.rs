// File: src/services/chat_send.rs

use std::str::FromStr;
use std::sync::Arc;

use tracing::{error, info, warn};

use crate::Error;
use crate::auth::TokenManager;
use crate::platforms::{ChatSender, SendFailure};

pub const TOKEN_REFRESHED_RETRY: &str = "token was expired and refreshed, please try again";
pub const CHAT_TEST_OK: &str = "Chat connection test successful (authenticated bot)";
pub const CHAT_TEST_REJECTED: &str = "Authentication failed - token was refreshed, test again";

/// Canned lines behind the dashboard's quick-message buttons.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuickMessage {
    Welcome,
    Follow,
    Brb,
    Ending,
    Lurk,
}

impl QuickMessage {
    pub fn text(self) -> &'static str {
        match self {
            QuickMessage::Welcome => "Welcome everyone! Thanks for stopping by! 🎮",
            QuickMessage::Follow => "Thanks for the follow! Really appreciate the support! ❤️",
            QuickMessage::Brb => "Be right back in a few minutes! Don't go anywhere! ⏰",
            QuickMessage::Ending => "Thanks for watching! Stream ending soon, catch you next time! 👋",
            QuickMessage::Lurk => "Thanks for lurking! Appreciate you being here! 👀",
        }
    }
}

impl FromStr for QuickMessage {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "welcome" => Ok(QuickMessage::Welcome),
            "follow" => Ok(QuickMessage::Follow),
            "brb" => Ok(QuickMessage::Brb),
            "ending" => Ok(QuickMessage::Ending),
            "lurk" => Ok(QuickMessage::Lurk),
            _ => Err(Error::InvalidRequest("Invalid message type".into())),
        }
    }
}

/// Posts dashboard-originated lines into the stream chat as the bot.
pub struct ChatSendService {
    tokens: Arc<TokenManager>,
    sender: Arc<dyn ChatSender>,
    channel: Option<String>,
}

impl ChatSendService {
    /// `channel` is the IRC form (`#name`), or `None` when not configured.
    pub fn new(tokens: Arc<TokenManager>, sender: Arc<dyn ChatSender>, channel: Option<String>) -> Self {
        Self { tokens, sender, channel }
    }

    pub async fn send(&self, message: &str) -> Result<(), Error> {
        let message = message.trim();
        if message.is_empty() {
            return Err(Error::InvalidRequest("Message cannot be empty".into()));
        }
        if message.contains(['\r', '\n']) {
            return Err(Error::InvalidRequest("Message must be a single line".into()));
        }
        let channel = self
            .channel
            .as_deref()
            .ok_or_else(|| Error::Config("Missing target_channel in config".into()))?;

        let token = self.tokens.get_valid_token().await?;

        match self.sender.send_message(&token, channel, message).await {
            Ok(()) => {
                info!("Sent chat line to {channel}");
                Ok(())
            }
            Err(SendFailure::TokenRejected) => {
                warn!("Chat server rejected the bot token; refreshing");
                self.tokens.invalidate(&token).await?;
                Err(Error::ChatSend(TOKEN_REFRESHED_RETRY.into()))
            }
            Err(SendFailure::Transport(msg)) => {
                error!("Chat send to {channel} failed: {msg}");
                Err(Error::ChatSend(msg))
            }
        }
    }

    /// Checks that the chat server accepts the stored bot token. A rejected
    /// token is invalidated so the next call starts from a refreshed one.
    /// Returns a human-readable success line.
    pub async fn test_connection(&self) -> Result<&'static str, Error> {
        if self.channel.is_none() {
            return Err(Error::Config("Missing target_channel in config".into()));
        }
        let token = self.tokens.get_valid_token().await?;

        match self.sender.check_login(&token).await {
            Ok(()) => {
                info!("Chat connection test passed");
                Ok(CHAT_TEST_OK)
            }
            Err(SendFailure::TokenRejected) => {
                warn!("Chat connection test: bot token rejected; refreshing");
                self.tokens.invalidate(&token).await?;
                Err(Error::ChatSend(CHAT_TEST_REJECTED.into()))
            }
            Err(SendFailure::Transport(msg)) => {
                error!("Chat connection test failed: {msg}");
                Err(Error::ChatSend(format!("Connection test failed: {msg}")))
            }
        }
    }

    /// Sends the canned text and returns it.
    pub async fn send_quick(&self, kind: QuickMessage) -> Result<&'static str, Error> {
        let text = kind.text();
        self.send(text).await?;
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use mockall::predicate::*;

    use super::*;
    use crate::platforms::MockChatSender;
    use crate::test_utils::helpers::{InMemoryCredentialStore, ScriptedAuthority};
    use zeddybot_common::error::AuthError;
    use zeddybot_common::models::CredentialRecord;

    fn manager(authority: Arc<ScriptedAuthority>) -> (Arc<InMemoryCredentialStore>, Arc<TokenManager>) {
        let store = Arc::new(InMemoryCredentialStore::with_record(CredentialRecord::new("A1", "R1")));
        let tm = Arc::new(TokenManager::new(store.clone(), authority, Duration::from_secs(1)));
        (store, tm)
    }

    #[tokio::test]
    async fn test_send_uses_fresh_token() {
        let authority = Arc::new(ScriptedAuthority::new());
        authority.accept("A1");
        let (_store, tm) = manager(authority);

        let mut sender = MockChatSender::new();
        sender
            .expect_send_message()
            .with(eq("A1"), eq("#zeddytv"), eq("hello"))
            .times(1)
            .returning(|_, _, _| Ok(()));

        let svc = ChatSendService::new(tm, Arc::new(sender), Some("#zeddytv".into()));
        svc.send("  hello ").await.unwrap();
    }

    #[tokio::test]
    async fn test_rejected_token_triggers_refresh_and_explicit_error() {
        let authority = Arc::new(ScriptedAuthority::new());
        authority.accept("A1");
        authority.push_grant("A2", "R2");
        let (store, tm) = manager(authority.clone());

        let mut sender = MockChatSender::new();
        sender
            .expect_send_message()
            .times(1)
            .returning(|_, _, _| Err(SendFailure::TokenRejected));

        let svc = ChatSendService::new(tm, Arc::new(sender), Some("#zeddytv".into()));
        let err = svc.send("hi").await.unwrap_err();
        assert!(err.to_string().contains(TOKEN_REFRESHED_RETRY));
        assert_eq!(authority.refresh_calls(), 1);
        assert_eq!(store.snapshot().unwrap().access_token, "A2");
    }

    #[tokio::test]
    async fn test_empty_message_and_missing_channel_never_send() {
        let authority = Arc::new(ScriptedAuthority::new());
        let (_store, tm) = manager(authority);
        let mut sender = MockChatSender::new();
        sender.expect_send_message().never();
        let sender = Arc::new(sender);

        let svc = ChatSendService::new(tm.clone(), sender.clone(), Some("#zeddytv".into()));
        assert!(matches!(svc.send("   ").await, Err(Error::InvalidRequest(_))));

        let svc = ChatSendService::new(tm, sender, None);
        assert!(matches!(svc.send("hi").await, Err(Error::Config(_))));
    }

    #[tokio::test]
    async fn test_auth_failure_propagates() {
        let authority = Arc::new(ScriptedAuthority::new());
        let (_store, tm) = manager(authority);
        let mut sender = MockChatSender::new();
        sender.expect_send_message().never();

        let svc = ChatSendService::new(tm, Arc::new(sender), Some("#zeddytv".into()));
        let err = svc.send("hi").await.unwrap_err();
        assert!(matches!(err, Error::Auth(AuthError::RefreshFailed { .. })));
    }

    #[tokio::test]
    async fn test_quick_message_sends_canned_text() {
        let authority = Arc::new(ScriptedAuthority::new());
        authority.accept("A1");
        let (_store, tm) = manager(authority);

        let mut sender = MockChatSender::new();
        sender
            .expect_send_message()
            .with(always(), always(), eq(QuickMessage::Lurk.text()))
            .times(1)
            .returning(|_, _, _| Ok(()));

        let svc = ChatSendService::new(tm, Arc::new(sender), Some("#zeddytv".into()));
        let kind: QuickMessage = "lurk".parse().unwrap();
        assert_eq!(svc.send_quick(kind).await.unwrap(), QuickMessage::Lurk.text());
        assert!("dance".parse::<QuickMessage>().is_err());
    }

    #[tokio::test]
    async fn test_line_breaks_never_reach_sender() {
        let authority = Arc::new(ScriptedAuthority::new());
        authority.accept("A1");
        let (_store, tm) = manager(authority.clone());
        let mut sender = MockChatSender::new();
        sender.expect_send_message().never();

        let svc = ChatSendService::new(tm, Arc::new(sender), Some("#zeddytv".into()));
        for text in ["hi\r\nPRIVMSG #elsewhere :spam", "two\nlines", "carriage\rreturn"] {
            assert!(matches!(svc.send(text).await, Err(Error::InvalidRequest(_))));
        }
        assert_eq!(authority.validate_calls(), 0);
    }

    #[tokio::test]
    async fn test_connection_check_passes_with_valid_token() {
        let authority = Arc::new(ScriptedAuthority::new());
        authority.accept("A1");
        let (_store, tm) = manager(authority);

        let mut sender = MockChatSender::new();
        sender.expect_check_login().with(eq("A1")).times(1).returning(|_| Ok(()));
        sender.expect_send_message().never();

        let svc = ChatSendService::new(tm, Arc::new(sender), Some("#zeddytv".into()));
        assert_eq!(svc.test_connection().await.unwrap(), CHAT_TEST_OK);
    }

    #[tokio::test]
    async fn test_connection_check_rejected_token_is_refreshed() {
        let authority = Arc::new(ScriptedAuthority::new());
        authority.accept("A1");
        authority.push_grant("A2", "R2");
        let (store, tm) = manager(authority.clone());

        let mut sender = MockChatSender::new();
        sender
            .expect_check_login()
            .times(1)
            .returning(|_| Err(SendFailure::TokenRejected));

        let svc = ChatSendService::new(tm, Arc::new(sender), Some("#zeddytv".into()));
        let err = svc.test_connection().await.unwrap_err();
        assert!(err.to_string().contains(CHAT_TEST_REJECTED));
        assert_eq!(store.snapshot().unwrap().access_token, "A2");
    }

    #[tokio::test]
    async fn test_connection_check_needs_channel() {
        let authority = Arc::new(ScriptedAuthority::new());
        let (_store, tm) = manager(authority);
        let mut sender = MockChatSender::new();
        sender.expect_check_login().never();

        let svc = ChatSendService::new(tm, Arc::new(sender), None);
        assert!(matches!(svc.test_connection().await, Err(Error::Config(_))));
    }
}
