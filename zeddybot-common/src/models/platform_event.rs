use crate::models::chat::ChatEvent;

/// Everything the core cares about from the chat/stream platforms,
/// independent of the SDK that produced it.
#[derive(Debug, Clone, PartialEq)]
pub enum PlatformEvent {
    MemberJoined { user_id: String },
    MemberLeft { user_id: String },
    PresenceChanged { user_id: String },
    MessageReceived(ChatEvent),

    /// The upstream gateway is (re)connected and the roster can be trusted again.
    Connected,
    /// The upstream gateway went away; counts become stale.
    Disconnected,
}

impl PlatformEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            PlatformEvent::MemberJoined { .. } => "member.joined",
            PlatformEvent::MemberLeft { .. } => "member.left",
            PlatformEvent::PresenceChanged { .. } => "presence.changed",
            PlatformEvent::MessageReceived(_) => "chat.message",
            PlatformEvent::Connected => "gateway.connected",
            PlatformEvent::Disconnected => "gateway.disconnected",
        }
    }

    /// Membership and presence changes trigger a stats recompute.
    pub fn affects_roster(&self) -> bool {
        matches!(
            self,
            PlatformEvent::MemberJoined { .. }
                | PlatformEvent::MemberLeft { .. }
                | PlatformEvent::PresenceChanged { .. }
        )
    }
}
