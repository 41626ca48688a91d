//! Anonymous read-only chat connection that feeds `PlatformEvent::MessageReceived`.

use std::io;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, BufReader};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use zeddybot_common::models::PlatformEvent;

use super::client::{ParsedTwitchMsg, connect_tls, write_line};
use super::{TWITCH_IRC_HOST, TWITCH_IRC_TLS_PORT};

const RECONNECT_DELAY: Duration = Duration::from_secs(5);

/// How a chat session ended.
#[derive(Debug, PartialEq, Eq)]
pub enum SessionEnd {
    Cancelled,
    /// Server closed the stream; reconnect.
    Closed,
    /// The event consumer is gone; stop for good.
    ConsumerGone,
}

pub struct TwitchChatReader {
    channel: String,
    host: String,
    port: u16,
}

impl TwitchChatReader {
    /// `channel` must already carry the leading `#`.
    pub fn new(channel: impl Into<String>) -> Self {
        Self {
            channel: channel.into(),
            host: TWITCH_IRC_HOST.to_string(),
            port: TWITCH_IRC_TLS_PORT,
        }
    }

    /// Connects, reads until the stream ends, waits, reconnects. Returns when
    /// `cancel` fires or the receiver side of `events` is dropped.
    pub async fn run(self, events: mpsc::Sender<PlatformEvent>, cancel: CancellationToken) {
        info!("Twitch chat reader starting for {}", self.channel);
        loop {
            let stream = tokio::select! {
                _ = cancel.cancelled() => break,
                res = connect_tls(&self.host, self.port) => res,
            };

            match stream {
                Ok(stream) => {
                    let nick = anonymous_nick();
                    match run_session(stream, &nick, &self.channel, &events, &cancel).await {
                        Ok(SessionEnd::Cancelled) | Ok(SessionEnd::ConsumerGone) => break,
                        Ok(SessionEnd::Closed) => warn!("Twitch IRC connection closed by server"),
                        Err(e) => error!("Twitch IRC read error: {e}"),
                    }
                }
                Err(e) => error!("Twitch IRC connect failed: {e}"),
            }

            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(RECONNECT_DELAY) => {}
            }
        }
        info!("Twitch chat reader stopped");
    }
}

/// Anonymous logins use `justinfanNNNN` and need no PASS.
fn anonymous_nick() -> String {
    let n = uuid::Uuid::new_v4().as_u128() % 90_000 + 10_000;
    format!("justinfan{n}")
}

/// Logs in, joins `channel` and forwards every PRIVMSG until the stream closes.
pub async fn run_session<S>(
    stream: S,
    nick: &str,
    channel: &str,
    events: &mpsc::Sender<PlatformEvent>,
    cancel: &CancellationToken,
) -> io::Result<SessionEnd>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let (read_half, mut write_half) = tokio::io::split(stream);

    write_line(&mut write_half, "CAP REQ :twitch.tv/tags").await?;
    write_line(&mut write_half, &format!("NICK {nick}")).await?;
    write_line(&mut write_half, &format!("JOIN {channel}")).await?;

    let mut lines = BufReader::new(read_half).lines();
    loop {
        let line = tokio::select! {
            _ = cancel.cancelled() => return Ok(SessionEnd::Cancelled),
            line = lines.next_line() => line?,
        };
        let Some(line) = line else {
            return Ok(SessionEnd::Closed);
        };
        trace!("<< {}", line);

        let msg = ParsedTwitchMsg::parse_irc_line(&line);
        match msg.command.as_str() {
            "PING" => {
                let payload = msg.trailing.as_deref().unwrap_or("tmi.twitch.tv");
                write_line(&mut write_half, &format!("PONG :{payload}")).await?;
            }
            "RECONNECT" => {
                info!("Twitch asked the reader to reconnect");
                return Ok(SessionEnd::Closed);
            }
            "PRIVMSG" => {
                if let Some(evt) = msg.to_chat_event() {
                    if events.send(PlatformEvent::MessageReceived(evt)).await.is_err() {
                        return Ok(SessionEnd::ConsumerGone);
                    }
                }
            }
            "JOIN" => debug!("joined {}", channel),
            _ => {}
        }
    }
}
