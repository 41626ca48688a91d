//! Short-lived authenticated connections used to post one chat line or to
//! check that the bot token still logs in.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, BufReader, Lines};
use tokio::net::TcpStream;
use tokio_native_tls::TlsStream;
use tracing::{debug, info, trace};

use super::client::{ParsedTwitchMsg, connect_tls, write_line};
use super::{TWITCH_IRC_HOST, TWITCH_IRC_TLS_PORT};
use crate::platforms::{ChatSender, SendFailure};

const CONFIRM_TOKEN: &str = "zeddybot-send-confirm";

pub struct TwitchIrcSender {
    nick: String,
    host: String,
    port: u16,
    timeout: Duration,
}

impl TwitchIrcSender {
    pub fn new(bot_username: &str, timeout: Duration) -> Self {
        Self {
            nick: bot_username.to_lowercase(),
            host: TWITCH_IRC_HOST.to_string(),
            port: TWITCH_IRC_TLS_PORT,
            timeout,
        }
    }

    /// Runs `f` on a fresh TLS connection, bounded by the request timeout.
    async fn with_connection<F, Fut>(&self, f: F) -> Result<(), SendFailure>
    where
        F: FnOnce(TlsStream<TcpStream>) -> Fut,
        Fut: Future<Output = Result<(), SendFailure>>,
    {
        let attempt = async {
            let stream = connect_tls(&self.host, self.port)
                .await
                .map_err(|e| SendFailure::Transport(e.to_string()))?;
            f(stream).await
        };

        match tokio::time::timeout(self.timeout, attempt).await {
            Ok(res) => res,
            Err(_) => Err(SendFailure::Transport(format!(
                "timed out after {}s talking to Twitch IRC",
                self.timeout.as_secs()
            ))),
        }
    }
}

#[async_trait]
impl ChatSender for TwitchIrcSender {
    async fn send_message(&self, access_token: &str, channel: &str, text: &str) -> Result<(), SendFailure> {
        self.with_connection(|stream| send_over(stream, &self.nick, access_token, channel, text))
            .await
    }

    async fn check_login(&self, access_token: &str) -> Result<(), SendFailure> {
        self.with_connection(|stream| check_login_over(stream, &self.nick, access_token))
            .await
    }
}

fn io_err(e: std::io::Error) -> SendFailure {
    SendFailure::Transport(e.to_string())
}

/// PASS/NICK, then waits for the welcome numeric or an auth NOTICE.
async fn login<R, W>(
    lines: &mut Lines<BufReader<R>>,
    writer: &mut W,
    nick: &str,
    access_token: &str,
) -> Result<(), SendFailure>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let token = access_token.trim_start_matches("oauth:");
    write_line(writer, &format!("PASS oauth:{token}")).await.map_err(io_err)?;
    write_line(writer, &format!("NICK {nick}")).await.map_err(io_err)?;

    loop {
        let Some(line) = lines.next_line().await.map_err(io_err)? else {
            return Err(SendFailure::Transport("connection closed during login".into()));
        };
        trace!("<< {}", line);
        let msg = ParsedTwitchMsg::parse_irc_line(&line);
        if msg.is_auth_failure() {
            info!("Twitch IRC rejected the bot token");
            return Err(SendFailure::TokenRejected);
        }
        match msg.command.as_str() {
            "001" => return Ok(()),
            "PING" => {
                let payload = msg.trailing.as_deref().unwrap_or("tmi.twitch.tv");
                write_line(writer, &format!("PONG :{payload}")).await.map_err(io_err)?;
            }
            _ => {}
        }
    }
}

/// Logs in and leaves. Tells whether the chat server accepts the token.
pub async fn check_login_over<S>(stream: S, nick: &str, access_token: &str) -> Result<(), SendFailure>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let (read_half, mut write_half) = tokio::io::split(stream);
    let mut lines = BufReader::new(read_half).lines();
    login(&mut lines, &mut write_half, nick, access_token).await?;
    let _ = write_line(&mut write_half, "QUIT").await;
    debug!("chat login check passed for {nick}");
    Ok(())
}

/// Authenticates, joins and posts `text`, then waits for a PONG so the
/// PRIVMSG is known to have been read before the connection closes.
/// Text with a line break is refused before anything is written.
pub async fn send_over<S>(
    stream: S,
    nick: &str,
    access_token: &str,
    channel: &str,
    text: &str,
) -> Result<(), SendFailure>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    if text.contains(['\r', '\n']) {
        return Err(SendFailure::Transport("chat line contains a line break".into()));
    }

    let (read_half, mut write_half) = tokio::io::split(stream);
    let mut lines = BufReader::new(read_half).lines();

    login(&mut lines, &mut write_half, nick, access_token).await?;

    write_line(&mut write_half, &format!("JOIN {channel}")).await.map_err(io_err)?;
    write_line(&mut write_half, &format!("PRIVMSG {channel} :{text}")).await.map_err(io_err)?;
    write_line(&mut write_half, &format!("PING :{CONFIRM_TOKEN}")).await.map_err(io_err)?;

    loop {
        let Some(line) = lines.next_line().await.map_err(io_err)? else {
            return Err(SendFailure::Transport("connection closed before confirmation".into()));
        };
        let msg = ParsedTwitchMsg::parse_irc_line(&line);
        match msg.command.as_str() {
            "PONG" if msg.trailing.as_deref() == Some(CONFIRM_TOKEN) => break,
            "PING" => {
                let payload = msg.trailing.as_deref().unwrap_or("tmi.twitch.tv");
                write_line(&mut write_half, &format!("PONG :{payload}")).await.map_err(io_err)?;
            }
            "NOTICE" => debug!("Twitch NOTICE after send: {:?}", msg.trailing),
            _ => {}
        }
    }

    let _ = write_line(&mut write_half, "QUIT").await;
    debug!("sent chat line to {}", channel);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncWriteExt;

    async fn read_until(lines: &mut tokio::io::Lines<BufReader<tokio::io::ReadHalf<tokio::io::DuplexStream>>>, needle: &str) -> Vec<String> {
        let mut seen = Vec::new();
        while let Some(line) = lines.next_line().await.unwrap() {
            let done = line.starts_with(needle);
            seen.push(line);
            if done {
                break;
            }
        }
        seen
    }

    #[tokio::test]
    async fn test_send_over_happy_path() {
        let (client, server) = tokio::io::duplex(4096);
        let (server_read, mut server_write) = tokio::io::split(server);
        let mut server_lines = BufReader::new(server_read).lines();

        let send = tokio::spawn(async move {
            send_over(client, "zeddy_bot", "oauth:abc123", "#zeddytv", "hello chat").await
        });

        let login = read_until(&mut server_lines, "NICK").await;
        assert_eq!(login[0], "PASS oauth:abc123");
        server_write.write_all(b":tmi.twitch.tv 001 zeddy_bot :Welcome, GLHF!\r\n").await.unwrap();

        let rest = read_until(&mut server_lines, "PING").await;
        assert!(rest.contains(&"JOIN #zeddytv".to_string()));
        assert!(rest.contains(&"PRIVMSG #zeddytv :hello chat".to_string()));
        server_write
            .write_all(format!(":tmi.twitch.tv PONG tmi.twitch.tv :{CONFIRM_TOKEN}\r\n").as_bytes())
            .await
            .unwrap();

        assert_eq!(send.await.unwrap(), Ok(()));
    }

    #[tokio::test]
    async fn test_send_over_reports_rejected_token() {
        let (client, server) = tokio::io::duplex(4096);
        let (server_read, mut server_write) = tokio::io::split(server);
        let mut server_lines = BufReader::new(server_read).lines();

        let send = tokio::spawn(async move { send_over(client, "zeddy_bot", "expired", "#zeddytv", "hi").await });

        read_until(&mut server_lines, "NICK").await;
        server_write
            .write_all(b":tmi.twitch.tv NOTICE * :Login authentication failed\r\n")
            .await
            .unwrap();

        assert_eq!(send.await.unwrap(), Err(SendFailure::TokenRejected));
    }

    #[tokio::test]
    async fn test_send_over_closed_connection_is_transport_error() {
        let (client, server) = tokio::io::duplex(4096);
        drop(server);
        let res = send_over(client, "zeddy_bot", "t", "#c", "hi").await;
        assert!(matches!(res, Err(SendFailure::Transport(_))));
    }

    #[tokio::test]
    async fn test_send_over_refuses_line_breaks() {
        let (client, server) = tokio::io::duplex(4096);
        let (server_read, _server_write) = tokio::io::split(server);

        let res = send_over(client, "zeddy_bot", "abc123", "#zeddytv", "hi\r\nPRIVMSG #elsewhere :spam").await;
        assert!(matches!(res, Err(SendFailure::Transport(_))));

        // Nothing, not even the login, reached the wire.
        let mut server_lines = BufReader::new(server_read).lines();
        assert_eq!(server_lines.next_line().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_check_login_over_accepts_welcome() {
        let (client, server) = tokio::io::duplex(4096);
        let (server_read, mut server_write) = tokio::io::split(server);
        let mut server_lines = BufReader::new(server_read).lines();

        let check = tokio::spawn(async move { check_login_over(client, "zeddy_bot", "abc123").await });

        read_until(&mut server_lines, "NICK").await;
        server_write.write_all(b"PING :tmi.twitch.tv\r\n").await.unwrap();
        assert_eq!(read_until(&mut server_lines, "PONG").await, vec!["PONG :tmi.twitch.tv"]);
        server_write.write_all(b":tmi.twitch.tv 001 zeddy_bot :Welcome, GLHF!\r\n").await.unwrap();

        assert_eq!(check.await.unwrap(), Ok(()));
        let rest = read_until(&mut server_lines, "QUIT").await;
        assert!(!rest.iter().any(|l| l.starts_with("JOIN") || l.starts_with("PRIVMSG")));
    }

    #[tokio::test]
    async fn test_check_login_over_reports_rejected_token() {
        let (client, server) = tokio::io::duplex(4096);
        let (server_read, mut server_write) = tokio::io::split(server);
        let mut server_lines = BufReader::new(server_read).lines();

        let check = tokio::spawn(async move { check_login_over(client, "zeddy_bot", "stale").await });

        read_until(&mut server_lines, "NICK").await;
        server_write
            .write_all(b":tmi.twitch.tv NOTICE * :Improperly formatted auth\r\n")
            .await
            .unwrap();

        assert_eq!(check.await.unwrap(), Err(SendFailure::TokenRejected));
    }
}
