//! src/platforms/twitch_irc/client.rs
//!
//! IRC line parsing and the TLS transport shared by the chat reader and the
//! chat sender.

use std::io;

use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio_native_tls::native_tls;
use tokio_native_tls::{TlsConnector, TlsStream};
use tracing::debug;

use zeddybot_common::models::ChatEvent;

/// Minimal representation of a parsed IRC message from Twitch.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedTwitchMsg {
    pub tags: Option<String>,
    pub prefix: Option<String>,
    pub command: String,
    pub params: Vec<String>,
    pub trailing: Option<String>,
}

impl ParsedTwitchMsg {
    pub fn parse_irc_line(line: &str) -> Self {
        let mut rest = line.trim();
        let mut tags = None;
        let mut prefix = None;
        let mut params = Vec::new();
        let trailing;

        if rest.starts_with('@') {
            match rest.find(' ') {
                Some(space_pos) => {
                    tags = Some(rest[..space_pos].to_string());
                    rest = &rest[space_pos + 1..];
                }
                None => {
                    return Self {
                        tags: Some(rest.to_string()),
                        prefix: None,
                        command: String::new(),
                        params,
                        trailing: None,
                    };
                }
            }
        }

        if rest.starts_with(':') {
            match rest.find(' ') {
                Some(space_pos) => {
                    prefix = Some(rest[1..space_pos].to_string());
                    rest = &rest[space_pos + 1..];
                }
                None => {
                    return Self {
                        tags,
                        prefix: Some(rest[1..].to_string()),
                        command: String::new(),
                        params,
                        trailing: None,
                    };
                }
            }
        }

        let mut parts = rest.splitn(2, ' ');
        let command = parts.next().unwrap_or("").to_uppercase();
        rest = parts.next().unwrap_or("");

        if let Some(stripped) = rest.strip_prefix(':') {
            trailing = Some(stripped.to_string());
        } else if let Some(idx) = rest.find(" :") {
            trailing = Some(rest[idx + 2..].to_string());
            params.extend(rest[..idx].split_whitespace().map(str::to_string));
        } else {
            trailing = None;
            params.extend(rest.split_whitespace().map(str::to_string));
        }

        Self { tags, prefix, command, params, trailing }
    }

    /// Nick from a `nick!user@host` prefix.
    pub fn nick(&self) -> Option<&str> {
        let prefix = self.prefix.as_deref()?;
        Some(prefix.split('!').next().unwrap_or(prefix))
    }

    /// Turns a PRIVMSG into a dashboard chat event, preferring the
    /// `display-name` tag over the raw nick.
    pub fn to_chat_event(&self) -> Option<ChatEvent> {
        if self.command != "PRIVMSG" {
            return None;
        }
        let text = self.trailing.as_deref()?;
        let username = self
            .tags
            .as_deref()
            .and_then(|t| extract_tag_value(t, "display-name"))
            .filter(|s| !s.is_empty())
            .or_else(|| self.nick().map(str::to_string))?;
        Some(ChatEvent::new(username, text))
    }

    /// Twitch answers a bad PASS with a NOTICE instead of a numeric.
    pub fn is_auth_failure(&self) -> bool {
        self.command == "NOTICE"
            && self.trailing.as_deref().is_some_and(|t| {
                t.contains("Login authentication failed") || t.contains("Improperly formatted auth")
            })
    }
}

/// Helper to extract `key=value` from a tag string like `@badge-info=;user-id=1234;...`
pub fn extract_tag_value(tag_str: &str, key: &str) -> Option<String> {
    tag_str
        .trim_start_matches('@')
        .split(';')
        .find_map(|kv| {
            let mut parts = kv.splitn(2, '=');
            let left = parts.next().unwrap_or("");
            let right = parts.next().unwrap_or("");
            (left == key).then(|| right.to_string())
        })
}

/// Raw TCP connect followed by a TLS handshake.
pub async fn connect_tls(host: &str, port: u16) -> io::Result<TlsStream<TcpStream>> {
    let tcp = TcpStream::connect((host, port))
        .await
        .map_err(|e| io::Error::new(e.kind(), format!("TCP connect error: {e}")))?;

    let native_connector = native_tls::TlsConnector::new()
        .map_err(|e| io::Error::other(format!("TLSConnector::new() => {e}")))?;
    let connector = TlsConnector::from(native_connector);

    connector
        .connect(host, tcp)
        .await
        .map_err(|e| io::Error::other(format!("TLS connect() => {e}")))
}

/// Writes one IRC line, CRLF-terminated, and flushes.
pub async fn write_line<W>(writer: &mut W, line: &str) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    if line.starts_with("PASS") {
        debug!(">> PASS oauth:<redacted>");
    } else {
        debug!(">> {}", line);
    }
    writer.write_all(line.as_bytes()).await?;
    writer.write_all(b"\r\n").await?;
    writer.flush().await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_privmsg_with_tags() {
        let line = "@badge-info=;display-name=ZeddyFan;user-id=1234 :zeddyfan!zeddyfan@zeddyfan.tmi.twitch.tv PRIVMSG #zeddytv :hello there: friend";
        let msg = ParsedTwitchMsg::parse_irc_line(line);
        assert_eq!(msg.command, "PRIVMSG");
        assert_eq!(msg.params, vec!["#zeddytv".to_string()]);
        assert_eq!(msg.trailing.as_deref(), Some("hello there: friend"));
        assert_eq!(msg.nick(), Some("zeddyfan"));

        let evt = msg.to_chat_event().unwrap();
        assert_eq!(evt.username, "ZeddyFan");
        assert_eq!(evt.message, "hello there: friend");
    }

    #[test]
    fn test_parse_privmsg_without_tags_uses_nick() {
        let msg = ParsedTwitchMsg::parse_irc_line(":bob!bob@bob.tmi.twitch.tv PRIVMSG #c :hi");
        assert_eq!(msg.to_chat_event().unwrap().username, "bob");
    }

    #[test]
    fn test_parse_ping() {
        let msg = ParsedTwitchMsg::parse_irc_line("PING :tmi.twitch.tv");
        assert_eq!(msg.command, "PING");
        assert_eq!(msg.trailing.as_deref(), Some("tmi.twitch.tv"));
        assert!(msg.to_chat_event().is_none());
    }

    #[test]
    fn test_auth_failure_notice() {
        let msg = ParsedTwitchMsg::parse_irc_line(":tmi.twitch.tv NOTICE * :Login authentication failed");
        assert!(msg.is_auth_failure());
        let welcome = ParsedTwitchMsg::parse_irc_line(":tmi.twitch.tv 001 zeddy_bot :Welcome, GLHF!");
        assert!(!welcome.is_auth_failure());
        assert_eq!(welcome.command, "001");
    }

    #[test]
    fn test_extract_tag_value() {
        assert_eq!(extract_tag_value("@a=1;b=two", "b").as_deref(), Some("two"));
        assert_eq!(extract_tag_value("@a=1;b=two", "c"), None);
    }
}
