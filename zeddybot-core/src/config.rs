//! Bot configuration loaded from the JSON file the bot has always used.
//!
//! Unknown keys are kept in `extra` so tooling that rewrites the file (the
//! credential store) never loses them.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use crate::Error;

pub const CONFIG_PATH_ENV: &str = "ZEDDYBOT_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "./config.json";

#[derive(Clone, Serialize, Deserialize)]
pub struct BotConfig {
    #[serde(default)]
    pub disc_token: String,

    /// Guild whose members are counted. When absent, the first guild from
    /// the gateway READY payload is used.
    #[serde(default)]
    pub discord_guild_id: Option<String>,

    #[serde(default)]
    pub twitch_bot_client_id: String,
    #[serde(default)]
    pub twitch_bot_secret: String,
    #[serde(default = "default_bot_username")]
    pub twitch_bot_username: String,
    #[serde(default)]
    pub target_channel: String,

    #[serde(default)]
    pub dashboard: DashboardSettings,
    #[serde(default)]
    pub auth: AuthSettings,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DashboardSettings {
    pub bind_addr: String,
    pub heartbeat_interval_secs: u64,
    pub max_missed_heartbeats: u32,
    pub subscriber_buffer: usize,
    pub roster_check_interval_secs: u64,
    pub chat_backlog: usize,
}

impl Default for DashboardSettings {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:5001".to_string(),
            heartbeat_interval_secs: 15,
            max_missed_heartbeats: 3,
            subscriber_buffer: 64,
            roster_check_interval_secs: 60,
            chat_backlog: 100,
        }
    }
}

impl DashboardSettings {
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_interval_secs)
    }

    pub fn roster_check_interval(&self) -> Duration {
        Duration::from_secs(self.roster_check_interval_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthSettings {
    pub request_timeout_secs: u64,
    pub refresh_interval_hours: u64,
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            request_timeout_secs: 10,
            refresh_interval_hours: 24,
        }
    }
}

impl AuthSettings {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_hours.saturating_mul(3600))
    }
}

/// Longest period accepted for any background task interval.
pub const MAX_TASK_INTERVAL: Duration = Duration::from_secs(365 * 24 * 3600);

fn default_bot_username() -> String {
    "Zeddy_bot".to_string()
}

impl BotConfig {
    /// Reads and validates the config file at `path`.
    pub async fn load(path: &Path) -> Result<Self, Error> {
        let raw = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| Error::Config(format!("cannot read {}: {e}", path.display())))?;
        let config: BotConfig = serde_json::from_str(&raw)
            .map_err(|e| Error::Config(format!("invalid JSON in {}: {e}", path.display())))?;
        config.validate()?;
        debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), Error> {
        self.bind_addr()?;
        if self.dashboard.heartbeat_interval_secs == 0 {
            return Err(Error::Config("dashboard.heartbeat_interval_secs must be > 0".into()));
        }
        if self.dashboard.subscriber_buffer == 0 {
            return Err(Error::Config("dashboard.subscriber_buffer must be > 0".into()));
        }
        if self.dashboard.max_missed_heartbeats == 0 {
            return Err(Error::Config("dashboard.max_missed_heartbeats must be > 0".into()));
        }
        if self.dashboard.roster_check_interval_secs == 0 {
            return Err(Error::Config("dashboard.roster_check_interval_secs must be > 0".into()));
        }
        if self.auth.request_timeout_secs == 0 {
            return Err(Error::Config("auth.request_timeout_secs must be > 0".into()));
        }
        if self.auth.refresh_interval_hours == 0 {
            return Err(Error::Config("auth.refresh_interval_hours must be > 0".into()));
        }
        for (name, period) in [
            ("dashboard.heartbeat_interval_secs", self.dashboard.heartbeat_interval()),
            ("dashboard.roster_check_interval_secs", self.dashboard.roster_check_interval()),
            ("auth.refresh_interval_hours", self.auth.refresh_interval()),
        ] {
            if period > MAX_TASK_INTERVAL {
                return Err(Error::Config(format!("{name} exceeds one year")));
            }
        }
        if let Some(id) = &self.discord_guild_id {
            id.parse::<u64>()
                .map_err(|_| Error::Config(format!("discord_guild_id '{id}' is not a snowflake")))?;
        }
        Ok(())
    }

    pub fn bind_addr(&self) -> Result<SocketAddr, Error> {
        self.dashboard
            .bind_addr
            .parse()
            .map_err(|e| Error::Config(format!("dashboard.bind_addr '{}': {e}", self.dashboard.bind_addr)))
    }

    pub fn guild_id(&self) -> Option<u64> {
        self.discord_guild_id.as_deref().and_then(|s| s.parse().ok())
    }

    /// IRC channel name with the leading `#`.
    pub fn irc_channel(&self) -> Option<String> {
        let chan = self.target_channel.trim().trim_start_matches('#');
        if chan.is_empty() {
            None
        } else {
            Some(format!("#{}", chan.to_lowercase()))
        }
    }
}

/// CLI flag wins, then `ZEDDYBOT_CONFIG`, then `./config.json`.
pub fn resolve_config_path(cli: Option<PathBuf>) -> PathBuf {
    cli.or_else(|| std::env::var_os(CONFIG_PATH_ENV).map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}
