use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use axum_server::Handle;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use zeddybot_core::auth::TokenManager;
use zeddybot_core::cache::{ChatBacklog, StatsCache};
use zeddybot_core::config::{BotConfig, resolve_config_path};
use zeddybot_core::dashboard::{self, AppState};
use zeddybot_core::hub::LiveUpdateHub;
use zeddybot_core::platforms::discord::{DiscordRoster, DiscordRuntime};
use zeddybot_core::platforms::twitch_helix::TwitchTokenAuthority;
use zeddybot_core::platforms::twitch_irc::{TwitchChatReader, TwitchIrcSender};
use zeddybot_core::repositories::ConfigFileCredentialStore;
use zeddybot_core::services::{ChatSendService, EventIngestor};
use zeddybot_core::tasks::credential_refresh::spawn_credential_refresh_task;
use zeddybot_core::tasks::heartbeat::spawn_heartbeat_task;
use zeddybot_core::tasks::roster_health::spawn_roster_health_task;

use crate::Args;

const EVENT_CHANNEL_CAPACITY: usize = 1024;
const GRACEFUL_SHUTDOWN: Duration = Duration::from_secs(5);

pub async fn run_server(args: Args) -> anyhow::Result<()> {
    let config_path = resolve_config_path(args.config.clone());
    let mut config = BotConfig::load(&config_path)
        .await
        .with_context(|| format!("loading {}", config_path.display()))?;
    if let Some(bind) = &args.bind {
        config.dashboard.bind_addr = bind.clone();
        config.validate()?;
    }
    let addr = config.bind_addr()?;
    let root = CancellationToken::new();

    // Credentials: persisted back into the same config file.
    let store = Arc::new(ConfigFileCredentialStore::new(&config_path));
    let authority = Arc::new(TwitchTokenAuthority::new(
        config.twitch_bot_client_id.clone(),
        config.twitch_bot_secret.clone(),
    ));
    let tokens = Arc::new(TokenManager::new(store, authority, config.auth.request_timeout()));

    let roster = Arc::new(DiscordRoster::new(config.guild_id()));
    let stats = Arc::new(StatsCache::new(roster.clone()));
    let hub = LiveUpdateHub::new(
        config.dashboard.subscriber_buffer,
        config.dashboard.max_missed_heartbeats,
    );
    let backlog = Arc::new(ChatBacklog::new(config.dashboard.chat_backlog));

    let sender = Arc::new(TwitchIrcSender::new(
        &config.twitch_bot_username,
        config.auth.request_timeout(),
    ));
    let chat = Arc::new(ChatSendService::new(tokens.clone(), sender, config.irc_channel()));

    let (event_tx, event_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
    let mut tasks = Vec::new();
    tasks.push(tokio::spawn(
        EventIngestor::new(stats.clone(), hub.clone(), backlog.clone()).run(event_rx, root.child_token()),
    ));
    // Ignored until the gateway reports a connection.
    stats.resync();

    if args.no_discord {
        info!("Discord disabled by --no-discord");
    } else if config.disc_token.is_empty() {
        warn!("No disc_token configured; Discord stats stay disconnected");
    } else {
        let runtime = DiscordRuntime::new(config.disc_token.clone(), roster.clone());
        tasks.push(tokio::spawn(runtime.run(event_tx.clone(), root.child_token())));
    }

    match (args.no_twitch_chat, config.irc_channel()) {
        (true, _) => info!("Twitch chat reader disabled by --no-twitch-chat"),
        (false, None) => warn!("No target_channel configured; live chat feed disabled"),
        (false, Some(channel)) => {
            let reader = TwitchChatReader::new(channel);
            tasks.push(tokio::spawn(reader.run(event_tx.clone(), root.child_token())));
        }
    }
    drop(event_tx);

    tasks.push(spawn_heartbeat_task(
        hub.clone(),
        config.dashboard.heartbeat_interval(),
        root.child_token(),
    ));
    tasks.push(spawn_roster_health_task(
        stats.clone(),
        config.dashboard.roster_check_interval(),
        root.child_token(),
    ));
    tasks.push(spawn_credential_refresh_task(
        tokens.clone(),
        config.auth.refresh_interval(),
        root.child_token(),
    ));

    let app = dashboard::router(AppState {
        stats,
        hub: hub.clone(),
        backlog,
        chat,
        tokens,
    });

    let handle = Handle::new();
    {
        let handle = handle.clone();
        let root = root.clone();
        let hub = hub.clone();
        tokio::spawn(async move {
            tokio::select! {
                res = tokio::signal::ctrl_c() => {
                    if let Err(e) = res {
                        error!("Failed to listen for Ctrl-C: {e:?}");
                    }
                    info!("Ctrl-C detected; shutting down...");
                }
                _ = root.cancelled() => {}
            }
            root.cancel();
            // Ends every open SSE stream so the server can drain.
            hub.shutdown();
            handle.graceful_shutdown(Some(GRACEFUL_SHUTDOWN));
        });
    }

    info!("Dashboard listening on http://{addr}");
    let served = axum_server::bind(addr)
        .handle(handle)
        .serve(app.into_make_service())
        .await;

    root.cancel();
    for task in tasks {
        if let Err(e) = task.await {
            warn!("Background task ended abnormally: {e}");
        }
    }

    served.context("dashboard server")?;
    info!("Dashboard server shut down.");
    Ok(())
}
