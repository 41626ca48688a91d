use std::path::PathBuf;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt};

mod server;

#[derive(Parser, Debug, Clone)]
#[command(name = "zeddybot")]
#[command(author, version, about = "ZeddyBot - Discord stats and Twitch chat dashboard backend")]
pub struct Args {
    /// Path to the JSON config (falls back to $ZEDDYBOT_CONFIG, then ./config.json)
    #[arg(long, short = 'c')]
    pub config: Option<PathBuf>,

    /// Override dashboard.bind_addr from the config
    #[arg(long)]
    pub bind: Option<String>,

    /// Do not connect to the Discord gateway
    #[arg(long, default_value = "false")]
    pub no_discord: bool,

    /// Do not read Twitch chat into the dashboard
    #[arg(long, default_value = "false")]
    pub no_twitch_chat: bool,
}

fn init_tracing() {
    // Route `log` records from dependencies into tracing.
    let _ = tracing_log::LogTracer::init();

    let filter = EnvFilter::from_default_env()
        .add_directive("zeddybot=info".parse().unwrap_or_default())
        .add_directive("zeddybot_core=info".parse().unwrap_or_default());
    let sub = fmt().with_env_filter(filter).finish();
    tracing::subscriber::set_global_default(sub)
        .expect("Failed to set global subscriber");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    init_tracing();
    let args = Args::parse();
    info!(
        "ZeddyBot starting. discord={}, twitch_chat={}",
        !args.no_discord, !args.no_twitch_chat
    );

    if let Err(e) = server::run_server(args).await {
        error!("Server error: {e:?}");
        return Err(e);
    }

    info!("Main finished. Goodbye!");
    Ok(())
}
