// zeddybot-core/src/tasks/credential_refresh.rs

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::Error;
use crate::auth::TokenManager;

/// Refreshes the bot credential if the stored record is older than `max_age`.
/// Returns whether a refresh happened.
pub async fn refresh_if_stale(tokens: &TokenManager, max_age: Duration) -> Result<bool, Error> {
    let Some(record) = tokens.current_record().await? else {
        info!("No bot credential stored; skipping startup refresh.");
        return Ok(false);
    };

    let age = record.age().to_std().unwrap_or_default();
    if age < max_age {
        debug!("Bot credential is {}s old; no startup refresh needed.", age.as_secs());
        return Ok(false);
    }

    info!("Bot credential is {}h old; refreshing.", age.as_secs() / 3600);
    tokens.force_refresh().await?;
    Ok(true)
}

/// Spawns the proactive refresh loop: once at startup if the record is
/// stale, then every `period`. Failures are logged and retried next tick.
pub fn spawn_credential_refresh_task(
    tokens: Arc<TokenManager>,
    period: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        if let Err(e) = refresh_if_stale(&tokens, period).await {
            error!("Startup credential refresh failed: {e}");
        }

        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => match tokens.force_refresh().await {
                    Ok(_) => info!("Scheduled bot credential refresh succeeded."),
                    Err(e) => error!("Scheduled bot credential refresh failed: {e}"),
                },
            }
        }
        debug!("Credential refresh task stopped");
    })
}
