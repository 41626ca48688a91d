// zeddybot-core/src/auth/token_manager.rs
//
// Hands out a currently-valid bot access token, refreshing it against the
// upstream authority when needed. Refreshes are serialized: most OAuth
// providers (Twitch included) invalidate a refresh token once it has been
// used, so two concurrent exchanges would leave one caller with a dead pair.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use zeddybot_common::error::AuthError;
use zeddybot_common::models::{CredentialRecord, TokenGrant, TokenValidation};
use zeddybot_common::traits::{CredentialStore, TokenAuthority};

/// One initial attempt plus one retry.
const MAX_UPSTREAM_ATTEMPTS: u32 = 2;

pub struct TokenManager {
    store: Arc<dyn CredentialStore>,
    authority: Arc<dyn TokenAuthority>,
    refresh_lock: Mutex<()>,
    request_timeout: Duration,
}

impl TokenManager {
    pub fn new(
        store: Arc<dyn CredentialStore>,
        authority: Arc<dyn TokenAuthority>,
        request_timeout: Duration,
    ) -> Self {
        Self {
            store,
            authority,
            refresh_lock: Mutex::new(()),
            request_timeout,
        }
    }

    /// Returns an access token the upstream authority currently accepts,
    /// refreshing (and persisting) a new pair first when the stored one is
    /// rejected or cannot be checked.
    pub async fn get_valid_token(&self) -> Result<String, AuthError> {
        let record = self.load_record().await?;

        match self.validate_with_retry(&record.access_token).await {
            TokenValidation::Valid { remaining_ttl } => {
                debug!(?remaining_ttl, "Bot access token is valid");
                Ok(record.access_token)
            }
            TokenValidation::Invalid { reason } => {
                info!("Bot access token rejected ({reason}); refreshing");
                self.refresh_serialized(Some(&record.access_token)).await
            }
            TokenValidation::UpstreamUnreachable => {
                warn!("Could not validate bot access token; attempting refresh");
                self.refresh_serialized(Some(&record.access_token)).await
            }
        }
    }

    /// Refreshes unconditionally. Used by the dashboard's refresh button and
    /// the periodic refresh task.
    pub async fn force_refresh(&self) -> Result<String, AuthError> {
        self.refresh_serialized(None).await
    }

    /// Reports that `rejected_token` was turned down by a downstream service.
    /// Refreshes unless somebody already replaced that token.
    pub async fn invalidate(&self, rejected_token: &str) -> Result<String, AuthError> {
        self.refresh_serialized(Some(rejected_token)).await
    }

    /// Consistent copy of the stored record, if any.
    pub async fn current_record(&self) -> Result<Option<CredentialRecord>, AuthError> {
        self.store
            .load()
            .await
            .map_err(|e| AuthError::Store(e.to_string()))
    }

    async fn load_record(&self) -> Result<CredentialRecord, AuthError> {
        self.current_record().await?.ok_or(AuthError::NoCredential)
    }

    /// Holds the refresh lock for the whole exchange-and-persist cycle.
    ///
    /// `stale_token` is the access token the caller saw fail. If the stored
    /// token differs once the lock is ours, another caller already refreshed
    /// and its result is returned without a second exchange.
    async fn refresh_serialized(&self, stale_token: Option<&str>) -> Result<String, AuthError> {
        let _guard = self.refresh_lock.lock().await;

        let record = self.load_record().await?;
        if let Some(stale) = stale_token {
            if record.access_token != stale {
                debug!("Token already refreshed by a concurrent caller");
                return Ok(record.access_token);
            }
        }

        if record.refresh_token.is_empty() {
            return Err(AuthError::RefreshFailed {
                reason: "no refresh token available for bot account".into(),
            });
        }

        let grant = self.refresh_with_retry(&record.refresh_token).await?;
        let refreshed = CredentialRecord::from_grant(grant, Some(&record));

        if let Err(e) = self.store.save(&refreshed).await {
            // The old refresh token is most likely spent at this point.
            error!("Refreshed bot token could not be persisted: {e}");
            return Err(AuthError::Store(e.to_string()));
        }

        info!("Successfully refreshed bot access token");
        Ok(refreshed.access_token)
    }

    async fn validate_with_retry(&self, access_token: &str) -> TokenValidation {
        for attempt in 1..=MAX_UPSTREAM_ATTEMPTS {
            match timeout(self.request_timeout, self.authority.validate(access_token)).await {
                Ok(TokenValidation::UpstreamUnreachable) => {
                    warn!(attempt, "Token validation: upstream unreachable");
                }
                Ok(result) => return result,
                Err(_) => {
                    warn!(attempt, timeout = ?self.request_timeout, "Token validation timed out");
                }
            }
        }
        TokenValidation::UpstreamUnreachable
    }

    async fn refresh_with_retry(&self, refresh_token: &str) -> Result<TokenGrant, AuthError> {
        let mut last_failure = String::new();
        for attempt in 1..=MAX_UPSTREAM_ATTEMPTS {
            match timeout(self.request_timeout, self.authority.refresh(refresh_token)).await {
                Ok(Ok(grant)) => return Ok(grant),
                Ok(Err(AuthError::UpstreamUnreachable(msg))) => {
                    warn!(attempt, "Token refresh: upstream unreachable: {msg}");
                    last_failure = msg;
                }
                Ok(Err(other)) => {
                    error!("Token refresh rejected: {other}");
                    return Err(other);
                }
                Err(_) => {
                    warn!(attempt, timeout = ?self.request_timeout, "Token refresh timed out");
                    last_failure = format!("refresh timed out after {:?}", self.request_timeout);
                }
            }
        }
        Err(AuthError::UpstreamUnreachable(last_failure))
    }
}
