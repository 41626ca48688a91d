use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client as ReqwestClient, StatusCode};
use serde::Deserialize;
use tracing::{debug, error};

use twitch_oauth2::AccessToken;
use twitch_oauth2::tokens::errors::ValidationError;

use zeddybot_common::error::AuthError;
use zeddybot_common::models::{TokenGrant, TokenValidation};
use zeddybot_common::traits::TokenAuthority;

pub const TWITCH_TOKEN_URL: &str = "https://id.twitch.tv/oauth2/token";

/// Matches Twitch's JSON from the token endpoint
#[derive(Deserialize)]
struct TwitchTokenResponse {
    access_token: String,
    refresh_token: String,
    #[serde(default)]
    expires_in: Option<u64>,
    #[serde(default)]
    scope: Option<Vec<String>>,
}

/// Error body Twitch returns on a rejected exchange, e.g.
/// `{"status":400,"message":"Invalid refresh token"}`.
#[derive(Deserialize)]
struct TwitchErrorResponse {
    #[serde(default)]
    message: Option<String>,
}

/// Validates bot tokens through `id.twitch.tv/oauth2/validate` and refreshes
/// them with the bot application's client credentials.
pub struct TwitchTokenAuthority {
    http: ReqwestClient,
    client_id: String,
    client_secret: String,
    token_url: String,
}

impl TwitchTokenAuthority {
    pub fn new(client_id: String, client_secret: String) -> Self {
        Self {
            http: ReqwestClient::new(),
            client_id,
            client_secret,
            token_url: TWITCH_TOKEN_URL.to_string(),
        }
    }

    /// Points refresh exchanges somewhere other than Twitch.
    pub fn with_token_url(mut self, url: impl Into<String>) -> Self {
        self.token_url = url.into();
        self
    }
}

#[async_trait]
impl TokenAuthority for TwitchTokenAuthority {
    async fn validate(&self, access_token: &str) -> TokenValidation {
        let token = AccessToken::new(access_token.to_string());
        match token.validate_token(&self.http).await {
            Ok(validated) => {
                debug!(login = ?validated.login, "Twitch /validate accepted bot token");
                TokenValidation::Valid {
                    remaining_ttl: validated.expires_in,
                }
            }
            Err(ValidationError::NotAuthorized) => TokenValidation::Invalid {
                reason: "Token is invalid or expired".into(),
            },
            Err(ValidationError::Request(e)) => {
                error!("Twitch validate_token transport error => {e}");
                TokenValidation::UpstreamUnreachable
            }
            Err(e) => TokenValidation::Invalid {
                reason: format!("Token validation failed: {e}"),
            },
        }
    }

    async fn refresh(&self, refresh_token: &str) -> Result<TokenGrant, AuthError> {
        let params = [
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
        ];

        let resp = self
            .http
            .post(&self.token_url)
            .form(&params)
            .send()
            .await
            .map_err(|e| AuthError::UpstreamUnreachable(format!("HTTP error refreshing token: {e}")))?;

        let status = resp.status();
        if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
            return Err(AuthError::UpstreamUnreachable(format!(
                "Twitch token endpoint returned HTTP {status}"
            )));
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            let message = serde_json::from_str::<TwitchErrorResponse>(&body)
                .ok()
                .and_then(|e| e.message)
                .unwrap_or(body);
            return Err(AuthError::RefreshFailed {
                reason: format!("HTTP {} - {}", status.as_u16(), message),
            });
        }

        let token = resp
            .json::<TwitchTokenResponse>()
            .await
            .map_err(|e| AuthError::RefreshFailed {
                reason: format!("Parse error on refresh JSON: {e}"),
            })?;

        Ok(TokenGrant {
            access_token: token.access_token,
            refresh_token: token.refresh_token,
            expires_in: token.expires_in.map(Duration::from_secs),
            scopes: token.scope.unwrap_or_default(),
        })
    }
}
