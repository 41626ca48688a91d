use async_trait::async_trait;

use crate::error::AuthError;
use crate::models::credential::{TokenGrant, TokenValidation};

/// The external service that issues and validates access/refresh tokens.
///
/// Implementations perform exactly one network attempt per call; timeouts
/// and retries are the token manager's job.
#[async_trait]
pub trait TokenAuthority: Send + Sync {
    async fn validate(&self, access_token: &str) -> TokenValidation;

    /// Exchanges a refresh token for a new pair. A rejected exchange is
    /// `AuthError::RefreshFailed`; a transport failure is
    /// `AuthError::UpstreamUnreachable`.
    async fn refresh(&self, refresh_token: &str) -> Result<TokenGrant, AuthError>;
}
