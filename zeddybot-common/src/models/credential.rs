use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The bot account's OAuth pair as persisted in the config file.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialRecord {
    pub access_token: String,
    pub refresh_token: String,
    pub issued_at: DateTime<Utc>,
    #[serde(default)]
    pub scopes: Vec<String>,
}

impl CredentialRecord {
    pub fn new(access_token: impl Into<String>, refresh_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: refresh_token.into(),
            issued_at: Utc::now(),
            scopes: Vec::new(),
        }
    }

    /// Builds the record that replaces `self` after a successful refresh.
    /// Twitch may omit the scope list on refresh; the old one is kept then.
    pub fn from_grant(grant: TokenGrant, previous: Option<&CredentialRecord>) -> Self {
        let scopes = if grant.scopes.is_empty() {
            previous.map(|p| p.scopes.clone()).unwrap_or_default()
        } else {
            grant.scopes
        };
        Self {
            access_token: grant.access_token,
            refresh_token: grant.refresh_token,
            issued_at: Utc::now(),
            scopes,
        }
    }

    pub fn age(&self) -> chrono::Duration {
        Utc::now() - self.issued_at
    }
}

// Tokens never end up in logs.
impl fmt::Debug for CredentialRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialRecord")
            .field("access_token", &"<redacted>")
            .field("refresh_token", &"<redacted>")
            .field("issued_at", &self.issued_at)
            .field("scopes", &self.scopes)
            .finish()
    }
}

/// Result of asking the upstream authority whether an access token is still good.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenValidation {
    Valid { remaining_ttl: Option<Duration> },
    Invalid { reason: String },
    UpstreamUnreachable,
}

/// A freshly exchanged access/refresh pair.
#[derive(Clone, PartialEq, Eq)]
pub struct TokenGrant {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in: Option<Duration>,
    pub scopes: Vec<String>,
}

impl fmt::Debug for TokenGrant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenGrant")
            .field("expires_in", &self.expires_in)
            .field("scopes", &self.scopes)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_output_hides_tokens() {
        let rec = CredentialRecord::new("A1", "R1");
        let printed = format!("{rec:?}");
        assert!(!printed.contains("A1"));
        assert!(!printed.contains("R1"));
    }

    #[test]
    fn refresh_without_scopes_keeps_previous_scopes() {
        let mut old = CredentialRecord::new("A1", "R1");
        old.scopes = vec!["chat:edit".into()];
        let grant = TokenGrant {
            access_token: "A2".into(),
            refresh_token: "R2".into(),
            expires_in: None,
            scopes: vec![],
        };
        let new = CredentialRecord::from_grant(grant, Some(&old));
        assert_eq!(new.access_token, "A2");
        assert_eq!(new.refresh_token, "R2");
        assert_eq!(new.scopes, vec!["chat:edit".to_string()]);
        assert!(new.issued_at >= old.issued_at);
    }
}
