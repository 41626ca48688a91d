// File: zeddybot-core/src/test_utils/helpers.rs
//
// In-memory stand-ins for the store, the upstream authority and the roster,
// shared by unit tests and the integration tests under `tests/`.

use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use zeddybot_common::error::AuthError;
use zeddybot_common::models::{
    CredentialRecord, GuildRoster, RosterMember, TokenGrant, TokenValidation,
};
use zeddybot_common::traits::{CredentialStore, RosterSource, TokenAuthority};

use crate::Error;

/// Credential store kept in memory; counts saves.
#[derive(Default)]
pub struct InMemoryCredentialStore {
    record: Mutex<Option<CredentialRecord>>,
    saves: AtomicUsize,
}

impl InMemoryCredentialStore {
    pub fn with_record(record: CredentialRecord) -> Self {
        Self {
            record: Mutex::new(Some(record)),
            saves: AtomicUsize::new(0),
        }
    }

    pub fn snapshot(&self) -> Option<CredentialRecord> {
        self.record.lock().clone()
    }

    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CredentialStore for InMemoryCredentialStore {
    async fn load(&self) -> Result<Option<CredentialRecord>, Error> {
        Ok(self.record.lock().clone())
    }

    async fn save(&self, record: &CredentialRecord) -> Result<(), Error> {
        *self.record.lock() = Some(record.clone());
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// What a scripted authority does when asked to validate a token it does
/// not list as valid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnknownTokenBehavior {
    Invalid,
    Unreachable,
    Hang,
}

/// Upstream authority driven by a script: a set of tokens it accepts and a
/// queue of refresh outcomes.
pub struct ScriptedAuthority {
    valid_tokens: Mutex<HashSet<String>>,
    refresh_outcomes: Mutex<VecDeque<Result<TokenGrant, AuthError>>>,
    unknown_token: Mutex<UnknownTokenBehavior>,
    refresh_delay: Duration,
    validate_calls: AtomicUsize,
    refresh_calls: AtomicUsize,
}

impl ScriptedAuthority {
    pub fn new() -> Self {
        Self {
            valid_tokens: Mutex::new(HashSet::new()),
            refresh_outcomes: Mutex::new(VecDeque::new()),
            unknown_token: Mutex::new(UnknownTokenBehavior::Invalid),
            refresh_delay: Duration::ZERO,
            validate_calls: AtomicUsize::new(0),
            refresh_calls: AtomicUsize::new(0),
        }
    }

    pub fn with_refresh_delay(mut self, delay: Duration) -> Self {
        self.refresh_delay = delay;
        self
    }

    pub fn accept(&self, token: &str) {
        self.valid_tokens.lock().insert(token.to_string());
    }

    pub fn on_unknown_token(&self, behavior: UnknownTokenBehavior) {
        *self.unknown_token.lock() = behavior;
    }

    /// Queues a successful exchange; the new access token is accepted from then on.
    pub fn push_grant(&self, access: &str, refresh: &str) {
        self.refresh_outcomes.lock().push_back(Ok(TokenGrant {
            access_token: access.to_string(),
            refresh_token: refresh.to_string(),
            expires_in: Some(Duration::from_secs(14_400)),
            scopes: vec!["chat:read".into(), "chat:edit".into()],
        }));
    }

    pub fn push_refresh_error(&self, err: AuthError) {
        self.refresh_outcomes.lock().push_back(Err(err));
    }

    pub fn validate_calls(&self) -> usize {
        self.validate_calls.load(Ordering::SeqCst)
    }

    pub fn refresh_calls(&self) -> usize {
        self.refresh_calls.load(Ordering::SeqCst)
    }
}

impl Default for ScriptedAuthority {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TokenAuthority for ScriptedAuthority {
    async fn validate(&self, access_token: &str) -> TokenValidation {
        self.validate_calls.fetch_add(1, Ordering::SeqCst);
        if self.valid_tokens.lock().contains(access_token) {
            return TokenValidation::Valid {
                remaining_ttl: Some(Duration::from_secs(3600)),
            };
        }
        let behavior = *self.unknown_token.lock();
        match behavior {
            UnknownTokenBehavior::Invalid => TokenValidation::Invalid {
                reason: "invalid access token".into(),
            },
            UnknownTokenBehavior::Unreachable => TokenValidation::UpstreamUnreachable,
            UnknownTokenBehavior::Hang => {
                std::future::pending::<()>().await;
                TokenValidation::UpstreamUnreachable
            }
        }
    }

    async fn refresh(&self, _refresh_token: &str) -> Result<TokenGrant, AuthError> {
        self.refresh_calls.fetch_add(1, Ordering::SeqCst);
        if !self.refresh_delay.is_zero() {
            tokio::time::sleep(self.refresh_delay).await;
        }
        let outcome = self
            .refresh_outcomes
            .lock()
            .pop_front()
            .unwrap_or_else(|| Err(AuthError::RefreshFailed { reason: "Invalid refresh token".into() }));
        if let Ok(grant) = &outcome {
            self.valid_tokens.lock().insert(grant.access_token.clone());
        }
        outcome
    }
}

/// Roster source whose contents the test sets directly.
#[derive(Default)]
pub struct StaticRoster {
    roster: Mutex<Option<GuildRoster>>,
}

impl StaticRoster {
    pub fn set(&self, roster: Option<GuildRoster>) {
        *self.roster.lock() = roster;
    }
}

impl RosterSource for StaticRoster {
    fn roster(&self) -> Option<GuildRoster> {
        self.roster.lock().clone()
    }
}

/// Builds a roster of `total` members of which `bots` are bots and
/// `online_humans` are online non-bots.
pub fn roster_of(guild: &str, total: usize, bots: usize, online_humans: usize) -> GuildRoster {
    let members = (0..total)
        .map(|i| {
            let is_bot = i < bots;
            let online = !is_bot && i < bots + online_humans;
            RosterMember {
                user_id: format!("user-{i}"),
                is_bot,
                online,
            }
        })
        .collect();
    GuildRoster {
        guild_name: guild.to_string(),
        member_count: Some(total as u64),
        members,
    }
}
