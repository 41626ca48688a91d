use async_trait::async_trait;

use crate::error::Error;
use crate::models::credential::CredentialRecord;

/// Durable home of the bot account's credential record.
///
/// `save` must be atomic: a reader (or a restarted process) sees either the
/// old record or the new one, never a partial write.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn load(&self) -> Result<Option<CredentialRecord>, Error>;
    async fn save(&self, record: &CredentialRecord) -> Result<(), Error>;
}
