pub mod config_file;

pub use config_file::ConfigFileCredentialStore;
pub use zeddybot_common::traits::repository_traits::CredentialStore;
