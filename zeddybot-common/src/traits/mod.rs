pub mod auth_traits;
pub mod platform_traits;
pub mod repository_traits;

pub use auth_traits::TokenAuthority;
pub use platform_traits::{ConnectionStatus, RosterSource};
pub use repository_traits::CredentialStore;
