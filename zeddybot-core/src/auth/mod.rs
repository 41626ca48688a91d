// =============================================================================
// zeddybot-core/src/auth/mod.rs
// =============================================================================

pub mod token_manager;

pub use token_manager::TokenManager;
pub use zeddybot_common::error::AuthError;
pub use zeddybot_common::traits::TokenAuthority;
