pub mod credential_refresh;
pub mod heartbeat;
pub mod roster_health;
