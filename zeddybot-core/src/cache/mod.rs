// File: src/cache/mod.rs

pub mod chat_backlog;
pub mod stats_cache;

pub use chat_backlog::ChatBacklog;
pub use stats_cache::StatsCache;
