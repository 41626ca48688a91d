// src/lib.rs

pub mod auth;
pub mod cache;
pub mod config;
pub mod dashboard;
pub mod hub;
pub mod platforms;
pub mod repositories;
pub mod services;
pub mod tasks;
pub mod test_utils;

pub use config::BotConfig;
pub use zeddybot_common::error::Error;
