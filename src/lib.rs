//! Telegram bot with notes, a food diary and a few utility commands.

pub mod alerts;
pub mod analytics;
pub mod bot;
pub mod config;
pub mod estimator;
pub mod format;
pub mod nutrition;
pub mod openrouter;
pub mod store;
pub mod weather;
