//! Source code for an anonymous submission relay bot on Telegram.
//!
//! Users message the bot, admins approve or reject each submission with
//! inline buttons, and approved submissions get reposted to a public channel
//! without any trace of who sent them.

/// Configuration read from the environment on startup.
pub mod config;

/// Various types used throughout.
pub mod types;

/// The database of submissions.
pub mod database;

/// Callback data put on the approve/reject buttons.
pub mod control;

/// Text of messages sent by the bot.
mod render;

/// The outgoing half of Telegram, behind a trait.
pub mod gateway;

/// Moderation logic.
pub mod controller;

/// Functions that handle events from Telegram.
mod handlers;

/// Entry function that starts the bot.
mod entry;
pub use entry::*;
