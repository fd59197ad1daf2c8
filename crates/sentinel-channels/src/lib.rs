//! Sentinel Channels - Platform Adapters
//!
//! This crate connects the discipline engine to chat platforms:
//! - Discord (via serenity): commands, 🆘 reports, ban-vote buttons, and the
//!   [`Enforcer`](sentinel_core::Enforcer) / [`Notifier`](sentinel_core::Notifier)
//!   implementations
//! - Formatting helpers shared by every surface

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod discord;
pub mod error;
pub mod format;

pub use error::{Error, Result};

// Re-export Discord adapter
pub use discord::{DiscordAdapter, DiscordConfig};
