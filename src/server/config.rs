//! Server configuration types
//!
//! Contains all configuration structures for the Sentinel binary.

use sentinel_channels::DiscordConfig;
use sentinel_core::DisciplineConfig;
use serde::Deserialize;

/// Application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    #[serde(default)]
    pub discipline: DisciplineConfig,
    pub discord: DiscordConfig,
}

/// Keep-alive HTTP server
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// SQLite ledger location
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub path: String,
}
