//! Settings for the bot process.
//!
//! Later layers win: the TOML baked into the binary, then `default`, the
//! `SENTINEL_ENV` profile and `local` from the config directory, then
//! `SENTINEL_*` variables.

use super::config::AppConfig;
use anyhow::{Context, Result};
use config::builder::DefaultState;
use config::{Config, ConfigBuilder, Environment, File, FileFormat};
use std::path::Path;

/// Baseline settings shipped inside the executable
pub const DEFAULT_CONFIG: &str = include_str!("../../config/default.toml");

const CONFIG_DIR: &str = "config";
const DEFAULT_PROFILE: &str = "development";

fn file_layers(dir: &Path, profile: &str) -> ConfigBuilder<DefaultState> {
    let optional = |name: &str| File::from(dir.join(name)).required(false);

    Config::builder()
        .add_source(File::from_str(DEFAULT_CONFIG, FileFormat::Toml))
        .add_source(optional("default"))
        .add_source(optional(profile))
        .add_source(optional("local"))
}

/// Read settings from the `config/` directory and the environment.
///
/// Nested keys use a double underscore, e.g. `SENTINEL_DISCORD__TOKEN`.
pub fn load_config() -> Result<AppConfig> {
    let profile = std::env::var("SENTINEL_ENV").unwrap_or_else(|_| DEFAULT_PROFILE.to_string());

    file_layers(Path::new(CONFIG_DIR), &profile)
        .add_source(
            Environment::with_prefix("SENTINEL")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        )
        .build()
        .context("Failed to build configuration")?
        .try_deserialize()
        .context("Failed to deserialize configuration")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_embedded_defaults_deserialize() {
        let config: AppConfig = Config::builder()
            .add_source(File::from_str(DEFAULT_CONFIG, FileFormat::Toml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(config.server.port, 8080);
        assert_eq!(config.database.path, "data/sentinel.db");
        assert_eq!(config.discipline.retention_days, 20);
        assert_eq!(config.discipline.escalation.terminal_threshold, 15);
        assert_eq!(config.discipline.escalation.thresholds.len(), 3);
        assert_eq!(config.discipline.escalation.base_durations.len(), 10);
        assert_eq!(config.discord.command_prefix, "!");
        assert_eq!(config.discord.roles.admin_roles.len(), 4);
        assert!(config.discipline.validate().is_ok());
    }

    #[test]
    fn test_profile_file_overrides_defaults() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("default.toml"), "[server]\nport = 9000\n").unwrap();
        std::fs::write(
            dir.path().join("production.toml"),
            "[server]\nport = 9100\n\n[discipline]\nvote_window_secs = 300\n",
        )
        .unwrap();

        let config: AppConfig = file_layers(dir.path(), "production")
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();
        assert_eq!(config.server.port, 9100);
        assert_eq!(config.discipline.vote_window_secs, 300);
        assert_eq!(config.database.path, "data/sentinel.db");

        let config: AppConfig = file_layers(dir.path(), "staging")
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();
        assert_eq!(config.server.port, 9000);
    }
}
