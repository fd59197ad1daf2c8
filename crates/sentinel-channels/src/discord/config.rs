use crate::error::{Error, Result};
use sentinel_core::RoleHierarchy;
use serde::Deserialize;

/// Role handed out alongside a timeout
pub const DEFAULT_YELLOW_CARD_ROLE: &str = "ﾒ YELLOW CARD ᵎᵎ";

/// Discord bot configuration
#[derive(Debug, Clone, Deserialize)]
pub struct DiscordConfig {
    /// Bot token (from DISCORD_BOT_TOKEN env)
    #[serde(default)]
    pub bot_token: String,
    /// Prefix for text commands
    #[serde(default = "default_prefix")]
    pub command_prefix: String,
    /// Allowed guild (server) IDs (empty = allow all)
    #[serde(default)]
    pub allowed_guilds: Vec<u64>,
    /// Channel receiving punishment logs and alerts
    #[serde(default)]
    pub log_channel_id: Option<u64>,
    /// Channel where ban votes are held
    #[serde(default)]
    pub mod_channel_id: Option<u64>,
    /// Role added while muted (empty = none)
    #[serde(default = "default_yellow_card_role")]
    pub yellow_card_role: String,
    /// Reaction that starts a member report
    #[serde(default = "default_report_emoji")]
    pub report_emoji: String,
    /// Seconds to wait for a `clearpoints` confirmation
    #[serde(default = "default_confirm_secs")]
    pub confirm_timeout_secs: u64,
    /// Staff role names
    #[serde(default)]
    pub roles: RoleHierarchy,
}

fn default_prefix() -> String {
    "!".to_string()
}

fn default_yellow_card_role() -> String {
    DEFAULT_YELLOW_CARD_ROLE.to_string()
}

fn default_report_emoji() -> String {
    "🆘".to_string()
}

fn default_confirm_secs() -> u64 {
    30
}

impl DiscordConfig {
    /// Create with a bot token
    #[must_use]
    pub fn new(bot_token: impl Into<String>) -> Self {
        Self {
            bot_token: bot_token.into(),
            command_prefix: default_prefix(),
            allowed_guilds: Vec::new(),
            log_channel_id: None,
            mod_channel_id: None,
            yellow_card_role: default_yellow_card_role(),
            report_emoji: default_report_emoji(),
            confirm_timeout_secs: default_confirm_secs(),
            roles: RoleHierarchy::default(),
        }
    }

    /// Fill the token from DISCORD_BOT_TOKEN when the config left it empty
    pub fn with_env_token(mut self) -> Result<Self> {
        if self.bot_token.trim().is_empty() {
            self.bot_token = std::env::var("DISCORD_BOT_TOKEN")
                .map_err(|_| Error::Discord("DISCORD_BOT_TOKEN not set".to_string()))?;
        }
        Ok(self)
    }

    /// Set allowed guilds
    #[must_use]
    pub fn with_allowed_guilds(mut self, guilds: Vec<u64>) -> Self {
        self.allowed_guilds = guilds;
        self
    }

    /// Set the log and vote channels
    #[must_use]
    pub fn with_channels(mut self, log_channel_id: u64, mod_channel_id: u64) -> Self {
        self.log_channel_id = Some(log_channel_id);
        self.mod_channel_id = Some(mod_channel_id);
        self
    }

    /// Set the staff roles
    #[must_use]
    pub fn with_roles(mut self, roles: RoleHierarchy) -> Self {
        self.roles = roles;
        self
    }
}
