use super::commands::ballot_custom_id;
use super::config::DiscordConfig;
use super::handler::DiscordHandler;
use crate::error::{Error, Result};
use crate::format;

use async_trait::async_trait;
use sentinel_core::{ActorKey, DisciplineEngine, DisciplineEvent, Enforcer, Notifier};
use serenity::all::{
    ButtonStyle, ChannelId, Client, CreateActionRow, CreateButton, CreateEmbed, CreateMessage,
    EditMember, GatewayIntents, GuildId, RoleId, Timestamp, UserId,
};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

/// Map a serenity failure onto the engine's error taxonomy
pub(crate) fn engine_error(action: &str, err: serenity::Error) -> sentinel_core::Error {
    let status = match &err {
        serenity::Error::Http(e) => e.status_code().map(|s| s.as_u16()),
        _ => None,
    };
    match status {
        Some(403) => sentinel_core::Error::PermissionDenied(format!("{}: {}", action, err)),
        Some(404) => sentinel_core::Error::NotFound(format!("{}: {}", action, err)),
        _ => sentinel_core::Error::Delivery(format!("{}: {}", action, err)),
    }
}

/// Discord bot adapter
pub struct DiscordAdapter {
    pub(crate) config: DiscordConfig,
    pub(crate) bot_user_id: AtomicU64,
    pub(crate) http: RwLock<Option<Arc<serenity::http::Http>>>,
}

impl DiscordAdapter {
    /// Create a new Discord adapter
    #[must_use]
    pub fn new(config: DiscordConfig) -> Self {
        Self {
            config,
            bot_user_id: AtomicU64::new(0),
            http: RwLock::new(None),
        }
    }

    /// Adapter configuration
    #[must_use]
    pub fn config(&self) -> &DiscordConfig {
        &self.config
    }

    /// Check if a guild is allowed
    pub fn is_guild_allowed(&self, guild_id: u64) -> bool {
        self.config.allowed_guilds.is_empty() || self.config.allowed_guilds.contains(&guild_id)
    }

    /// Get the bot user ID
    pub fn bot_user_id(&self) -> u64 {
        self.bot_user_id.load(Ordering::SeqCst)
    }

    async fn http(&self) -> sentinel_core::Result<Arc<serenity::http::Http>> {
        self.http
            .read()
            .await
            .clone()
            .ok_or_else(|| sentinel_core::Error::Delivery("Discord is not connected".to_string()))
    }

    /// Names of the given roles in a guild
    pub async fn role_names(&self, guild_id: GuildId, role_ids: &[RoleId]) -> Result<Vec<String>> {
        let http = self.http().await?;
        let roles = guild_id
            .roles(&http)
            .await
            .map_err(|e| Error::Discord(format!("Failed to fetch roles: {}", e)))?;
        Ok(role_ids
            .iter()
            .filter_map(|id| roles.get(id).map(|r| r.name.clone()))
            .collect())
    }

    async fn yellow_card(&self, guild_id: GuildId) -> Option<RoleId> {
        if self.config.yellow_card_role.is_empty() {
            return None;
        }
        let http = self.http().await.ok()?;
        match guild_id.roles(&http).await {
            Ok(roles) => roles
                .values()
                .find(|r| r.name == self.config.yellow_card_role)
                .map(|r| r.id),
            Err(e) => {
                warn!(guild_id = %guild_id, error = %e, "Failed to look up the yellow card role");
                None
            }
        }
    }

    /// Start the bot against an engine and run until `shutdown` fires
    #[instrument(skip(self, engine, shutdown))]
    pub async fn run(
        self: Arc<Self>,
        engine: Arc<DisciplineEngine>,
        shutdown: CancellationToken,
    ) -> Result<()> {
        info!("Starting Discord bot");

        let intents = GatewayIntents::GUILDS
            | GatewayIntents::GUILD_MEMBERS
            | GatewayIntents::GUILD_MESSAGES
            | GatewayIntents::GUILD_MESSAGE_REACTIONS
            | GatewayIntents::DIRECT_MESSAGES
            | GatewayIntents::MESSAGE_CONTENT;

        let handler = DiscordHandler::new(self.clone(), engine.clone());

        let mut client = Client::builder(&self.config.bot_token, intents)
            .event_handler(handler)
            .await
            .map_err(|e| Error::Discord(format!("Failed to create client: {}", e)))?;

        // Store HTTP client for enforcement and notifications
        {
            let mut http_guard = self.http.write().await;
            *http_guard = Some(client.http.clone());
        }

        if let Some(channel) = self.config.mod_channel_id.or(self.config.log_channel_id) {
            self.spawn_vote_listener(
                client.http.clone(),
                ChannelId::new(channel),
                engine.clone(),
                shutdown.clone(),
            );
        } else {
            warn!("No moderator channel configured; ban votes will not be posted");
        }

        let shard_manager = client.shard_manager.clone();
        let stop = shutdown.clone();
        tokio::spawn(async move {
            stop.cancelled().await;
            info!("Shutting down Discord shards");
            shard_manager.shutdown_all().await;
        });

        client
            .start()
            .await
            .map_err(|e| Error::Discord(format!("Client error: {}", e)))?;

        Ok(())
    }

    fn spawn_vote_listener(
        &self,
        http: Arc<serenity::http::Http>,
        channel_id: ChannelId,
        engine: Arc<DisciplineEngine>,
        shutdown: CancellationToken,
    ) {
        let mut rx = engine.events().subscribe();
        let terminal = engine.orchestrator().escalation().terminal_threshold();

        tokio::spawn(async move {
            loop {
                let event = tokio::select! {
                    _ = shutdown.cancelled() => break,
                    event = rx.recv() => event,
                };
                match event {
                    Ok(DisciplineEvent::VoteOpened {
                        vote_id,
                        key,
                        closes_at,
                    }) => {
                        let embed = CreateEmbed::new()
                            .title("🚨 Ban Vote Triggered")
                            .description(format::vote_description(
                                key.actor_id,
                                terminal,
                                closes_at,
                            ))
                            .field("Vote ID", vote_id.to_string(), true)
                            .color(0xff0000)
                            .timestamp(Timestamp::now());
                        let yes = CreateButton::new(ballot_custom_id(vote_id, true))
                            .label("✅ Ban")
                            .style(ButtonStyle::Danger);
                        let no = CreateButton::new(ballot_custom_id(vote_id, false))
                            .label("❌ Spare")
                            .style(ButtonStyle::Secondary);
                        let row = CreateActionRow::Buttons(vec![yes, no]);
                        let msg = CreateMessage::new().embed(embed).components(vec![row]);
                        if let Err(e) = channel_id.send_message(&http, msg).await {
                            warn!(error = %e, "Failed to post ban vote to Discord");
                        }
                    }
                    Ok(DisciplineEvent::BallotCast { vote_id, yes, no, .. }) => {
                        debug!(vote_id = %vote_id, yes, no, "Ballot cast");
                    }
                    Ok(_) => {} // Ignore other events
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                        warn!("Discord vote listener lagged by {} events", n);
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => {
                        info!("Discipline event bus closed, stopping vote listener");
                        break;
                    }
                }
            }
        });
        info!(channel = %channel_id, "Discord ban vote listener started");
    }
}

#[async_trait]
impl Notifier for DiscordAdapter {
    async fn notify_actor(&self, key: ActorKey, message: &str) -> sentinel_core::Result<()> {
        let http = self.http().await?;
        let dm = UserId::new(key.actor_id)
            .create_dm_channel(&http)
            .await
            .map_err(|e| engine_error("open DM", e))?;
        dm.send_message(&http, CreateMessage::new().content(message))
            .await
            .map_err(|e| engine_error("send DM", e))?;
        Ok(())
    }

    async fn notify_moderators(&self, community_id: u64, message: &str) -> sentinel_core::Result<()> {
        let Some(channel) = self.config.log_channel_id else {
            debug!(community_id, "No log channel configured, dropping moderator notice");
            return Ok(());
        };
        let http = self.http().await?;

        let (title, body) = message.split_once('\n').unwrap_or((message, ""));
        let embed = CreateEmbed::new()
            .title(title)
            .description(body)
            .color(0xe67e22)
            .timestamp(Timestamp::now());

        ChannelId::new(channel)
            .send_message(&http, CreateMessage::new().embed(embed))
            .await
            .map_err(|e| engine_error("post moderator log", e))?;
        Ok(())
    }
}

#[async_trait]
impl Enforcer for DiscordAdapter {
    async fn apply_mute(
        &self,
        key: ActorKey,
        duration: Duration,
        reason: &str,
    ) -> sentinel_core::Result<()> {
        let http = self.http().await?;
        let guild = GuildId::new(key.community_id);
        let user = UserId::new(key.actor_id);

        let until = chrono::Utc::now()
            + chrono::Duration::from_std(duration).unwrap_or(chrono::Duration::days(28));
        let until = Timestamp::from_unix_timestamp(until.timestamp()).map_err(|e| {
            sentinel_core::Error::InvalidInput(format!("mute end out of range: {}", e))
        })?;
        let audit = format!("Punished for: {}", reason);

        guild
            .edit_member(
                &http,
                user,
                EditMember::new()
                    .disable_communication_until_datetime(until)
                    .audit_log_reason(&audit),
            )
            .await
            .map_err(|e| engine_error("timeout member", e))?;

        if let Some(role) = self.yellow_card(guild).await {
            http.add_member_role(guild, user, role, Some("Mute issued by bot"))
                .await
                .map_err(|e| engine_error("add yellow card", e))?;
        }

        info!(key = %key, duration_secs = duration.as_secs(), "Member muted");
        Ok(())
    }

    async fn remove_mute(&self, key: ActorKey) -> sentinel_core::Result<()> {
        let http = self.http().await?;
        let guild = GuildId::new(key.community_id);
        let user = UserId::new(key.actor_id);

        guild
            .edit_member(
                &http,
                user,
                EditMember::new()
                    .enable_communication()
                    .audit_log_reason("Mute ended"),
            )
            .await
            .map_err(|e| engine_error("lift timeout", e))?;

        if let Some(role) = self.yellow_card(guild).await {
            http.remove_member_role(guild, user, role, Some("Timeout duration expired"))
                .await
                .map_err(|e| engine_error("remove yellow card", e))?;
        }

        info!(key = %key, "Member unmuted");
        Ok(())
    }

    async fn apply_ban(&self, key: ActorKey, reason: &str) -> sentinel_core::Result<()> {
        let http = self.http().await?;
        GuildId::new(key.community_id)
            .ban_with_reason(&http, UserId::new(key.actor_id), 0, reason)
            .await
            .map_err(|e| engine_error("ban member", e))?;
        info!(key = %key, "Member banned");
        Ok(())
    }
}
