use super::adapter::{engine_error, DiscordAdapter};
use super::commands::{parse_ballot_custom_id, parse_command, ModCommand};
use crate::error::{Error, Result};
use crate::format;

use async_trait::async_trait;
use sentinel_core::humanize::{describe_action, mention};
use sentinel_core::{
    collect_reason, format_error_for_chat, ActorKey, BallotReceipt, DisciplineEngine,
    IntakeResult, MessageContext, ReasonSource, Report, Voter,
};
use serenity::all::{
    ComponentInteraction, Context, CreateEmbed, CreateInteractionResponse,
    CreateInteractionResponseMessage, CreateMessage, EventHandler, GuildId, Interaction, Message,
    MessageReference, Reaction, ReactionType, Ready, UserId,
};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Longest excerpt of a reported message quoted back to the reporter
const EXCERPT_LIMIT: usize = 200;

fn excerpt(content: &str) -> String {
    content.chars().take(EXCERPT_LIMIT).collect()
}

/// Context the moderator log shows for a reported message
fn message_context(channel_id: u64, content: &str, jump_link: String) -> MessageContext {
    MessageContext {
        channel_id,
        excerpt: excerpt(content),
        jump_link,
    }
}

/// Who may run a command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Clearance {
    Anyone,
    Staff,
    Admin,
    Outranks,
}

fn clearance(command: &ModCommand) -> Clearance {
    match command {
        ModCommand::Help => Clearance::Anyone,
        ModCommand::Points { .. } => Clearance::Staff,
        ModCommand::ClearPoints { .. } => Clearance::Admin,
        ModCommand::Punish { .. } | ModCommand::Release { .. } | ModCommand::Deduct { .. } => {
            Clearance::Outranks
        }
    }
}

enum Reply {
    Text(String),
    Embed(CreateEmbed),
}

/// Discord event handler
pub struct DiscordHandler {
    adapter: Arc<DiscordAdapter>,
    engine: Arc<DisciplineEngine>,
}

impl DiscordHandler {
    /// Create a new Discord event handler.
    pub fn new(adapter: Arc<DiscordAdapter>, engine: Arc<DisciplineEngine>) -> Self {
        Self { adapter, engine }
    }
}

#[serenity::async_trait]
impl EventHandler for DiscordHandler {
    async fn ready(&self, _ctx: Context, ready: Ready) {
        info!("Discord bot connected as {}", ready.user.name);

        self.adapter
            .bot_user_id
            .store(ready.user.id.get(), Ordering::SeqCst);

        match self.engine.recover().await {
            Ok(0) => {}
            Ok(n) => info!(votes = n, "Resumed open ban votes"),
            Err(e) => error!(error = %e, "Failed to resume open ban votes"),
        }
    }

    async fn message(&self, ctx: Context, msg: Message) {
        if msg.author.bot {
            return;
        }
        let Some(guild_id) = msg.guild_id else {
            return;
        };
        if !self.adapter.is_guild_allowed(guild_id.get()) {
            return;
        }

        let command = match parse_command(&self.adapter.config().command_prefix, &msg.content) {
            None => return,
            Some(Ok(command)) => command,
            Some(Err(e)) => {
                self.reply(&ctx, &msg, Reply::Text(format!("❌ {}", e))).await;
                return;
            }
        };

        info!(
            guild_id = %guild_id,
            author = %msg.author.id,
            command = ?command,
            "Received Discord command"
        );

        let reply = match self.authorize(guild_id, msg.author.id, &command).await {
            Ok(None) => self.execute(&ctx, &msg, guild_id, command).await,
            Ok(Some(denied)) => Ok(Reply::Text(denied)),
            Err(e) => Err(e),
        };

        let reply = reply.unwrap_or_else(|e| {
            warn!(error = %e, "Discord command failed");
            Reply::Text(match e {
                Error::Engine(e) => format_error_for_chat(&e),
                other => format!("⚠️ {}", other),
            })
        });
        self.reply(&ctx, &msg, reply).await;
    }

    async fn reaction_add(&self, ctx: Context, reaction: Reaction) {
        if !reaction.emoji.unicode_eq(&self.adapter.config().report_emoji) {
            return;
        }
        let (Some(guild_id), Some(reporter)) = (reaction.guild_id, reaction.user_id) else {
            return;
        };
        if reporter.get() == self.adapter.bot_user_id()
            || !self.adapter.is_guild_allowed(guild_id.get())
        {
            return;
        }

        if let Err(e) = self.handle_report(&ctx, guild_id, reporter, &reaction).await {
            error!(error = %e, reporter = %reporter, "Failed to process report");
            let text = match &e {
                Error::Engine(e) => format_error_for_chat(e),
                other => format!("⚠️ {}", other),
            };
            dm(&ctx, reporter, &text).await;
        }
    }

    async fn interaction_create(&self, ctx: Context, interaction: Interaction) {
        if let Interaction::Component(component) = interaction {
            self.handle_component(&ctx, &component).await;
        }
    }
}

impl DiscordHandler {
    async fn reply(&self, ctx: &Context, msg: &Message, reply: Reply) {
        let builder = match reply {
            Reply::Text(text) => CreateMessage::new().content(text),
            Reply::Embed(embed) => CreateMessage::new().embed(embed),
        }
        .reference_message(MessageReference::from((msg.channel_id, msg.id)));

        if let Err(e) = msg.channel_id.send_message(&ctx.http, builder).await {
            error!(error = %e, "Failed to send Discord response");
        }
    }

    async fn member_roles(&self, guild_id: GuildId, user: UserId) -> Result<Vec<String>> {
        let http = self
            .adapter
            .http
            .read()
            .await
            .clone()
            .ok_or_else(|| Error::Discord("Not connected".to_string()))?;
        let member = guild_id
            .member(&http, user)
            .await
            .map_err(|e| Error::Engine(engine_error("fetch member", e)))?;
        self.adapter.role_names(guild_id, &member.roles).await
    }

    /// `Ok(None)` when allowed, `Ok(Some(reason))` when refused
    async fn authorize(
        &self,
        guild_id: GuildId,
        author: UserId,
        command: &ModCommand,
    ) -> Result<Option<String>> {
        let level = clearance(command);
        if level == Clearance::Anyone {
            return Ok(None);
        }

        let roles = &self.adapter.config().roles;
        let author_roles = self.member_roles(guild_id, author).await?;

        let allowed = match level {
            Clearance::Anyone => true,
            Clearance::Staff => roles.is_staff(&author_roles),
            Clearance::Admin => roles.is_admin(&author_roles),
            Clearance::Outranks => match command.target() {
                Some(target) => {
                    let target_roles = self.member_roles(guild_id, UserId::new(target)).await?;
                    roles.may_discipline(&author_roles, &target_roles)
                }
                None => false,
            },
        };

        if allowed {
            return Ok(None);
        }
        debug!(author = %author, command = ?command, "Command refused by role hierarchy");
        Ok(Some(match level {
            Clearance::Outranks => {
                "❌ You cannot discipline someone with an equal or higher role than you."
            }
            Clearance::Admin => "❌ Only administrators can do that.",
            _ => "❌ Only moderators can do that.",
        }
        .to_string()))
    }

    async fn execute(
        &self,
        ctx: &Context,
        msg: &Message,
        guild_id: GuildId,
        command: ModCommand,
    ) -> Result<Reply> {
        let key_for = |target: u64| ActorKey::new(guild_id.get(), target);
        let orchestrator = self.engine.orchestrator();

        match command {
            ModCommand::Punish {
                target,
                points,
                reason,
            } => {
                let mut report = Report::new(key_for(target), msg.author.id.get(), reason);
                if let Some(points) = points {
                    report = report.with_points(points);
                }
                let (outcome, enforcement) = self.engine.report(report).await?;
                let terminal = orchestrator.escalation().terminal_threshold();
                Ok(Reply::Text(format::punish_reply(
                    &outcome,
                    &enforcement,
                    terminal,
                )))
            }
            ModCommand::Points { target } => {
                let standing = orchestrator.standing(key_for(target), 3).await?;
                let mut embed = CreateEmbed::new()
                    .title("Points Info")
                    .description(mention(target))
                    .field(
                        "⚪ Advisory Warnings",
                        format::advisory_status(standing.warnings, &self.engine.config().advisory),
                        false,
                    )
                    .field(
                        "📊 Mute Points",
                        format::threshold_status(standing.total, orchestrator.escalation()),
                        false,
                    )
                    .field(
                        "📝 Recent Punishments",
                        format::recent_grants(&standing.recent),
                        false,
                    )
                    .color(0x3498db)
                    .timestamp(msg.timestamp);
                if let Some(vote_id) = standing.open_vote {
                    embed = embed.field("🚨 Ban Vote", format!("In progress (`{}`)", vote_id), false);
                }
                Ok(Reply::Embed(embed))
            }
            ModCommand::ClearPoints { target } => self.clear_points(ctx, msg, key_for(target)).await,
            ModCommand::Release { target } => {
                self.engine.release(key_for(target)).await?;
                Ok(Reply::Text(format!(
                    "🔓 {} has been released (unmuted).",
                    mention(target)
                )))
            }
            ModCommand::Deduct { target, amount } => {
                let total = orchestrator.deduct(key_for(target), amount).await?;
                Ok(Reply::Text(format!(
                    "✅ Forgave up to **{} MP** for {}. Total: **{} MP**",
                    amount,
                    mention(target),
                    total
                )))
            }
            ModCommand::Help => {
                let sections = format::help_sections(
                    &self.adapter.config().command_prefix,
                    orchestrator.classifier(),
                    orchestrator.escalation(),
                    &self.engine.config().advisory,
                );
                let embed = sections.into_iter().fold(
                    CreateEmbed::new()
                        .title("Sentinel Points System Help")
                        .description("Mute Point Framework (MPF) Commands:")
                        .color(0x3498db),
                    |embed, (name, value)| embed.field(name, value, false),
                );
                Ok(Reply::Embed(embed))
            }
        }
    }

    async fn clear_points(&self, ctx: &Context, msg: &Message, key: ActorKey) -> Result<Reply> {
        let prompt = CreateMessage::new().content(format!(
            "⚠️ Are you sure you want to clear all points and warnings for {}?\nReact with ✅ to confirm.",
            mention(key.actor_id)
        ));
        let confirm = msg
            .channel_id
            .send_message(&ctx.http, prompt)
            .await
            .map_err(|e| Error::Discord(format!("Failed to ask for confirmation: {}", e)))?;
        if let Err(e) = confirm
            .react(&ctx.http, ReactionType::Unicode("✅".to_string()))
            .await
        {
            warn!(error = %e, "Failed to add confirmation reaction");
        }

        let confirmed = confirm
            .await_reaction(&ctx.shard)
            .author_id(msg.author.id)
            .filter(|r| r.emoji.unicode_eq("✅"))
            .timeout(Duration::from_secs(self.adapter.config().confirm_timeout_secs))
            .await;

        if confirmed.is_none() {
            return Ok(Reply::Text(
                "❌ Command timed out. No changes were made.".to_string(),
            ));
        }

        self.engine.orchestrator().clear(key).await?;
        Ok(Reply::Text(format!(
            "✅ All points and warnings cleared for {}",
            mention(key.actor_id)
        )))
    }

    async fn handle_report(
        &self,
        ctx: &Context,
        guild_id: GuildId,
        reporter: UserId,
        reaction: &Reaction,
    ) -> Result<()> {
        let message = reaction
            .message(&ctx.http)
            .await
            .map_err(|e| Error::Discord(format!("Failed to fetch reported message: {}", e)))?;
        if message.author.bot {
            return Ok(());
        }

        info!(
            guild_id = %guild_id,
            reporter = %reporter,
            author = %message.author.id,
            "Message reported"
        );

        let source = DmReasonSource {
            ctx: ctx.clone(),
            excerpt: excerpt(&message.content),
        };
        let timeout = self.engine.config().intake_timeout();

        match collect_reason(&source, reporter.get(), timeout).await? {
            IntakeResult::Provided(reason) => {
                let key = ActorKey::new(guild_id.get(), message.author.id.get());
                let report = Report::new(key, reporter.get(), reason).with_context(
                    message_context(message.channel_id.get(), &message.content, message.link()),
                );
                let (outcome, _) = self.engine.report(report).await?;
                dm(
                    ctx,
                    reporter,
                    &format!(
                        "✅ Your report was filed. Action taken: {}.",
                        describe_action(&outcome.action)
                    ),
                )
                .await;
            }
            IntakeResult::Empty => {
                dm(ctx, reporter, "❌ Report cancelled: no reason was given.").await;
            }
            IntakeResult::TimedOut => {
                dm(
                    ctx,
                    reporter,
                    "⌛ Report cancelled: no reason was received in time.",
                )
                .await;
            }
        }
        Ok(())
    }

    /// Handle ballot buttons on ban-vote embeds
    async fn handle_component(&self, ctx: &Context, component: &ComponentInteraction) {
        let response_text = match parse_ballot_custom_id(&component.data.custom_id) {
            Some((vote_id, ballot)) => {
                let voter = Voter {
                    id: component.user.id.get(),
                    is_bot: component.user.bot,
                };
                match self.engine.cast_ballot(vote_id, voter, ballot).await {
                    Ok(BallotReceipt::Counted(t)) => {
                        format!("🗳️ Ballot counted (✅ {} / ❌ {})", t.yes, t.no)
                    }
                    Ok(BallotReceipt::Replaced(t)) => {
                        format!("🗳️ Ballot updated (✅ {} / ❌ {})", t.yes, t.no)
                    }
                    Ok(BallotReceipt::Excluded) => "❌ You cannot vote on this ban.".to_string(),
                    Err(e) => format_error_for_chat(&e),
                }
            }
            None => "Unknown action.".to_string(),
        };

        let builder = CreateInteractionResponse::Message(
            CreateInteractionResponseMessage::new()
                .content(response_text)
                .ephemeral(true),
        );
        if let Err(e) = component.create_response(&ctx.http, builder).await {
            error!(error = %e, "Failed to respond to component interaction");
        }
    }
}

async fn dm(ctx: &Context, user: UserId, text: &str) {
    let result = match user.create_dm_channel(ctx).await {
        Ok(channel) => channel
            .send_message(&ctx.http, CreateMessage::new().content(text))
            .await
            .map(|_| ()),
        Err(e) => Err(e),
    };
    if let Err(e) = result {
        warn!(user = %user, error = %e, "Failed to send DM");
    }
}

/// Asks a reporter for their reason over direct messages
struct DmReasonSource {
    ctx: Context,
    excerpt: String,
}

#[async_trait]
impl ReasonSource for DmReasonSource {
    async fn prompt(&self, reporter_id: u64) -> sentinel_core::Result<()> {
        let channel = UserId::new(reporter_id)
            .create_dm_channel(&self.ctx)
            .await
            .map_err(|e| engine_error("open DM", e))?;
        let text = format!(
            "You reported this message:\n> {}\nPlease reply with the reason for your report.",
            self.excerpt.replace('\n', "\n> ")
        );
        channel
            .send_message(&self.ctx.http, CreateMessage::new().content(text))
            .await
            .map_err(|e| engine_error("send DM", e))?;
        Ok(())
    }

    async fn next_reply(&self, reporter_id: u64) -> sentinel_core::Result<Option<String>> {
        let user = UserId::new(reporter_id);
        let channel = user
            .create_dm_channel(&self.ctx)
            .await
            .map_err(|e| engine_error("open DM", e))?;
        let reply = channel
            .id
            .await_reply(&self.ctx.shard)
            .author_id(user)
            .await;
        Ok(reply.map(|m| m.content))
    }
}
