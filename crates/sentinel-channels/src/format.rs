//! Text blocks for points, help and ban-vote embeds
//!
//! Embeds are assembled in the Discord handler; the text lives here so it
//! stays testable without serenity.

use chrono::{DateTime, Utc};
use sentinel_core::humanize::{format_duration, mention};
use sentinel_core::{
    Action, AdvisoryConfig, Classifier, EnforcementReport, EscalationPolicy, Outcome,
    OutcomeAction, PointGrant,
};

/// Offense levels listed in the help embed
const HELP_LEVELS: usize = 5;

/// Describe what an escalation step does
#[must_use]
pub fn describe_step(action: &Action) -> String {
    match action {
        Action::NoAction => "no action".to_string(),
        Action::Mute(d) => format!("{} mute", format_duration(Some(*d))),
        Action::BanVote => "ban vote".to_string(),
    }
}

/// Advisory field: warnings on record and what the next one triggers
#[must_use]
pub fn advisory_status(warnings: u32, config: &AdvisoryConfig) -> String {
    let next = warnings + 1;
    let consequence = if next >= config.convert_at {
        format!("{} MP", config.conversion_points)
    } else if next >= config.mute_at {
        format!("{} mute", format_duration(Some(config.mute_duration())))
    } else {
        "warning".to_string()
    };
    format!(
        "{}/{} warnings\nNext warning will result in: {}",
        warnings, config.convert_at, consequence
    )
}

/// Mute point field: current total and the next threshold
#[must_use]
pub fn threshold_status(total: i64, escalation: &EscalationPolicy) -> String {
    let next = match escalation.next_threshold(total) {
        Some((points, action)) => {
            format!("Next threshold: **{} MP** ({})", points, describe_step(&action))
        }
        None => "⛔ Ban vote threshold reached".to_string(),
    };
    format!("Current MP: **{}**\n{}", total, next)
}

/// Recent grants, newest first, with relative timestamps
#[must_use]
pub fn recent_grants(grants: &[PointGrant]) -> String {
    if grants.is_empty() {
        return "None".to_string();
    }
    grants
        .iter()
        .map(|g| {
            format!(
                "• {} ({} MP) - <t:{}:R>",
                g.reason,
                g.points,
                g.granted_at.timestamp()
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Fields of the help embed, as (title, body) pairs
#[must_use]
pub fn help_sections(
    prefix: &str,
    classifier: &Classifier,
    escalation: &EscalationPolicy,
    advisory: &AdvisoryConfig,
) -> Vec<(String, String)> {
    let mut moderation = vec![format!(
        "`{}punish @user advisory` • Advisory warning ({} warnings = {} MP)",
        prefix, advisory.convert_at, advisory.conversion_points
    )];
    moderation.extend(classifier.levels().take(HELP_LEVELS).map(|level| {
        let mute = escalation
            .base_duration(level.points)
            .map_or_else(|| "no".to_string(), |d| format_duration(Some(d)));
        format!(
            "`{}punish @user {}` • {} MP - {} mute",
            prefix, level.label, level.points, mute
        )
    }));
    moderation.push(format!(
        "`{}punish @user <points> <reason>` • Assign points directly",
        prefix
    ));

    let utility = [
        ("points @user", "Check user's warnings and MP"),
        ("clearpoints @user", "Clear user's warnings and MP"),
        ("deduct @user <n>", "Forgive the most recent points"),
        ("release @user", "Remove user's current mute"),
    ]
    .iter()
    .map(|(cmd, desc)| format!("`{}{}` • {}", prefix, cmd, desc))
    .chain(std::iter::once(
        "`Report` • React with 🆘 to report a message".to_string(),
    ))
    .collect::<Vec<_>>();

    let mut thresholds: Vec<String> = escalation
        .thresholds()
        .iter()
        .map(|rule| {
            format!(
                "• {} MP → {} mute",
                rule.points,
                format_duration(Some(rule.duration()))
            )
        })
        .collect();
    thresholds.push(format!(
        "• {} MP → Ban vote",
        escalation.terminal_threshold()
    ));

    vec![
        ("🛡️ Moderation Commands".to_string(), moderation.join("\n")),
        ("🔧 Utility Commands".to_string(), utility.join("\n")),
        ("⚖️ MP Thresholds".to_string(), thresholds.join("\n")),
    ]
}

/// Channel reply after a `punish` command
#[must_use]
pub fn punish_reply(outcome: &Outcome, enforcement: &EnforcementReport, terminal: i64) -> String {
    let who = mention(outcome.key.actor_id);
    let mut lines = Vec::new();

    if let Some(advisory) = &outcome.advisory {
        if advisory.converted {
            lines.push(format!(
                "⚠️ {} has received **{} MP** after {} warnings",
                who, outcome.points_delta, advisory.warning_number
            ));
        } else {
            lines.push(format!(
                "⚠️ **Warning #{}** issued to {}",
                advisory.warning_number, who
            ));
        }
    }

    match outcome.action {
        OutcomeAction::Muted(d) if enforcement.muted => lines.push(format!(
            "⏳ {} has been muted for **{}**.",
            who,
            format_duration(Some(d))
        )),
        OutcomeAction::Muted(_) if enforcement.permission_denied => {
            lines.push("❌ I don't have permission to mute or assign roles to this user.".to_string())
        }
        OutcomeAction::Muted(_) => lines.push(format!("⚠️ Failed to mute {}.", who)),
        OutcomeAction::PendingBanVote { .. } => lines.push(format!(
            "🚨 **Ban vote triggered for {}** ({} MP reached).",
            who, terminal
        )),
        OutcomeAction::VoteAlreadyPending { .. } => {
            lines.push(format!("⏳ A ban vote for {} is already running.", who))
        }
        OutcomeAction::NoAction => {}
    }

    if outcome.advisory.is_none() {
        lines.push(format!(
            "Points added: **{} MP** · Total: **{} MP**",
            outcome.points_delta, outcome.total
        ));
    }
    if !enforcement.actor_notified {
        lines.push(format!("⚠️ Could not send DM to {}.", who));
    }
    lines.join("\n")
}

/// Body of the ban-vote embed
#[must_use]
pub fn vote_description(actor_id: u64, terminal: i64, closes_at: DateTime<Utc>) -> String {
    format!(
        "{} has reached **{} MP**. Vote to ban this user.\nVoting closes <t:{}:R>.",
        mention(actor_id),
        terminal,
        closes_at.timestamp()
    )
}
