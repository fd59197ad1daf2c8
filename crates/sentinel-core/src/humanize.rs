//! Human-readable rendering of durations and outcomes

use std::time::Duration;

use crate::ban_vote::{Tally, VoteOutcome};
use crate::enforcement::EnforcementReport;
use crate::ledger::ActorKey;
use crate::orchestrator::{Outcome, OutcomeAction, Report};

const MINUTE: u64 = 60;
const DAY: u64 = 24 * 60 * MINUTE;

/// Chat mention markup for a user id
#[must_use]
pub fn mention(user_id: u64) -> String {
    format!("<@{}>", user_id)
}

fn plural(n: u64, unit: &str) -> String {
    if n == 1 {
        format!("1 {}", unit)
    } else {
        format!("{} {}s", n, unit)
    }
}

/// Render a mute length; `None` stands for a ban vote
#[must_use]
pub fn format_duration(duration: Option<Duration>) -> String {
    let Some(duration) = duration else {
        return "Ban Vote Triggered".to_string();
    };

    let secs = duration.as_secs();
    if secs >= DAY && secs % DAY == 0 {
        return plural(secs / DAY, "day");
    }

    let minutes = secs / MINUTE;
    if minutes >= 60 {
        format!("{:.1} hours", secs as f64 / 3600.0)
    } else {
        plural(minutes, "minute")
    }
}

/// Short description of an outcome's action
#[must_use]
pub fn describe_action(action: &OutcomeAction) -> String {
    match action {
        OutcomeAction::NoAction => "No action".to_string(),
        OutcomeAction::Muted(d) => format!("Muted for {}", format_duration(Some(*d))),
        OutcomeAction::PendingBanVote { .. } => "Ban vote opened".to_string(),
        OutcomeAction::VoteAlreadyPending { .. } => "Ban vote already in progress".to_string(),
    }
}

/// Direct message sent to the disciplined actor
#[must_use]
pub fn actor_notice(reason: &str, outcome: &Outcome) -> String {
    if let Some(advisory) = &outcome.advisory {
        return match (&outcome.action, advisory.converted) {
            (_, true) => format!(
                "⚠️ You received advisory warning #{} and it was converted into **{} MP**.\n\
                 Total mute points: **{} MP**\n{}",
                advisory.warning_number,
                outcome.points_delta,
                outcome.total,
                describe_action(&outcome.action)
            ),
            (OutcomeAction::Muted(d), false) => format!(
                "⏳ You received advisory warning #{} and have been muted for **{}**.",
                advisory.warning_number,
                format_duration(Some(*d))
            ),
            _ => format!(
                "⚠️ You received advisory warning #{}. Further warnings lead to a mute.",
                advisory.warning_number
            ),
        };
    }

    let consequence = match &outcome.action {
        OutcomeAction::Muted(d) => format!("Mute duration: **{}**", format_duration(Some(*d))),
        OutcomeAction::PendingBanVote { .. } | OutcomeAction::VoteAlreadyPending { .. } => {
            "The moderators are voting on a ban.".to_string()
        }
        OutcomeAction::NoAction => "No mute was applied.".to_string(),
    };

    format!(
        "You have been punished for **{}**.\nPoints added: **{} MP**\nTotal mute points: **{} MP**\n{}",
        reason, outcome.points_delta, outcome.total, consequence
    )
}

/// Line posted to the moderator log for an outcome
#[must_use]
pub fn moderator_log(report: &Report, outcome: &Outcome) -> String {
    let reason = match &outcome.advisory {
        Some(advisory) => format!("Advisory Warning #{}", advisory.warning_number),
        None => report.reason.clone(),
    };
    let duration = match outcome.action {
        OutcomeAction::Muted(d) => format_duration(Some(d)),
        OutcomeAction::PendingBanVote { .. } | OutcomeAction::VoteAlreadyPending { .. } => {
            format_duration(None)
        }
        OutcomeAction::NoAction => "N/A".to_string(),
    };

    let mut log = format!(
        "🔨 Punishment Issued\nPunished User: {}\nModerator: {}\nReason: {}\nMute Points Given: {}\nTotal: {} MP\nTimeout Duration: {}",
        mention(outcome.key.actor_id),
        mention(report.reporter_id),
        reason,
        outcome.points_delta,
        outcome.total,
        duration
    );
    if let Some(context) = &report.context {
        log.push_str(&format!(
            "\nChannel: <#{}>\nMessage: {}\nJump: {}",
            context.channel_id,
            quote(&context.excerpt),
            context.jump_link
        ));
    }
    log
}

/// Single-line quote of reported text, with mentions defused
fn quote(text: &str) -> String {
    let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.is_empty() {
        return "(no text)".to_string();
    }
    format!("\"{}\"", flat.replace('@', "@\u{200b}"))
}

/// Alert posted when enforcement partly failed
#[must_use]
pub fn enforcement_alert(key: ActorKey, report: &EnforcementReport) -> String {
    let mut alert = if report.permission_denied {
        format!(
            "❌ I don't have permission to mute or assign roles to {}.",
            mention(key.actor_id)
        )
    } else {
        format!("⚠️ Failed to enforce the punishment of {}.", mention(key.actor_id))
    };
    for failure in &report.failures {
        alert.push_str("\n- ");
        alert.push_str(failure);
    }
    alert
}

/// Announcement of a resolved ban vote
#[must_use]
pub fn vote_result(
    key: ActorKey,
    outcome: VoteOutcome,
    tally: Tally,
    enforcement_error: Option<&str>,
) -> String {
    let who = mention(key.actor_id);
    let counts = format!("(✅ {} / ❌ {})", tally.yes, tally.no);
    match (outcome, enforcement_error) {
        (VoteOutcome::Banned, None) => {
            format!("🔨 {} has been **banned** following a successful vote. {}", who, counts)
        }
        (VoteOutcome::Banned, Some(error)) => format!(
            "❌ The vote passed but {} could not be banned: {}. {}",
            who, error, counts
        ),
        (VoteOutcome::Reprieved, _) => {
            format!("✅ {} has been **spared**. Vote did not pass. {}", who, counts)
        }
    }
}
