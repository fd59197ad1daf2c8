//! Text command parsing
//!
//! Commands look like `!punish @user spamming links`. Parsing is kept free of
//! serenity types so it can be tested without a gateway.

use crate::error::{Error, Result};

/// Reason recorded when a moderator only gives a point value
pub const MANUAL_REASON: &str = "manual assignment";

/// A parsed moderation command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModCommand {
    /// `punish @user [points] <reason|advisory>`
    Punish {
        /// Target user
        target: u64,
        /// Explicit point value
        points: Option<i64>,
        /// Reason text
        reason: String,
    },
    /// `points @user`
    Points {
        /// Target user
        target: u64,
    },
    /// `clearpoints @user`
    ClearPoints {
        /// Target user
        target: u64,
    },
    /// `release @user`
    Release {
        /// Target user
        target: u64,
    },
    /// `deduct @user <amount>`
    Deduct {
        /// Target user
        target: u64,
        /// Points to forgive
        amount: i64,
    },
    /// `senti`
    Help,
}

impl ModCommand {
    /// User the command acts on
    #[must_use]
    pub fn target(&self) -> Option<u64> {
        match self {
            Self::Punish { target, .. }
            | Self::Points { target }
            | Self::ClearPoints { target }
            | Self::Release { target }
            | Self::Deduct { target, .. } => Some(*target),
            Self::Help => None,
        }
    }
}

/// Extract a user ID from `<@123>`, `<@!123>` or a bare ID
#[must_use]
pub fn parse_mention(token: &str) -> Option<u64> {
    let id = token
        .strip_prefix("<@")
        .and_then(|t| t.strip_suffix('>'))
        .map(|t| t.trim_start_matches('!'))
        .unwrap_or(token);
    id.parse().ok().filter(|id| *id != 0)
}

fn target(name: &str, token: Option<&str>) -> Result<u64> {
    token
        .and_then(parse_mention)
        .ok_or_else(|| Error::Parse(format!("usage: {} @user", name)))
}

/// Parse a message into a command.
///
/// Returns `None` for messages that are not commands at all, and a parse
/// error for known commands with bad arguments.
pub fn parse_command(prefix: &str, content: &str) -> Option<Result<ModCommand>> {
    let body = content.trim().strip_prefix(prefix)?;
    let mut parts = body.splitn(3, char::is_whitespace);
    let name = parts.next()?.to_lowercase();
    let first = parts.next().map(str::trim).filter(|s| !s.is_empty());
    let rest = parts.next().map(str::trim).filter(|s| !s.is_empty());

    let parsed = match name.as_str() {
        "punish" => parse_punish(first, rest),
        "points" => target("points", first).map(|target| ModCommand::Points { target }),
        "clearpoints" => {
            target("clearpoints", first).map(|target| ModCommand::ClearPoints { target })
        }
        "release" => target("release", first).map(|target| ModCommand::Release { target }),
        "deduct" => parse_deduct(first, rest),
        "senti" => Ok(ModCommand::Help),
        _ => return None,
    };
    Some(parsed)
}

fn parse_punish(first: Option<&str>, rest: Option<&str>) -> Result<ModCommand> {
    let target = target("punish", first)?;
    let rest = rest.ok_or_else(|| {
        Error::Parse("usage: punish @user [points] <reason|advisory>".to_string())
    })?;

    let (head, tail) = rest
        .split_once(char::is_whitespace)
        .map(|(h, t)| (h, t.trim()))
        .unwrap_or((rest, ""));

    match head.parse::<i64>() {
        Ok(points) => Ok(ModCommand::Punish {
            target,
            points: Some(points),
            reason: if tail.is_empty() {
                MANUAL_REASON.to_string()
            } else {
                tail.to_string()
            },
        }),
        Err(_) => Ok(ModCommand::Punish {
            target,
            points: None,
            reason: rest.to_string(),
        }),
    }
}

fn parse_deduct(first: Option<&str>, rest: Option<&str>) -> Result<ModCommand> {
    let target = target("deduct", first)?;
    let amount = rest
        .and_then(|r| r.split_whitespace().next())
        .and_then(|a| a.parse::<i64>().ok())
        .filter(|a| *a > 0)
        .ok_or_else(|| Error::Parse("usage: deduct @user <positive amount>".to_string()))?;
    Ok(ModCommand::Deduct { target, amount })
}

/// Button ID for a ballot on a vote
#[must_use]
pub fn ballot_custom_id(vote_id: uuid::Uuid, yes: bool) -> String {
    format!("ballot:{}:{}", if yes { "yes" } else { "no" }, vote_id)
}

/// Parse a ballot button ID back into the vote and choice
#[must_use]
pub fn parse_ballot_custom_id(custom_id: &str) -> Option<(uuid::Uuid, sentinel_core::Ballot)> {
    let rest = custom_id.strip_prefix("ballot:")?;
    let (choice, id) = rest.split_once(':')?;
    let ballot = sentinel_core::Ballot::parse(choice)?;
    let vote_id = uuid::Uuid::parse_str(id).ok()?;
    Some((vote_id, ballot))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(content: &str) -> Option<Result<ModCommand>> {
        parse_command("!", content)
    }

    #[test]
    fn test_parse_mention() {
        assert_eq!(parse_mention("<@123>"), Some(123));
        assert_eq!(parse_mention("<@!456>"), Some(456));
        assert_eq!(parse_mention("789"), Some(789));
        assert_eq!(parse_mention("<#123>"), None);
        assert_eq!(parse_mention("@someone"), None);
        assert_eq!(parse_mention("0"), None);
    }

    #[test]
    fn test_non_commands_are_ignored() {
        assert!(parse("hello there").is_none());
        assert!(parse("!dance").is_none());
        assert!(parse_command("?", "!punish <@1> spam").is_none());
    }

    #[test]
    fn test_punish_with_reason() {
        let cmd = parse("!punish <@42> spamming   links").unwrap().unwrap();
        assert_eq!(
            cmd,
            ModCommand::Punish {
                target: 42,
                points: None,
                reason: "spamming   links".to_string(),
            }
        );
    }

    #[test]
    fn test_punish_with_points() {
        let cmd = parse("!Punish <@42> 3 drama baiting").unwrap().unwrap();
        assert_eq!(
            cmd,
            ModCommand::Punish {
                target: 42,
                points: Some(3),
                reason: "drama baiting".to_string(),
            }
        );

        let cmd = parse("!punish <@42> 4").unwrap().unwrap();
        assert!(matches!(
            cmd,
            ModCommand::Punish { points: Some(4), ref reason, .. } if reason == MANUAL_REASON
        ));
    }

    #[test]
    fn test_punish_requires_target_and_reason() {
        assert!(matches!(parse("!punish"), Some(Err(Error::Parse(_)))));
        assert!(matches!(parse("!punish <@42>"), Some(Err(Error::Parse(_)))));
        assert!(matches!(parse("!punish someone spam"), Some(Err(Error::Parse(_)))));
    }

    #[test]
    fn test_other_commands() {
        assert_eq!(
            parse("!points <@7>").unwrap().unwrap(),
            ModCommand::Points { target: 7 }
        );
        assert_eq!(
            parse("!clearpoints <@7>").unwrap().unwrap(),
            ModCommand::ClearPoints { target: 7 }
        );
        assert_eq!(
            parse("!release <@!7>").unwrap().unwrap(),
            ModCommand::Release { target: 7 }
        );
        assert_eq!(
            parse("!deduct <@7> 3").unwrap().unwrap(),
            ModCommand::Deduct {
                target: 7,
                amount: 3
            }
        );
        assert_eq!(parse("!senti").unwrap().unwrap(), ModCommand::Help);
        assert!(parse("!deduct <@7> -3").unwrap().is_err());
        assert!(parse("!deduct <@7>").unwrap().is_err());
    }

    #[test]
    fn test_ballot_custom_id() {
        let vote_id = uuid::Uuid::new_v4();
        let id = ballot_custom_id(vote_id, true);
        assert_eq!(
            parse_ballot_custom_id(&id),
            Some((vote_id, sentinel_core::Ballot::Yes))
        );
        assert_eq!(
            parse_ballot_custom_id(&ballot_custom_id(vote_id, false)),
            Some((vote_id, sentinel_core::Ballot::No))
        );
        assert!(parse_ballot_custom_id("approve:whatever").is_none());
        assert!(parse_ballot_custom_id("ballot:maybe:nope").is_none());
    }
}
