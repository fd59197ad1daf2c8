//! `sentinel classify`: dry-run a reason through the classifier and escalation tables

use crate::server::config::AppConfig;
use anyhow::Context;
use sentinel_channels::format::describe_step;
use sentinel_core::{Classification, Classifier, EscalationPolicy};

/// Classify `reason` and print the points and first-offense consequence
pub fn run(config: &AppConfig, reason: &str) -> anyhow::Result<()> {
    println!("{}", render(config, reason)?);
    Ok(())
}

fn render(config: &AppConfig, reason: &str) -> anyhow::Result<String> {
    let classifier = Classifier::new(config.discipline.offenses.clone())
        .context("Invalid offense table")?;
    let escalation = EscalationPolicy::new(config.discipline.escalation.clone())
        .context("Invalid escalation tables")?;

    let Classification {
        points,
        label,
        matched_keyword,
    } = classifier.classify_detailed(reason);
    let action = escalation.resolve(points, points);

    let matched = match (label, matched_keyword) {
        (Some(label), Some(keyword)) => format!("{} (keyword \"{}\")", label, keyword),
        (Some(label), None) => label,
        _ => "no keyword matched, default severity".to_string(),
    };

    Ok(format!(
        "Reason:  {}\nMatched: {}\nPoints:  {} MP\nOn a clean record: {}",
        reason,
        matched,
        points,
        describe_step(&action)
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::config::{DatabaseConfig, ServerConfig};
    use sentinel_channels::DiscordConfig;
    use sentinel_core::DisciplineConfig;

    fn config() -> AppConfig {
        AppConfig {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 0,
            },
            database: DatabaseConfig {
                path: ":memory:".to_string(),
            },
            discipline: DisciplineConfig::default(),
            discord: DiscordConfig::new("token"),
        }
    }

    #[test]
    fn test_render_spam() {
        let out = render(&config(), "spamming links").unwrap();
        assert!(out.contains("Points:  1 MP"));
        assert!(out.contains("15 minutes mute"));
    }

    #[test]
    fn test_render_unknown_reason_uses_default() {
        let out = render(&config(), "something odd").unwrap();
        assert!(out.contains("default severity"));
        assert!(out.contains("Points:  2 MP"));
        assert!(out.contains("40 minutes mute"));
    }
}
