//! `sentinel doctor`: configuration diagnostics

use crate::server::config::AppConfig;
use sentinel_core::{Classifier, EscalationPolicy};
use std::path::Path;

pub async fn run(config: &AppConfig) -> anyhow::Result<()> {
    println!("🏥 Sentinel Doctor\n");

    let checks = [
        check_token(config),
        check_discipline(config),
        check_channels(config),
        check_roles(config),
        check_database_dir(config),
    ];

    let mut all_ok = true;
    for (name, result) in &checks {
        match result {
            Ok(detail) => println!("✅ {}: {}", name, detail),
            Err(problem) => {
                all_ok = false;
                println!("❌ {}: {}", name, problem);
            }
        }
    }

    println!();
    if all_ok {
        println!("✅ All checks passed! Ready to run Sentinel.");
        Ok(())
    } else {
        anyhow::bail!("Some checks failed. Please fix the issues above.")
    }
}

type Check = (&'static str, Result<String, String>);

fn check_token(config: &AppConfig) -> Check {
    let result = match config.discord.clone().with_env_token() {
        Ok(discord) if !discord.bot_token.trim().is_empty() => Ok("bot token present".to_string()),
        Ok(_) => Err("bot token is empty".to_string()),
        Err(e) => Err(e.to_string()),
    };
    ("Discord token", result)
}

fn check_discipline(config: &AppConfig) -> Check {
    let discipline = &config.discipline;
    let result = discipline
        .validate()
        .and_then(|_| Classifier::new(discipline.offenses.clone()))
        .and_then(|classifier| {
            EscalationPolicy::new(discipline.escalation.clone()).map(|policy| {
                format!(
                    "offense table v{}, ban vote at {} MP, {}-day retention",
                    classifier.version(),
                    policy.terminal_threshold(),
                    discipline.retention_days
                )
            })
        })
        .map_err(|e| e.to_string());
    ("Discipline tables", result)
}

fn check_channels(config: &AppConfig) -> Check {
    let result = match (config.discord.log_channel_id, config.discord.mod_channel_id) {
        (Some(log), Some(vote)) => Ok(format!("log {} / votes {}", log, vote)),
        (Some(log), None) => Ok(format!("log {} (votes post there too)", log)),
        (None, Some(_)) => Err("log_channel_id is not set; moderator logs are dropped".to_string()),
        (None, None) => Err("no log or moderator channel configured".to_string()),
    };
    ("Channels", result)
}

fn check_roles(config: &AppConfig) -> Check {
    let roles = &config.discord.roles;
    let result = if roles.admin_roles.is_empty() && roles.moderator_roles.is_empty() {
        Err("no staff roles configured; nobody can discipline".to_string())
    } else {
        Ok(format!(
            "{} admin, {} moderator roles",
            roles.admin_roles.len(),
            roles.moderator_roles.len()
        ))
    };
    ("Staff roles", result)
}

fn check_database_dir(config: &AppConfig) -> Check {
    let path = Path::new(&config.database.path);
    let result = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() && !dir.exists() => {
            Ok(format!("{} will be created on start", dir.display()))
        }
        _ => Ok(path.display().to_string()),
    };
    ("Database", result)
}
