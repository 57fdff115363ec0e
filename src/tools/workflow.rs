//! Workflow commands
//!
//! The `>` menu of the script filter and the actions its items run:
//! `set-profile`, `clear-cache` and `open-help`.

use crate::aws::ProfileSource;
use crate::cache::CacheManager;
use crate::config::{Settings, WorkflowConfig};
use crate::error::{validate_name_component, AppError};
use crate::feedback::{Feedback, Item};
use crate::search::{MatchOn, SearchEngine};
use anyhow::{Context, Result};
use tracing::info;

/// Commands reachable under `>`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkflowCommand {
    Profile,
    ClearCache,
    Help,
    Version,
}

impl WorkflowCommand {
    pub const ALL: [WorkflowCommand; 4] = [
        WorkflowCommand::Profile,
        WorkflowCommand::ClearCache,
        WorkflowCommand::Help,
        WorkflowCommand::Version,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            WorkflowCommand::Profile => "profile",
            WorkflowCommand::ClearCache => "clear-cache",
            WorkflowCommand::Help => "help",
            WorkflowCommand::Version => "version",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.name() == name)
    }

    fn description(&self, config: &WorkflowConfig) -> String {
        match self {
            WorkflowCommand::Profile => "set the active profile".to_string(),
            WorkflowCommand::ClearCache => "clears cache".to_string(),
            WorkflowCommand::Help => "opens help in browser".to_string(),
            WorkflowCommand::Version => config.version.clone(),
        }
    }
}

/// Autocompletion for the `>` menu. Commands whose name starts with
/// `partial` are listed; no partial lists them all.
pub fn autocomplete_commands(
    partial: Option<&str>,
    complete: &str,
    config: &WorkflowConfig,
    feedback: &mut Feedback,
) {
    let commands = SearchEngine::new().filter(
        partial.unwrap_or(""),
        WorkflowCommand::ALL.to_vec(),
        |c| c.name().to_string(),
        MatchOn::STARTSWITH,
    );

    feedback.extend(commands.into_iter().map(|command| {
        Item::new(command.name())
            .subtitle(command.description(config))
            .arg(command.name())
            .valid(true)
            .autocomplete(format!("{}{}", complete, command.name()))
    }));
}

/// Render one `>` command. `query` is whatever follows the command name.
pub async fn execute_workflow_command<P: ProfileSource>(
    command: WorkflowCommand,
    query: &str,
    complete: &str,
    config: &WorkflowConfig,
    profiles: &P,
    feedback: &mut Feedback,
) -> Result<(), AppError> {
    match command {
        WorkflowCommand::Profile => {
            let names = profiles.list_profiles().await?;
            let names = SearchEngine::new().filter(query, names, String::clone, MatchOn::ALL);
            feedback.extend(names.into_iter().map(|profile| {
                Item::new(profile.as_str())
                    .arg(format!("set-profile {}", profile))
                    .valid(true)
                    .autocomplete(format!("{} {}", complete, profile))
                    .var("action", "run-script,post-notification")
                    .var("notification_text", format!("Selected profile: {}", profile))
            }));
        }
        WorkflowCommand::ClearCache => feedback.push(
            Item::new("clear-cache")
                .subtitle("clears cache")
                .arg("clear-cache")
                .valid(true)
                .autocomplete(complete)
                .var("action", "run-script,post-notification")
                .var("notification_text", "cache cleared"),
        ),
        WorkflowCommand::Help => feedback.push(
            Item::new("help")
                .subtitle("opens help in browser")
                .arg("open-help")
                .valid(true)
                .autocomplete(complete)
                .var("action", "run-script"),
        ),
        WorkflowCommand::Version => feedback.push(
            Item::new("version")
                .subtitle(config.version.as_str())
                .valid(false)
                .autocomplete(complete),
        ),
    }
    Ok(())
}

/// Persist `profile` as the active profile
pub fn execute_set_profile(config: &WorkflowConfig, profile: &str) -> Result<String> {
    validate_name_component("profile", profile)?;

    let path = config.settings_path();
    let mut settings = Settings::load(&path)?;
    settings.profile = Some(profile.to_string());
    settings.save(&path)?;

    info!("setting profile to {}", profile);
    Ok(format!("Selected profile: {}", profile))
}

/// Delete cached listings, keeping pid files of running refreshes
pub fn execute_clear_cache(config: &WorkflowConfig) -> Result<String> {
    let cache = CacheManager::new(&config.cache_dir)?;
    let removed = cache.clear_keeping_jobs()?;
    info!("cache cleared");
    Ok(format!("cache cleared ({} files)", removed))
}

pub fn execute_open_help(config: &WorkflowConfig) -> Result<String> {
    webbrowser::open(&config.help_url)
        .with_context(|| format!("Failed to open {}", config.help_url))?;
    Ok(format!("Opened {}", config.help_url))
}
