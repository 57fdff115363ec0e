//! Configuration
//!
//! Everything a command needs is resolved once at startup and passed by
//! value: workflow directories, persisted settings, the active AWS session
//! and the script-filter routing table. Nothing is read from or written to
//! the process environment after argument parsing.

use crate::aws::ProfileSource;
use crate::cli::WorkflowArgs;
use crate::error::{validate_name_component, AppError};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

pub const DEFAULT_BUNDLE_ID: &str = "com.github.aws-workflow";
pub const DEFAULT_HELP_URL: &str =
    "https://github.com/twang817/aws-alfred-workflow/blob/master/README.md";
const SETTINGS_FILE: &str = "settings.json";

/// Resolved workflow environment
#[derive(Debug, Clone)]
pub struct WorkflowConfig {
    pub bundle_id: String,
    pub version: String,
    pub cache_dir: PathBuf,
    pub data_dir: PathBuf,
    pub debug: bool,
    pub aws_cli: String,
    pub help_url: String,
}

impl WorkflowConfig {
    /// Resolve from CLI flags and launcher variables, falling back to the
    /// platform cache and data directories
    pub fn from_args(args: &WorkflowArgs) -> Self {
        let bundle_id = args
            .bundle_id
            .clone()
            .unwrap_or_else(|| DEFAULT_BUNDLE_ID.to_string());

        let cache_dir = args.cache_dir.clone().unwrap_or_else(|| {
            dirs::cache_dir()
                .unwrap_or_else(std::env::temp_dir)
                .join(&bundle_id)
        });
        let data_dir = args.data_dir.clone().unwrap_or_else(|| {
            dirs::data_dir()
                .unwrap_or_else(std::env::temp_dir)
                .join(&bundle_id)
        });

        Self {
            version: args
                .workflow_version
                .clone()
                .unwrap_or_else(|| env!("CARGO_PKG_VERSION").to_string()),
            debug: args.debug_enabled(),
            aws_cli: args.aws_cli.clone().unwrap_or_else(|| "aws".to_string()),
            help_url: args
                .help_url
                .clone()
                .unwrap_or_else(|| DEFAULT_HELP_URL.to_string()),
            bundle_id,
            cache_dir,
            data_dir,
        }
    }

    /// `<cache_dir>/<bundle_id>.log`
    pub fn log_path(&self) -> PathBuf {
        self.cache_dir.join(format!("{}.log", self.bundle_id))
    }

    pub fn settings_path(&self) -> PathBuf {
        self.data_dir.join(SETTINGS_FILE)
    }
}

/// Persisted workflow settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile: Option<String>,
}

impl Settings {
    /// Load settings; a missing file means defaults
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!("No settings at {}", path.display());
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings {}", path.display()))?;
        let settings = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse settings {}", path.display()))?;
        Ok(settings)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }

        let json = serde_json::to_string_pretty(self)?;
        let tmp_path = path.with_extension("json.tmp");
        fs::write(&tmp_path, json)
            .with_context(|| format!("Failed to write {}", tmp_path.display()))?;
        fs::rename(&tmp_path, path)
            .with_context(|| format!("Failed to replace {}", path.display()))?;

        info!("Saved settings to {}", path.display());
        Ok(())
    }
}

/// Profile and region every AWS call of one invocation uses
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub profile: String,
    pub region: String,
}

impl Session {
    /// Resolve the active session from settings and the AWS config.
    /// Missing pieces are `AppError::Config` with a message fit for display.
    pub async fn resolve<P: ProfileSource>(
        settings: &Settings,
        profiles: &P,
    ) -> Result<Self, AppError> {
        let profile = settings
            .profile
            .clone()
            .ok_or_else(|| AppError::Config("No AWS profile selected".to_string()))?;
        validate_name_component("profile", &profile)?;

        let region = profiles
            .region_for(&profile)
            .await?
            .filter(|r| !r.is_empty())
            .ok_or_else(|| {
                AppError::Config(format!("No region configured for profile {}", profile))
            })?;
        validate_name_component("region", &region)?;

        debug!("Active session: profile={}, region={}", profile, region);
        Ok(Self { profile, region })
    }
}

/// Command that handles input not claimed by a `>` or `+` prefix
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum DefaultCommand {
    /// Search cached resources
    #[default]
    Search,
    /// Show the AWS console service list
    Console,
}

/// Script-filter routing configuration, built once at startup
#[derive(Debug, Clone, Default)]
pub struct RouterConfig {
    pub default_command: DefaultCommand,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aws::CloudError;
    use tempfile::TempDir;

    struct StaticProfiles(Option<&'static str>);

    impl ProfileSource for StaticProfiles {
        async fn list_profiles(&self) -> Result<Vec<String>, CloudError> {
            Ok(vec!["default".to_string()])
        }

        async fn region_for(&self, _profile: &str) -> Result<Option<String>, CloudError> {
            Ok(self.0.map(str::to_string))
        }
    }

    #[test]
    fn test_workflow_config_from_args() {
        let args = WorkflowArgs {
            cache_dir: Some(PathBuf::from("/tmp/c")),
            data_dir: Some(PathBuf::from("/tmp/d")),
            bundle_id: Some("com.example.aws".to_string()),
            debug: Some("1".to_string()),
            ..Default::default()
        };
        let config = WorkflowConfig::from_args(&args);
        assert_eq!(config.log_path(), PathBuf::from("/tmp/c/com.example.aws.log"));
        assert_eq!(config.settings_path(), PathBuf::from("/tmp/d/settings.json"));
        assert!(config.debug);
        assert_eq!(config.aws_cli, "aws");
        assert_eq!(config.help_url, DEFAULT_HELP_URL);
    }

    #[test]
    fn test_workflow_config_defaults() {
        let config = WorkflowConfig::from_args(&WorkflowArgs::default());
        assert_eq!(config.bundle_id, DEFAULT_BUNDLE_ID);
        assert!(config.cache_dir.ends_with(DEFAULT_BUNDLE_ID));
        assert_eq!(config.version, env!("CARGO_PKG_VERSION"));
    }

    #[test]
    fn test_settings_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("data").join(SETTINGS_FILE);

        assert_eq!(Settings::load(&path).unwrap(), Settings::default());

        let settings = Settings {
            profile: Some("work".to_string()),
        };
        settings.save(&path).unwrap();
        assert_eq!(Settings::load(&path).unwrap(), settings);
    }

    #[test]
    fn test_corrupt_settings_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(SETTINGS_FILE);
        fs::write(&path, "{").unwrap();
        let err = Settings::load(&path).unwrap_err();
        assert!(err.to_string().contains("Failed to parse settings"));
    }

    #[tokio::test]
    async fn test_session_resolution() {
        let settings = Settings {
            profile: Some("work".to_string()),
        };
        let session = Session::resolve(&settings, &StaticProfiles(Some("eu-west-1")))
            .await
            .unwrap();
        assert_eq!(session.profile, "work");
        assert_eq!(session.region, "eu-west-1");
    }

    #[tokio::test]
    async fn test_session_missing_profile() {
        let err = Session::resolve(&Settings::default(), &StaticProfiles(Some("r")))
            .await
            .unwrap_err();
        assert_eq!(err.error_code(), "config_error");
        assert!(err.to_string().contains("No AWS profile selected"));
    }

    #[tokio::test]
    async fn test_session_missing_region() {
        let settings = Settings {
            profile: Some("work".to_string()),
        };
        let err = Session::resolve(&settings, &StaticProfiles(None))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("No region configured for profile work"));
    }

    #[test]
    fn test_router_config_defaults_to_search() {
        assert_eq!(RouterConfig::default().default_command, DefaultCommand::Search);
    }
}
