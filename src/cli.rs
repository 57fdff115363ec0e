//! CLI definitions
//!
//! Every entry point the launcher invokes. Workflow locations come from the
//! launcher's environment variables and can be overridden by flags.

use crate::aws::ResourceKind;
use crate::config::DefaultCommand;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// aws-workflow CLI
#[derive(Parser, Debug)]
#[command(name = "aws-workflow")]
#[command(about = "Launcher script filter for searching AWS resources", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress non-error output (no short flag to avoid conflicts)
    #[arg(long, global = true)]
    pub quiet: bool,

    #[command(flatten)]
    pub workflow: WorkflowArgs,
}

/// Workflow environment provided by the launcher
#[derive(Args, Debug, Clone, Default)]
pub struct WorkflowArgs {
    /// Cache directory (listings, pid files, log)
    #[arg(long, env = "alfred_workflow_cache", global = true)]
    pub cache_dir: Option<PathBuf>,

    /// Data directory (settings)
    #[arg(long, env = "alfred_workflow_data", global = true)]
    pub data_dir: Option<PathBuf>,

    /// Workflow bundle id, used to name the log file
    #[arg(long, env = "alfred_workflow_bundleid", global = true)]
    pub bundle_id: Option<String>,

    /// Workflow version shown by `> version`
    #[arg(long, env = "alfred_workflow_version", global = true)]
    pub workflow_version: Option<String>,

    /// Launcher debug mode ("1" enables debug logging)
    #[arg(long = "debug", env = "alfred_debug", global = true)]
    pub debug: Option<String>,

    /// `aws` executable to run
    #[arg(long, env = "AWS_WORKFLOW_CLI", global = true)]
    pub aws_cli: Option<String>,

    /// Page opened by `open-help`
    #[arg(long, env = "AWS_WORKFLOW_HELP_URL", global = true)]
    pub help_url: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Produce script-filter feedback for a launcher query
    ScriptFilter(ScriptFilterArgs),
    /// Persist the active AWS profile
    SetProfile(SetProfileArgs),
    /// Delete cached listings (running job pid files are kept)
    ClearCache,
    /// Open the help page in the browser
    OpenHelp,
    /// Refresh one cached listing (started detached by the script filter)
    Background(BackgroundArgs),
}

/// Script filter arguments
#[derive(Args, Debug, Clone)]
pub struct ScriptFilterArgs {
    /// Raw query typed into the launcher
    #[arg(default_value = "", allow_hyphen_values = true)]
    pub query: String,

    /// Port of the local preview server
    #[arg(long, env = "WF_QUICKLOOK_PORT")]
    pub quicklook_port: Option<u16>,

    /// Command for queries without a `>` or `+` prefix
    #[arg(long, value_enum, default_value_t, env = "AWS_WORKFLOW_DEFAULT_COMMAND")]
    pub default_command: DefaultCommand,
}

#[derive(Args, Debug, Clone)]
pub struct SetProfileArgs {
    /// Profile name from the AWS config
    pub profile: String,
}

/// Background refresh arguments
#[derive(Args, Debug, Clone)]
pub struct BackgroundArgs {
    /// Resource kind to list
    #[arg(value_enum)]
    pub kind: ResourceKind,

    #[arg(long)]
    pub profile: String,

    #[arg(long)]
    pub region: String,

    /// Cache entry to write (defaults to `<profile>-<region>-<kind>`)
    #[arg(long)]
    pub data_name: Option<String>,
}

impl WorkflowArgs {
    pub fn debug_enabled(&self) -> bool {
        matches!(self.debug.as_deref(), Some("1") | Some("true"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("aws-workflow").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_script_filter_query() {
        let cli = parse(&["script-filter", "web name:api"]);
        match cli.command {
            Some(Commands::ScriptFilter(args)) => assert_eq!(args.query, "web name:api"),
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_script_filter_empty_query() {
        let cli = parse(&["script-filter"]);
        match cli.command {
            Some(Commands::ScriptFilter(args)) => {
                assert_eq!(args.query, "");
                assert_eq!(args.default_command, DefaultCommand::Search);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_default_command_flag() {
        let cli = parse(&["script-filter", "ec2", "--default-command", "console"]);
        match cli.command {
            Some(Commands::ScriptFilter(args)) => {
                assert_eq!(args.default_command, DefaultCommand::Console);
            }
            other => panic!("unexpected command {:?}", other),
        }
        let result = Cli::try_parse_from([
            "aws-workflow",
            "script-filter",
            "--default-command",
            "shell",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_background_args() {
        let cli = parse(&["background", "s3", "--profile", "work", "--region", "eu-west-1"]);
        match cli.command {
            Some(Commands::Background(args)) => {
                assert_eq!(args.kind, ResourceKind::S3);
                assert_eq!(args.profile, "work");
                assert_eq!(args.region, "eu-west-1");
                assert!(args.data_name.is_none());
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_unknown_kind_is_rejected() {
        let result = Cli::try_parse_from([
            "aws-workflow",
            "background",
            "dynamo",
            "--profile",
            "p",
            "--region",
            "r",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_global_flags() {
        let cli = parse(&["clear-cache", "--verbose", "--cache-dir", "/tmp/wf-cache"]);
        assert!(cli.verbose);
        assert_eq!(cli.workflow.cache_dir, Some(PathBuf::from("/tmp/wf-cache")));
        assert!(matches!(cli.command, Some(Commands::ClearCache)));
    }

    #[test]
    fn test_debug_values() {
        let mut args = WorkflowArgs::default();
        assert!(!args.debug_enabled());
        args.debug = Some("1".to_string());
        assert!(args.debug_enabled());
        args.debug = Some("0".to_string());
        assert!(!args.debug_enabled());
    }
}
