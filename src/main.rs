//! aws-workflow: launcher script filter for AWS resources (Rust)
//!
//! Entry points invoked by the launcher:
//! - `script-filter <query>` - JSON feedback for the typed query
//! - `set-profile`, `clear-cache`, `open-help` - actions run by selected items
//! - `background <kind>` - detached refresh of one cached listing

mod aws;
mod background;
mod cache;
mod cli;
mod config;
mod error;
mod feedback;
mod search;
mod tools;

use anyhow::Result;
use aws::{AwsCli, AwsConfigure};
use clap::Parser;
use cli::{Cli, Commands};
use config::{RouterConfig, Settings, WorkflowConfig};
use error::AppError;
use std::fs::{self, File, OpenOptions};
use std::path::Path;
use tools::router::{Router, ScriptFilterContext};
use tools::search::RefreshCommand;
use tracing::{debug, error};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    run_cli_mode().await
}

/// Parse arguments, run the command and map failures to exit codes
async fn run_cli_mode() -> Result<()> {
    let cli = Cli::parse();
    let config = WorkflowConfig::from_args(&cli.workflow);

    // Initialize logging based on verbosity flags
    let log_level = if cli.quiet {
        "error"
    } else if cli.verbose || config.debug {
        "debug"
    } else {
        "info"
    };
    let log_guard = init_logging(&config, log_level);
    debug!("Workflow config: {:?}", config);

    // Execute command
    let result = match cli.command {
        Some(Commands::ScriptFilter(args)) => execute_script_filter_cli(&config, args).await,
        Some(Commands::SetProfile(args)) => {
            tools::workflow::execute_set_profile(&config, &args.profile)
        }
        Some(Commands::ClearCache) => tools::workflow::execute_clear_cache(&config),
        Some(Commands::OpenHelp) => tools::workflow::execute_open_help(&config),
        Some(Commands::Background(args)) => execute_background_cli(&config, args).await,
        None => {
            eprintln!("Error: No command specified. Use --help for usage information.");
            std::process::exit(1);
        }
    };

    // Handle result and exit with appropriate code
    match result {
        Ok(output) => {
            println!("{}", output);
            Ok(())
        }
        Err(e) => {
            let err = AppError::from(e);
            error!(code = err.error_code(), "{}", err);
            eprintln!("Error: {}", err);
            // flush the file log before exiting
            drop(log_guard);
            std::process::exit(err.exit_code());
        }
    }
}

/// Execute script-filter command in CLI mode
async fn execute_script_filter_cli(
    config: &WorkflowConfig,
    args: cli::ScriptFilterArgs,
) -> Result<String> {
    let settings = Settings::load(&config.settings_path())?;
    let profiles = AwsConfigure::default().with_program(&config.aws_cli);

    let ctx = ScriptFilterContext {
        config,
        settings: &settings,
        refresh: RefreshCommand::current(config)?,
        quicklook_port: args.quicklook_port,
    };

    let router_config = RouterConfig {
        default_command: args.default_command,
    };
    let feedback = Router::new(router_config)
        .run(&args.query, &ctx, &profiles)
        .await?;
    Ok(feedback.to_json()?)
}

/// Execute background command in CLI mode
async fn execute_background_cli(
    config: &WorkflowConfig,
    args: cli::BackgroundArgs,
) -> Result<String> {
    let api = AwsCli::new(&args.profile, &args.region).with_program(&config.aws_cli);
    tools::refresh::execute_background(&config.cache_dir, &args, &api).await
}

/// Log to stderr (shown in the launcher's debugger) and to
/// `<cache_dir>/<bundle_id>.log`. `RUST_LOG` overrides `level`.
fn init_logging(config: &WorkflowConfig, level: &str) -> Option<WorkerGuard> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let (file_layer, guard) = match open_log_file(&config.log_path()) {
        Some(file) => {
            let (writer, guard) = tracing_appender::non_blocking(file);
            let layer = fmt::layer().with_writer(writer).with_ansi(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr) // Log to stderr to keep stdout clean
        .with_ansi(false)
        .with_target(false)
        .compact();

    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .with(stderr_layer)
        .init();

    guard
}

fn open_log_file(path: &Path) -> Option<File> {
    if let Some(parent) = path.parent() {
        if let Err(e) = fs::create_dir_all(parent) {
            eprintln!("[logging] Failed to create {}: {}", parent.display(), e);
            return None;
        }
    }

    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| eprintln!("[logging] Failed to open {}: {}", path.display(), e))
        .ok()
}
