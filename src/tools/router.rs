//! Script-filter routing
//!
//! The first token of the query selects the command: `>` opens the workflow
//! menu, `+` the console shortcuts, anything else goes to the configured
//! default command with the full query.

use crate::aws::ProfileSource;
use crate::background::BackgroundJobs;
use crate::cache::CacheManager;
use crate::config::{DefaultCommand, RouterConfig, Session, Settings, WorkflowConfig};
use crate::error::AppError;
use crate::feedback::Feedback;
use crate::tools::console::execute_console;
use crate::tools::search::{session_error_item, RefreshCommand, ResourceSearch};
use crate::tools::workflow::{autocomplete_commands, execute_workflow_command, WorkflowCommand};
use regex::Regex;
use std::sync::OnceLock;
use tracing::{debug, warn};

fn token_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"[A-Za-z0-9_-]+|[>+]").expect("valid token pattern"))
}

/// Where a query is dispatched. `complete` is the query prefix that
/// selected the command, used to build autocompletions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route<'q> {
    Search {
        query: &'q str,
    },
    Console {
        query: &'q str,
        complete: &'q str,
    },
    WorkflowMenu {
        partial: Option<&'q str>,
        complete: &'q str,
    },
    Workflow {
        command: WorkflowCommand,
        query: &'q str,
        complete: &'q str,
    },
}

/// Everything a script-filter run needs besides the query
pub struct ScriptFilterContext<'a> {
    pub config: &'a WorkflowConfig,
    pub settings: &'a Settings,
    pub refresh: RefreshCommand,
    pub quicklook_port: Option<u16>,
}

#[derive(Debug, Clone, Default)]
pub struct Router {
    config: RouterConfig,
}

impl Router {
    pub fn new(config: RouterConfig) -> Self {
        Self { config }
    }

    pub fn route<'q>(&self, query: &'q str) -> Route<'q> {
        let mut tokens = token_pattern().find_iter(query);
        let Some(first) = tokens.next() else {
            return self.default_route(query);
        };

        match first.as_str() {
            ">" => {
                let menu = &query[..first.end()];
                match tokens.next() {
                    None => Route::WorkflowMenu {
                        partial: None,
                        complete: menu,
                    },
                    Some(token) => match WorkflowCommand::from_name(token.as_str()) {
                        Some(command) => Route::Workflow {
                            command,
                            query: query[token.end()..].trim(),
                            complete: &query[..token.end()],
                        },
                        None => Route::WorkflowMenu {
                            partial: Some(token.as_str()),
                            complete: menu,
                        },
                    },
                }
            }
            "+" => Route::Console {
                query: query[first.end()..].trim(),
                complete: &query[..first.end()],
            },
            _ => self.default_route(query),
        }
    }

    fn default_route<'q>(&self, query: &'q str) -> Route<'q> {
        match self.config.default_command {
            DefaultCommand::Search => Route::Search { query },
            DefaultCommand::Console => Route::Console {
                query: query.trim(),
                complete: "",
            },
        }
    }

    /// Produce the feedback for `query`
    pub async fn run<P: ProfileSource>(
        &self,
        query: &str,
        ctx: &ScriptFilterContext<'_>,
        profiles: &P,
    ) -> Result<Feedback, AppError> {
        let mut feedback = Feedback::new();
        let route = self.route(query);
        debug!("Routing {:?} to {:?}", query, route);

        match route {
            Route::Search { query } => {
                if let Some(session) = resolve_session(ctx, profiles, &mut feedback).await? {
                    let cache = CacheManager::new(&ctx.config.cache_dir)?;
                    let jobs = BackgroundJobs::new(&ctx.config.cache_dir);
                    ResourceSearch::new(&cache, &jobs, &ctx.refresh, &session)
                        .with_quicklook_port(ctx.quicklook_port)
                        .execute(query, &mut feedback);
                }
            }
            Route::Console { query, complete } => {
                if let Some(session) = resolve_session(ctx, profiles, &mut feedback).await? {
                    execute_console(query, complete, &session.region, &mut feedback);
                }
            }
            Route::WorkflowMenu { partial, complete } => {
                autocomplete_commands(partial, complete, ctx.config, &mut feedback);
            }
            Route::Workflow {
                command,
                query,
                complete,
            } => {
                execute_workflow_command(
                    command,
                    query,
                    complete,
                    ctx.config,
                    profiles,
                    &mut feedback,
                )
                .await?;
            }
        }

        Ok(feedback)
    }
}

/// Active session, or `None` after adding an item that explains what is
/// missing
async fn resolve_session<P: ProfileSource>(
    ctx: &ScriptFilterContext<'_>,
    profiles: &P,
    feedback: &mut Feedback,
) -> Result<Option<Session>, AppError> {
    match Session::resolve(ctx.settings, profiles).await {
        Ok(session) => Ok(Some(session)),
        Err(AppError::Config(message)) => {
            warn!("{}", message);
            feedback.push(session_error_item(&message));
            Ok(None)
        }
        Err(e) => Err(e),
    }
}
