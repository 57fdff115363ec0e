//! Resource search
//!
//! The default script-filter command. Every resource kind is read from its
//! cached listing, narrowed by the query's terms and facets, and rendered as
//! result items. Stale or missing listings are refreshed by a detached
//! `background` job while the launcher reruns the filter.

use crate::aws::{Resource, ResourceKind};
use crate::background::BackgroundJobs;
use crate::cache::{CacheManager, DEFAULT_MAX_AGE};
use crate::config::{Session, WorkflowConfig};
use crate::error::AppError;
use crate::feedback::{Feedback, Item, ModKey, Modifier};
use crate::search::{ParsedQuery, QueryParser, SearchEngine, TermKeys};
use crate::tools::util;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, warn};

/// Seconds until the launcher reruns the filter while a refresh runs
const RERUN_INTERVAL: f64 = 1.0;

/// A failed refresh is not retried before this much time has passed
const FAILURE_RETRY_AFTER: Duration = Duration::from_secs(60);

const COPY_ACTION: &str = "copy-to-clipboard,post-notification";
const OPEN_URL_ACTION: &str = "open-url";

/// How to start the `background` refresh of one listing
#[derive(Debug, Clone)]
pub struct RefreshCommand {
    pub program: PathBuf,
    /// Global flags passed before the subcommand
    pub global_args: Vec<String>,
}

impl RefreshCommand {
    /// Re-run the current executable with the resolved workflow locations
    pub fn current(config: &WorkflowConfig) -> Result<Self, AppError> {
        let program = std::env::current_exe()
            .map_err(|e| AppError::Internal(format!("Cannot locate own executable: {}", e)))?;

        Ok(Self {
            program,
            global_args: vec![
                "--cache-dir".to_string(),
                config.cache_dir.display().to_string(),
                "--bundle-id".to_string(),
                config.bundle_id.clone(),
                "--aws-cli".to_string(),
                config.aws_cli.clone(),
            ],
        })
    }

    fn args(&self, kind: ResourceKind, session: &Session, data_name: &str) -> Vec<String> {
        let mut args = self.global_args.clone();
        args.extend([
            "background".to_string(),
            kind.as_str().to_string(),
            "--profile".to_string(),
            session.profile.clone(),
            "--region".to_string(),
            session.region.clone(),
            "--data-name".to_string(),
            data_name.to_string(),
        ]);
        args
    }
}

/// Everything the search command reads
pub struct ResourceSearch<'a> {
    pub cache: &'a CacheManager,
    pub jobs: &'a BackgroundJobs,
    pub refresh: &'a RefreshCommand,
    pub session: &'a Session,
    pub quicklook_base: Option<String>,
    pub max_age: Duration,
}

impl<'a> ResourceSearch<'a> {
    pub fn new(
        cache: &'a CacheManager,
        jobs: &'a BackgroundJobs,
        refresh: &'a RefreshCommand,
        session: &'a Session,
    ) -> Self {
        Self {
            cache,
            jobs,
            refresh,
            session,
            quicklook_base: None,
            max_age: DEFAULT_MAX_AGE,
        }
    }

    pub fn with_quicklook_port(mut self, port: Option<u16>) -> Self {
        self.quicklook_base = port.map(util::quicklook_base);
        self
    }

    /// Run `query` against every kind and append the matches to `feedback`
    pub fn execute(&self, query: &str, feedback: &mut Feedback) {
        let parsed = QueryParser::parse(query);
        debug!("terms: {:?}", parsed.terms);
        debug!("facets: {:?}", parsed.facets);

        if parsed.is_malformed() {
            feedback.push(malformed_item(&parsed));
            return;
        }

        let mut engine = SearchEngine::new();
        for kind in ResourceKind::ALL {
            let Some(resources) = self.load(kind, feedback) else {
                continue;
            };

            let resources = engine.apply_terms(resources, &parsed.terms, &term_keys(kind));
            let resources = engine.apply_facets(resources, &parsed.facets);
            debug!("{} {} matches", resources.len(), kind);

            feedback.extend(resources.iter().map(|r| self.render(r)));
        }
    }

    /// Cached listing of `kind`, of any age. Starts a refresh when the
    /// listing is stale or missing, unless the last refresh failed recently,
    /// in which case the failure is shown instead.
    fn load(&self, kind: ResourceKind, feedback: &mut Feedback) -> Option<Vec<Resource>> {
        let data_name =
            CacheManager::data_name(&self.session.profile, &self.session.region, kind.as_str());
        let entry = self.cache.cached_data::<Vec<Resource>>(&data_name);

        let fresh = entry
            .as_ref()
            .map(|e| e.is_fresh(self.max_age))
            .unwrap_or(false);
        if !fresh {
            let failure = self.jobs.last_failure(&data_name);
            if let Some(failure) = &failure {
                debug!("Last refresh of {} failed: {}", data_name, failure.message);
                feedback.push(refresh_failed_item(kind, &failure.message));
            }

            if failure.map_or(true, |f| f.age >= FAILURE_RETRY_AFTER) {
                feedback.request_rerun(RERUN_INTERVAL);
                let args = self.refresh.args(kind, self.session, &data_name);
                if let Err(e) = self
                    .jobs
                    .run_in_background(&data_name, &self.refresh.program, &args)
                {
                    warn!("Could not refresh {}: {}", data_name, e);
                }
            }
        }

        entry.map(|e| e.data).filter(|data| !data.is_empty())
    }

    fn render(&self, resource: &Resource) -> Item {
        let title = resource.title();
        let uid = format!("{}-{}-{}", self.session.profile, resource.kind, title);
        let quicklook = self
            .quicklook_base
            .as_deref()
            .map(|base| util::quicklook_url(base, resource, &title, &uid));

        let item = Item::new(title.as_str())
            .uid(uid)
            .icon(resource.kind.icon())
            .item_type("default")
            .quicklookurl(quicklook);

        let region = self.session.region.as_str();
        match resource.kind {
            ResourceKind::Ec2 => render_ec2(item, resource, &title, region),
            ResourceKind::S3 => item
                .subtitle("open in AWS console")
                .arg(util::s3_bucket_url(region, resource.identifier()))
                .valid(true)
                .var("action", OPEN_URL_ACTION),
            ResourceKind::Rds => render_rds(item, resource, &title, region),
            ResourceKind::Cfn => {
                let status = resource.field_str("StackStatus").unwrap_or("");
                let stack_id = resource
                    .field_str("StackId")
                    .unwrap_or_else(|| resource.identifier());
                item.subtitle(stack_subtitle(status))
                    .arg(util::cfn_stack_url(region, stack_id))
                    .valid(true)
                    .var("action", OPEN_URL_ACTION)
            }
            ResourceKind::Sqs => render_sqs(item, resource, region),
            ResourceKind::Lambda => {
                let subtitle = resource
                    .field_str("Runtime")
                    .unwrap_or("open in AWS console");
                item.subtitle(subtitle)
                    .arg(util::lambda_function_url(region, resource.identifier()))
                    .valid(true)
                    .var("action", OPEN_URL_ACTION)
            }
        }
    }
}

/// Terms match the display name; EC2 also accepts a raw instance id prefix
fn term_keys(kind: ResourceKind) -> TermKeys<Resource> {
    let keys = TermKeys::by_name(|r: &Resource| r.search_key());
    match kind.id_prefix() {
        Some(prefix) => keys.with_identifier(prefix, |r: &Resource| r.identifier().to_string()),
        None => keys,
    }
}

fn render_ec2(item: Item, instance: &Resource, title: &str, region: &str) -> Item {
    let running = instance.field_str("State.Name") == Some("running");
    let private_ip = instance.field_str("PrivateIpAddress");
    let public_ip = instance.field_str("PublicIpAddress");
    let private_text = private_ip.unwrap_or("N/A");
    let public_text = public_ip.unwrap_or("N/A");

    let alt = Modifier::new(
        format!("copy public ip - {}", public_text),
        public_text,
        running && public_ip.is_some(),
    )
    .var("action", COPY_ACTION)
    .var("notification_title", "Copied Public IP of EC2 Instance")
    .var("notification_text", format!("{} of {}", public_text, title));

    let cmd = Modifier::new(
        "open in console",
        util::ec2_instance_url(region, instance.identifier()),
        true,
    )
    .var("action", OPEN_URL_ACTION);

    item.subtitle(format!("copy private ip - {}", private_text))
        .arg(private_text)
        .valid(running && private_ip.is_some())
        .var("action", COPY_ACTION)
        .var("notification_title", "Copied Private IP of EC2 Instance")
        .var("notification_text", format!("{} of {}", private_text, title))
        .modifier(ModKey::Alt, alt)
        .modifier(ModKey::Cmd, cmd)
}

fn render_rds(item: Item, db: &Resource, title: &str, region: &str) -> Item {
    let is_cluster = db.field_str("type") == Some("cluster");
    let id = if is_cluster {
        db.field_str("DBClusterIdentifier")
    } else {
        db.field_str("DBInstanceIdentifier")
    }
    .unwrap_or(title);

    let cmd = Modifier::new(
        "open in console",
        util::rds_database_url(region, id, is_cluster),
        true,
    )
    .var("action", OPEN_URL_ACTION);

    item.subtitle("copy endpoint url")
        .arg(title)
        .valid(true)
        .var("action", COPY_ACTION)
        .var("notification_title", "Copied database endpoint")
        .var("notification_text", title)
        .modifier(ModKey::Cmd, cmd)
}

fn render_sqs(item: Item, queue: &Resource, region: &str) -> Item {
    let queue_url = queue.field_str("QueueUrl");
    let text = queue_url.unwrap_or("N/A");

    let item = item
        .subtitle("copy queue url")
        .arg(text)
        .valid(queue_url.is_some())
        .var("action", COPY_ACTION)
        .var("notification_title", "Copied queue URL")
        .var("notification_text", text);

    match queue_url {
        Some(url) => item.modifier(
            ModKey::Cmd,
            Modifier::new("open in console", util::sqs_queue_url(region, url), true)
                .var("action", OPEN_URL_ACTION),
        ),
        None => item,
    }
}

/// Glyph for a CloudFormation stack status
pub fn stack_status_icon(status: &str) -> Option<&'static str> {
    const VERBS: [&str; 6] = [
        "CREATE",
        "DELETE",
        "REVIEW",
        "UPDATE",
        "ROLLBACK",
        "UPDATE_ROLLBACK",
    ];

    if status.ends_with("_CLEANUP_IN_PROGRESS") {
        return Some("⏲");
    }

    let (verb, state) = [
        ("_IN_PROGRESS", "⏲"),
        ("_FAILED", "❌"),
        ("_COMPLETE", "✅"),
    ]
    .into_iter()
    .find_map(|(suffix, icon)| status.strip_suffix(suffix).map(|verb| (verb, icon)))?;

    VERBS.contains(&verb).then_some(state)
}

fn stack_subtitle(status: &str) -> String {
    match stack_status_icon(status) {
        Some(icon) => format!("{} {}", icon, status),
        None => status.to_string(),
    }
}

fn malformed_item(parsed: &ParsedQuery) -> Item {
    Item::new("Malformed query")
        .subtitle(format!(
            "Cannot parse {}; quote values that contain ':'",
            parsed.malformed.join(", ")
        ))
        .valid(false)
}

fn refresh_failed_item(kind: ResourceKind, message: &str) -> Item {
    Item::new(format!("Could not refresh {} resources", kind))
        .subtitle(message)
        .icon(kind.icon())
        .valid(false)
}

/// Invalid item explaining why no session could be resolved
pub fn session_error_item(message: &str) -> Item {
    Item::new(message)
        .subtitle("Select a profile with '> profile'")
        .autocomplete(">profile ")
        .valid(false)
}
