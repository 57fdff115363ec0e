//! Client for the `aws` command line tool
//!
//! Every AWS call goes through the [`CloudApi`] seam so listing code can be
//! tested against canned JSON. The real implementation shells out to `aws`
//! with the profile and region passed as flags.

use regex::Regex;
use serde_json::{Map, Value};
use std::process::{Output, Stdio};
use std::sync::OnceLock;
use std::time::Duration;
use thiserror::Error;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, warn};

/// Default time allowed for a single `aws` invocation
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

static SERVICE_ERROR: OnceLock<Regex> = OnceLock::new();

fn service_error_pattern() -> &'static Regex {
    SERVICE_ERROR.get_or_init(|| {
        Regex::new(r"An error occurred \(([\w.]+)\)[^:]*:\s*(.*)")
            .expect("service error pattern is a valid regex")
    })
}

/// Errors from the cloud collaborator
#[derive(Debug, Error)]
pub enum CloudError {
    #[error("{code}: {message}")]
    Service { code: String, message: String },
    #[error("Failed to run aws: {0}")]
    Launch(#[from] std::io::Error),
    #[error("aws call timed out: {0}")]
    Timeout(String),
    #[error("Unexpected aws output: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("aws exited with {status}: {stderr}")]
    Failed { status: String, stderr: String },
}

impl CloudError {
    /// Build an error from a failed invocation, picking the AWS error code
    /// out of stderr when there is one
    pub fn from_output(output: &Output) -> Self {
        let stderr = String::from_utf8_lossy(&output.stderr);
        match service_error_pattern().captures(&stderr) {
            Some(caps) => CloudError::Service {
                code: caps[1].to_string(),
                message: caps[2].trim().to_string(),
            },
            None => CloudError::Failed {
                status: output.status.to_string(),
                stderr: stderr.trim().to_string(),
            },
        }
    }

    /// AWS error code, e.g. `NoSuchTagSet`
    pub fn code(&self) -> Option<&str> {
        match self {
            CloudError::Service { code, .. } => Some(code),
            _ => None,
        }
    }
}

/// One AWS API operation returning JSON
#[allow(async_fn_in_trait)]
pub trait CloudApi {
    /// Call `operation` of `service` (e.g. `ec2 describe-instances`)
    async fn call(&self, service: &str, operation: &str, args: &[String])
        -> Result<Value, CloudError>;
}

/// Profile and region discovery, delegated to `aws configure`
#[allow(async_fn_in_trait)]
pub trait ProfileSource {
    async fn list_profiles(&self) -> Result<Vec<String>, CloudError>;

    /// Configured default region of `profile`, if any
    async fn region_for(&self, profile: &str) -> Result<Option<String>, CloudError>;
}

/// Run a prepared command with a deadline; the child is killed on timeout
async fn run(mut command: Command, limit: Duration, label: &str) -> Result<Output, CloudError> {
    command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    match timeout(limit, command.output()).await {
        Ok(output) => Ok(output?),
        Err(_) => {
            warn!("{} exceeded {:?}", label, limit);
            Err(CloudError::Timeout(label.to_string()))
        }
    }
}

/// `aws` CLI bound to one profile and region
#[derive(Debug, Clone)]
pub struct AwsCli {
    program: String,
    profile: String,
    region: String,
    timeout: Duration,
}

impl AwsCli {
    pub fn new(profile: impl Into<String>, region: impl Into<String>) -> Self {
        Self {
            program: "aws".to_string(),
            profile: profile.into(),
            region: region.into(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Use a different executable, e.g. an absolute path from the workflow settings
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    fn command(&self, service: &str, operation: &str, args: &[String]) -> Command {
        let mut command = Command::new(&self.program);
        command
            .arg(service)
            .arg(operation)
            .args(args)
            .args(["--output", "json", "--no-cli-pager"])
            .args(["--profile", &self.profile])
            .args(["--region", &self.region]);
        command
    }
}

impl CloudApi for AwsCli {
    async fn call(
        &self,
        service: &str,
        operation: &str,
        args: &[String],
    ) -> Result<Value, CloudError> {
        let label = format!("aws {} {}", service, operation);
        debug!("{} {:?} (profile={}, region={})", label, args, self.profile, self.region);

        let output = run(self.command(service, operation, args), self.timeout, &label).await?;
        if !output.status.success() {
            return Err(CloudError::from_output(&output));
        }

        parse_json_output(&output.stdout)
    }
}

/// Parse CLI stdout; operations with no response body print nothing
pub fn parse_json_output(stdout: &[u8]) -> Result<Value, CloudError> {
    if stdout.iter().all(u8::is_ascii_whitespace) {
        return Ok(Value::Object(Map::new()));
    }
    Ok(serde_json::from_slice(stdout)?)
}

/// `aws configure` based profile discovery
#[derive(Debug, Clone)]
pub struct AwsConfigure {
    program: String,
    timeout: Duration,
}

impl Default for AwsConfigure {
    fn default() -> Self {
        Self {
            program: "aws".to_string(),
            timeout: Duration::from_secs(15),
        }
    }
}

impl AwsConfigure {
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }
}

impl ProfileSource for AwsConfigure {
    async fn list_profiles(&self) -> Result<Vec<String>, CloudError> {
        let mut command = Command::new(&self.program);
        command.args(["configure", "list-profiles"]);

        let output = run(command, self.timeout, "aws configure list-profiles").await?;
        if !output.status.success() {
            return Err(CloudError::from_output(&output));
        }

        Ok(parse_lines(&output.stdout))
    }

    async fn region_for(&self, profile: &str) -> Result<Option<String>, CloudError> {
        let mut command = Command::new(&self.program);
        command.args(["configure", "get", "region", "--profile", profile]);

        let output = run(command, self.timeout, "aws configure get region").await?;
        // `configure get` exits non-zero when the key is simply not set
        if !output.status.success() {
            if output.stderr.is_empty() {
                return Ok(None);
            }
            return Err(CloudError::from_output(&output));
        }

        Ok(parse_lines(&output.stdout).into_iter().next())
    }
}

fn parse_lines(stdout: &[u8]) -> Vec<String> {
    String::from_utf8_lossy(stdout)
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(unix)]
    fn output(code: i32, stdout: &str, stderr: &str) -> Output {
        use std::os::unix::process::ExitStatusExt;
        Output {
            status: std::process::ExitStatus::from_raw(code << 8),
            stdout: stdout.as_bytes().to_vec(),
            stderr: stderr.as_bytes().to_vec(),
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_service_error_code_is_parsed() {
        let out = output(
            254,
            "",
            "\nAn error occurred (NoSuchTagSet) when calling the GetBucketTagging operation: The TagSet does not exist\n",
        );
        let err = CloudError::from_output(&out);
        assert_eq!(err.code(), Some("NoSuchTagSet"));
        assert_eq!(err.to_string(), "NoSuchTagSet: The TagSet does not exist");
    }

    #[cfg(unix)]
    #[test]
    fn test_unrecognised_stderr_is_kept() {
        let out = output(255, "", "The config profile (nope) could not be found\n");
        let err = CloudError::from_output(&out);
        assert_eq!(err.code(), None);
        assert!(err.to_string().contains("could not be found"));
    }

    #[test]
    fn test_empty_stdout_is_empty_object() {
        assert_eq!(parse_json_output(b"").unwrap(), Value::Object(Map::new()));
        assert_eq!(parse_json_output(b" \n").unwrap(), Value::Object(Map::new()));
    }

    #[test]
    fn test_json_stdout_is_parsed() {
        let value = parse_json_output(br#"{"Buckets": [{"Name": "logs"}]}"#).unwrap();
        assert_eq!(value["Buckets"][0]["Name"], "logs");
        assert!(matches!(parse_json_output(b"not json"), Err(CloudError::Decode(_))));
    }

    #[test]
    fn test_parse_lines() {
        assert_eq!(parse_lines(b"default\n  work \n\n"), vec!["default", "work"]);
    }

    #[test]
    fn test_command_carries_profile_and_region() {
        let cli = AwsCli::new("work", "eu-west-1");
        let extra = ["--max-items".to_string(), "10".to_string()];
        let command = cli.command("ec2", "describe-instances", &extra);
        let args: Vec<String> = command
            .as_std()
            .get_args()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();
        assert_eq!(args[..4], ["ec2", "describe-instances", "--max-items", "10"]);
        assert!(args.windows(2).any(|w| w == ["--profile", "work"]));
        assert!(args.windows(2).any(|w| w == ["--region", "eu-west-1"]));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_missing_program_is_launch_error() {
        let cli = AwsCli::new("p", "r").with_program("/nonexistent/aws-workflow-test-bin");
        let err = cli.call("s3api", "list-buckets", &[]).await.unwrap_err();
        assert!(matches!(err, CloudError::Launch(_)));
    }
}
