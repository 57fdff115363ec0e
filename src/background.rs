//! Detached background jobs tracked by pid files
//!
//! A job is named after the cache entry it refreshes. `<name>.pid` in the
//! cache directory holds the pid of the running child; a pid file whose
//! process is gone is treated as stale and removed. `<name>.error` holds the
//! message of the job's last failed run until a run succeeds.

use crate::error::AppError;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::{Duration, SystemTime};
use tracing::{debug, info, warn};

#[cfg(unix)]
fn process_alive(pid: u32) -> bool {
    // Safety: signal 0 only checks that the pid exists
    let rc = unsafe { libc::kill(pid as libc::pid_t, 0) };
    if rc == 0 {
        return true;
    }
    // EPERM: exists but belongs to someone else
    std::io::Error::last_os_error().raw_os_error() == Some(libc::EPERM)
}

#[cfg(not(unix))]
fn process_alive(_pid: u32) -> bool {
    false
}

/// The last failed run of a job
#[derive(Debug, Clone, PartialEq)]
pub struct JobFailure {
    pub message: String,
    /// Time since the failure was recorded
    pub age: Duration,
}

/// Pid-file registry for background jobs
#[derive(Debug, Clone)]
pub struct BackgroundJobs {
    dir: PathBuf,
}

impl BackgroundJobs {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn pid_path(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{}.pid", name))
    }

    pub fn failure_path(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{}.error", name))
    }

    fn read_pid(&self, name: &str) -> Option<u32> {
        fs::read_to_string(self.pid_path(name))
            .ok()
            .and_then(|s| s.trim().parse().ok())
    }

    /// Whether a job called `name` is still running. Stale pid files are
    /// deleted.
    pub fn is_running(&self, name: &str) -> bool {
        let path = self.pid_path(name);
        if !path.exists() {
            return false;
        }

        match self.read_pid(name) {
            Some(pid) if process_alive(pid) => true,
            _ => {
                debug!("Removing stale pid file {}", path.display());
                let _ = fs::remove_file(&path);
                false
            }
        }
    }

    /// Start `program args..` detached from this process unless a job called
    /// `name` is already running. Returns the pid of the new job, or `None`
    /// when one was already running.
    pub fn run_in_background(
        &self,
        name: &str,
        program: &Path,
        args: &[String],
    ) -> Result<Option<u32>, AppError> {
        if self.is_running(name) {
            debug!("Job {} is already running", name);
            return Ok(None);
        }

        fs::create_dir_all(&self.dir)?;

        let mut command = Command::new(program);
        command
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());

        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            // own process group, so the launcher killing the script filter
            // does not take the refresh with it
            command.process_group(0);
        }

        let child = command.spawn().map_err(|e| {
            AppError::Internal(format!("Failed to start background job {}: {}", name, e))
        })?;
        let pid = child.id();
        fs::write(self.pid_path(name), pid.to_string())?;

        info!("Started background job {} (pid {})", name, pid);
        Ok(Some(pid))
    }

    /// Remember why the last run of `name` failed
    pub fn record_failure(&self, name: &str, message: &str) -> Result<(), AppError> {
        fs::create_dir_all(&self.dir)?;
        fs::write(self.failure_path(name), message)?;
        Ok(())
    }

    pub fn clear_failure(&self, name: &str) {
        let path = self.failure_path(name);
        match fs::remove_file(&path) {
            Ok(()) => debug!("Removed {}", path.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!("Failed to remove {}: {}", path.display(), e),
        }
    }

    /// The failure recorded by the last run of `name`, if it failed
    pub fn last_failure(&self, name: &str) -> Option<JobFailure> {
        let path = self.failure_path(name);
        let message = fs::read_to_string(&path).ok()?;
        let age = fs::metadata(&path)
            .and_then(|meta| meta.modified())
            .ok()
            .and_then(|modified| SystemTime::now().duration_since(modified).ok())
            .unwrap_or(Duration::ZERO);

        Some(JobFailure {
            message: message.trim().to_string(),
            age,
        })
    }

    /// Claim the pid file for the current process. The file is removed when
    /// the returned guard is dropped.
    pub fn register_current(&self, name: &str) -> Result<PidGuard, AppError> {
        fs::create_dir_all(&self.dir)?;
        let pid = std::process::id();
        let path = self.pid_path(name);
        fs::write(&path, pid.to_string())?;
        Ok(PidGuard { path, pid })
    }
}

/// Removes a job's pid file on drop if it still names this process
#[derive(Debug)]
pub struct PidGuard {
    path: PathBuf,
    pid: u32,
}

impl Drop for PidGuard {
    fn drop(&mut self) {
        let owned = fs::read_to_string(&self.path)
            .ok()
            .and_then(|s| s.trim().parse::<u32>().ok())
            == Some(self.pid);
        if owned {
            if let Err(e) = fs::remove_file(&self.path) {
                warn!("Failed to remove pid file {}: {}", self.path.display(), e);
            }
        }
    }
}
