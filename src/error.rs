//! Error types and handling for the workflow binary

use crate::aws::CloudError;
use thiserror::Error;

/// Application error types
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Timeout: {0}")]
    Timeout(String),
    #[error("Cache error: {0}")]
    CacheError(String),
    #[error("AWS error: {0}")]
    Cloud(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Stable machine-readable code, also logged with each failure
    pub fn error_code(&self) -> &'static str {
        match self {
            AppError::InvalidInput(_) => "invalid_input",
            AppError::Config(_) => "config_error",
            AppError::Timeout(_) => "timeout",
            AppError::CacheError(_) => "cache_error",
            AppError::Cloud(_) => "aws_error",
            AppError::Internal(_) => "internal_error",
        }
    }

    /// Process exit code for the CLI
    pub fn exit_code(&self) -> i32 {
        match self {
            AppError::InvalidInput(_) | AppError::Config(_) => 1,
            AppError::Cloud(_) => 2,
            AppError::Timeout(_) => 3,
            AppError::CacheError(_) | AppError::Internal(_) => 4,
        }
    }
}

impl From<CloudError> for AppError {
    fn from(err: CloudError) -> Self {
        match err {
            CloudError::Timeout(_) => AppError::Timeout(err.to_string()),
            other => AppError::Cloud(other.to_string()),
        }
    }
}

/// Convert anyhow::Error to AppError
impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        match err.downcast::<AppError>() {
            Ok(app) => app,
            Err(err) => match err.downcast::<CloudError>() {
                Ok(cloud) => cloud.into(),
                Err(err) => AppError::Internal(format!("{:#}", err)),
            },
        }
    }
}

/// Convert serde_json::Error to AppError
impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::CacheError(err.to_string())
    }
}

/// Convert std::io::Error to AppError
impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::CacheError(err.to_string())
    }
}

/// Reject values that would escape the cache directory when used in file names
pub fn validate_name_component(kind: &str, value: &str) -> Result<(), AppError> {
    if value.is_empty() {
        return Err(AppError::InvalidInput(format!("{} cannot be empty", kind)));
    }

    if value.contains(['/', '\\']) || value == "." || value == ".." {
        return Err(AppError::InvalidInput(format!(
            "{} must not contain path separators: {}",
            kind, value
        )));
    }

    Ok(())
}
