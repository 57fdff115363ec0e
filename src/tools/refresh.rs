//! Background refresh of one cached listing

use crate::aws::{list_resources, CloudApi};
use crate::background::BackgroundJobs;
use crate::cache::CacheManager;
use crate::cli::BackgroundArgs;
use crate::error::validate_name_component;
use anyhow::{Context, Result};
use std::path::Path;
use tracing::{info, warn};

/// List `args.kind` through `api` and store the result. The job's pid file
/// is held for the duration of the listing so the script filter does not
/// start a second refresh. A failed listing is recorded next to the pid file
/// and the previous listing is left in place.
pub async fn execute_background<C: CloudApi>(
    cache_dir: &Path,
    args: &BackgroundArgs,
    api: &C,
) -> Result<String> {
    validate_name_component("profile", &args.profile)?;
    validate_name_component("region", &args.region)?;

    let data_name = args.data_name.clone().unwrap_or_else(|| {
        CacheManager::data_name(&args.profile, &args.region, args.kind.as_str())
    });
    validate_name_component("data name", &data_name)?;

    let cache = CacheManager::new(cache_dir)?;
    let jobs = BackgroundJobs::new(cache_dir);
    let _guard = jobs.register_current(&data_name)?;

    info!("Refreshing {}", data_name);
    let listing = list_resources(api, args.kind).await;
    if let Err(e) = &listing {
        if let Err(record) = jobs.record_failure(&data_name, &e.to_string()) {
            warn!("Could not record failure of {}: {}", data_name, record);
        }
    }
    let resources = listing.with_context(|| format!("Failed to list {} resources", args.kind))?;

    cache.store(&data_name, &resources)?;
    jobs.clear_failure(&data_name);

    Ok(format!(
        "Cached {} {} resources as {}",
        resources.len(),
        args.kind,
        data_name
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aws::{CloudError, Resource, ResourceKind};
    use serde_json::{json, Value};
    use tempfile::TempDir;

    struct Functions;

    impl CloudApi for Functions {
        async fn call(
            &self,
            service: &str,
            operation: &str,
            _args: &[String],
        ) -> Result<Value, CloudError> {
            assert_eq!((service, operation), ("lambda", "list-functions"));
            Ok(json!({"Functions": [{"FunctionName": "resize"}, {"FunctionName": "thumbs"}]}))
        }
    }

    struct Denied;

    impl CloudApi for Denied {
        async fn call(
            &self,
            _service: &str,
            _operation: &str,
            _args: &[String],
        ) -> Result<Value, CloudError> {
            Err(CloudError::Service {
                code: "AccessDenied".to_string(),
                message: "not allowed".to_string(),
            })
        }
    }

    fn args(data_name: Option<&str>) -> BackgroundArgs {
        BackgroundArgs {
            kind: ResourceKind::Lambda,
            profile: "work".to_string(),
            region: "us-east-1".to_string(),
            data_name: data_name.map(str::to_string),
        }
    }

    #[tokio::test]
    async fn test_refresh_stores_listing() {
        let dir = TempDir::new().unwrap();
        let message = execute_background(dir.path(), &args(None), &Functions).await.unwrap();
        assert_eq!(message, "Cached 2 lambda resources as work-us-east-1-lambda");

        let cache = CacheManager::new(dir.path()).unwrap();
        let entry = cache
            .cached_data::<Vec<Resource>>("work-us-east-1-lambda")
            .unwrap();
        assert_eq!(entry.data[1].identifier(), "thumbs");
        assert!(!BackgroundJobs::new(dir.path()).pid_path("work-us-east-1-lambda").exists());
    }

    #[tokio::test]
    async fn test_refresh_failure_keeps_old_listing() {
        let dir = TempDir::new().unwrap();
        let cache = CacheManager::new(dir.path()).unwrap();
        cache.store("custom", &vec![1]).unwrap();

        let err = execute_background(dir.path(), &args(Some("custom")), &Denied)
            .await
            .unwrap_err();
        assert!(format!("{:#}", err).contains("AccessDenied"));
        assert_eq!(cache.cached_data::<Vec<i32>>("custom").unwrap().data, vec![1]);

        let failure = BackgroundJobs::new(dir.path()).last_failure("custom").unwrap();
        assert_eq!(failure.message, "AccessDenied: not allowed");
    }

    #[tokio::test]
    async fn test_successful_refresh_clears_failure() {
        let dir = TempDir::new().unwrap();
        let jobs = BackgroundJobs::new(dir.path());
        jobs.record_failure("work-us-east-1-lambda", "Throttling: slow down").unwrap();

        execute_background(dir.path(), &args(None), &Functions).await.unwrap();
        assert_eq!(jobs.last_failure("work-us-east-1-lambda"), None);
    }

    #[tokio::test]
    async fn test_refresh_rejects_path_names() {
        let dir = TempDir::new().unwrap();
        let result = execute_background(dir.path(), &args(Some("../x")), &Functions).await;
        assert!(result.is_err());
    }
}
