//! Resource listing per kind
//!
//! Each listing makes the initial (paginated) list call and then, where the
//! list response carries no tags, fetches tags or attributes per resource
//! with at most [`TAG_CONCURRENCY`] calls in flight. A failed per-resource
//! fetch never fails the listing; the resource is kept with empty facets.

use super::client::{CloudApi, CloudError};
use super::records::{Resource, ResourceKind};
use futures::stream::{self, StreamExt};
use serde_json::Value;
use tracing::{debug, info, warn};

/// Maximum concurrent per-resource calls
pub const TAG_CONCURRENCY: usize = 4;

/// Items requested per page
const PAGE_SIZE: usize = 1000;

/// List every resource of `kind` visible to the client's profile and region
pub async fn list_resources<C: CloudApi>(
    api: &C,
    kind: ResourceKind,
) -> Result<Vec<Resource>, CloudError> {
    let resources = match kind {
        ResourceKind::Ec2 => list_ec2_instances(api).await?,
        ResourceKind::S3 => list_s3_buckets(api).await?,
        ResourceKind::Rds => list_rds_databases(api).await?,
        ResourceKind::Cfn => list_cfn_stacks(api).await?,
        ResourceKind::Sqs => list_sqs_queues(api).await?,
        ResourceKind::Lambda => list_lambda_functions(api).await?,
    };
    info!("Listed {} {} resources", resources.len(), kind);
    Ok(resources)
}

/// Call a list operation until the CLI stops returning `NextToken`,
/// collecting the array under `key` from every page
async fn paginate<C: CloudApi>(
    api: &C,
    service: &str,
    operation: &str,
    args: &[String],
    key: &str,
) -> Result<Vec<Value>, CloudError> {
    let mut items = Vec::new();
    let mut token: Option<String> = None;

    loop {
        let mut page_args = args.to_vec();
        page_args.push("--max-items".to_string());
        page_args.push(PAGE_SIZE.to_string());
        if let Some(token) = &token {
            page_args.push("--starting-token".to_string());
            page_args.push(token.clone());
        }

        debug!("calling {} {}", service, operation);
        let mut response = api.call(service, operation, &page_args).await?;
        if let Some(Value::Array(page)) = response.get_mut(key).map(Value::take) {
            items.extend(page);
        }

        match response.get("NextToken").and_then(Value::as_str) {
            Some(next) => token = Some(next.to_string()),
            None => break,
        }
    }

    Ok(items)
}

/// Take the array under `key`, or nothing
fn take_array(mut response: Value, key: &str) -> Vec<Value> {
    match response.get_mut(key).map(Value::take) {
        Some(Value::Array(items)) => items,
        _ => Vec::new(),
    }
}

/// Tags returned inline by the list call (EC2, CloudFormation)
fn embedded_tags(resource: &Resource) -> Vec<Value> {
    resource
        .field("Tags")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default()
}

fn args(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}

/// Fetch the tag array under `key`; `NoSuchTagSet` means no tags, other
/// errors are logged and also treated as no tags
async fn fetch_tags<C: CloudApi>(
    api: &C,
    service: &str,
    operation: &str,
    call_args: Vec<String>,
    key: &str,
) -> Vec<Value> {
    match api.call(service, operation, &call_args).await {
        Ok(response) => take_array(response, key),
        Err(e) if e.code() == Some("NoSuchTagSet") => Vec::new(),
        Err(e) => {
            warn!("{} {} failed: {}", service, operation, e);
            Vec::new()
        }
    }
}

async fn list_ec2_instances<C: CloudApi>(api: &C) -> Result<Vec<Resource>, CloudError> {
    let filter = args(&["--filters", "Name=instance-state-name,Values=running"]);
    let reservations = paginate(api, "ec2", "describe-instances", &filter, "Reservations").await?;

    let mut instances = Vec::new();
    for reservation in reservations {
        for instance in take_array(reservation, "Instances") {
            let mut resource = Resource::from_value(ResourceKind::Ec2, instance);
            let tags = embedded_tags(&resource);
            resource.add_tags(&tags);
            instances.push(resource);
        }
    }
    Ok(instances)
}

async fn list_s3_buckets<C: CloudApi>(api: &C) -> Result<Vec<Resource>, CloudError> {
    let response = api.call("s3api", "list-buckets", &[]).await?;
    let buckets = take_array(response, "Buckets");

    let buckets: Vec<Resource> = stream::iter(buckets.into_iter().map(|bucket| async move {
        let mut resource = Resource::from_value(ResourceKind::S3, bucket);
        let name = resource.identifier().to_string();
        let tags = fetch_tags(
            api,
            "s3api",
            "get-bucket-tagging",
            args(&["--bucket", name.as_str()]),
            "TagSet",
        )
        .await;
        resource.set_field("TagSet", tags.clone());
        resource.add_tags(&tags);
        resource
    }))
    .buffered(TAG_CONCURRENCY)
    .collect()
    .await;

    Ok(buckets)
}

async fn list_rds_databases<C: CloudApi>(api: &C) -> Result<Vec<Resource>, CloudError> {
    let clusters = paginate(api, "rds", "describe-db-clusters", &[], "DBClusters").await?;
    let clusters = clusters.into_iter().map(|cluster| {
        let mut resource = Resource::from_value(ResourceKind::Rds, cluster);
        resource.set_field("type", "cluster");
        let endpoint = resource.field_str("Endpoint").unwrap_or("").to_string();
        resource.set_name(endpoint);
        let arn = resource.field_str("DBClusterArn").unwrap_or("").to_string();
        (resource, arn)
    });

    let instances = paginate(api, "rds", "describe-db-instances", &[], "DBInstances").await?;
    let instances = instances
        .into_iter()
        // cluster members are reached through their cluster
        .filter(|db| db.get("DBClusterIdentifier").is_none())
        .map(|db| {
            let mut resource = Resource::from_value(ResourceKind::Rds, db);
            resource.set_field("type", "instance");
            let endpoint = resource
                .field_str("Endpoint.Address")
                .unwrap_or("")
                .to_string();
            resource.set_name(endpoint);
            let arn = resource.field_str("DBInstanceArn").unwrap_or("").to_string();
            (resource, arn)
        });

    let tagged = clusters.chain(instances).map(|(mut resource, arn)| async move {
        let tags = fetch_tags(
            api,
            "rds",
            "list-tags-for-resource",
            args(&["--resource-name", arn.as_str()]),
            "TagList",
        )
        .await;
        resource.set_field("TagList", tags.clone());
        resource.add_tags(&tags);
        resource
    });

    let databases: Vec<Resource> = stream::iter(tagged)
        .buffered(TAG_CONCURRENCY)
        .collect()
        .await;

    Ok(databases)
}

async fn list_cfn_stacks<C: CloudApi>(api: &C) -> Result<Vec<Resource>, CloudError> {
    let stacks = paginate(api, "cloudformation", "describe-stacks", &[], "Stacks").await?;

    Ok(stacks
        .into_iter()
        .map(|stack| {
            let mut resource = Resource::from_value(ResourceKind::Cfn, stack);
            let name = resource.identifier().to_string();
            resource.set_name(name);
            let tags = embedded_tags(&resource);
            resource.add_tags(&tags);
            resource
        })
        .collect())
}

async fn list_sqs_queues<C: CloudApi>(api: &C) -> Result<Vec<Resource>, CloudError> {
    let urls = paginate(api, "sqs", "list-queues", &[], "QueueUrls").await?;

    let queues: Vec<Resource> = stream::iter(urls.into_iter().filter_map(|url| match url {
        Value::String(url) => Some(url),
        _ => None,
    }))
    .map(|url| async move {
        let mut resource = Resource::new(ResourceKind::Sqs, Default::default());
        resource.set_field("QueueUrl", url.as_str());

        let call_args = args(&["--queue-url", url.as_str(), "--attribute-names", "All"]);
        match api.call("sqs", "get-queue-attributes", &call_args).await {
            Ok(response) => {
                if let Some(Value::Object(attributes)) = response.get("Attributes") {
                    for (key, value) in attributes {
                        resource.set_field(key.clone(), value.clone());
                    }
                }
            }
            Err(e) => warn!("sqs get-queue-attributes failed for {}: {}", url, e),
        }

        let name = queue_name(
            resource.field_str("QueueArn"),
            resource.field_str("QueueUrl").unwrap_or(""),
        );
        resource.set_field("QueueName", name.clone());
        resource.set_name(name);
        resource
    })
    .buffered(TAG_CONCURRENCY)
    .collect()
    .await;

    Ok(queues)
}

/// Queue name is the last ARN segment, or the last URL path segment when
/// attributes could not be read
fn queue_name(arn: Option<&str>, url: &str) -> String {
    match arn {
        Some(arn) => arn.rsplit(':').next().unwrap_or(arn).to_string(),
        None => url.trim_end_matches('/').rsplit('/').next().unwrap_or(url).to_string(),
    }
}

async fn list_lambda_functions<C: CloudApi>(api: &C) -> Result<Vec<Resource>, CloudError> {
    let functions = paginate(api, "lambda", "list-functions", &[], "Functions").await?;

    Ok(functions
        .into_iter()
        .map(|function| {
            let mut resource = Resource::from_value(ResourceKind::Lambda, function);
            let name = resource.identifier().to_string();
            resource.set_name(name);
            resource
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::Faceted;
    use serde_json::json;
    use std::sync::Mutex;

    type Handler = dyn Fn(&str, &str, &[String]) -> Result<Value, CloudError> + Send + Sync;

    /// Canned responses keyed by `service operation`, recording every call
    struct MockApi {
        handler: Box<Handler>,
        calls: Mutex<Vec<(String, Vec<String>)>>,
    }

    impl MockApi {
        fn new<F>(handler: F) -> Self
        where
            F: Fn(&str, &str, &[String]) -> Result<Value, CloudError> + Send + Sync + 'static,
        {
            Self {
                handler: Box::new(handler),
                calls: Mutex::new(Vec::new()),
            }
        }

        fn calls_to(&self, operation: &str) -> Vec<Vec<String>> {
            self.calls
                .lock()
                .unwrap()
                .iter()
                .filter(|(op, _)| op == operation)
                .map(|(_, args)| args.clone())
                .collect()
        }
    }

    impl CloudApi for MockApi {
        async fn call(
            &self,
            service: &str,
            operation: &str,
            args: &[String],
        ) -> Result<Value, CloudError> {
            self.calls
                .lock()
                .unwrap()
                .push((operation.to_string(), args.to_vec()));
            (self.handler)(service, operation, args)
        }
    }

    fn arg_after<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
        args.iter()
            .position(|a| a == flag)
            .and_then(|i| args.get(i + 1))
            .map(String::as_str)
    }

    fn service_error(code: &str) -> CloudError {
        CloudError::Service {
            code: code.to_string(),
            message: "test".to_string(),
        }
    }

    #[tokio::test]
    async fn test_ec2_paginates_and_tags() {
        let api = MockApi::new(|_, op, args| {
            assert_eq!(op, "describe-instances");
            assert_eq!(
                arg_after(args, "--filters"),
                Some("Name=instance-state-name,Values=running")
            );
            match arg_after(args, "--starting-token") {
                None => Ok(json!({
                    "Reservations": [{"Instances": [{
                        "InstanceId": "i-1",
                        "Tags": [{"Key": "Name", "Value": "web"}]
                    }]}],
                    "NextToken": "page2"
                })),
                Some("page2") => Ok(json!({
                    "Reservations": [{"Instances": [{"InstanceId": "i-2"}, {"InstanceId": "i-3"}]}]
                })),
                Some(other) => panic!("unexpected token {}", other),
            }
        });

        let instances = list_resources(&api, ResourceKind::Ec2).await.unwrap();
        let ids: Vec<&str> = instances.iter().map(|r| r.identifier()).collect();
        assert_eq!(ids, vec!["i-1", "i-2", "i-3"]);
        assert_eq!(instances[0].facet("name"), "web");
        assert_eq!(instances[0].field_str("Tag:Name"), Some("web"));
        assert_eq!(api.calls_to("describe-instances").len(), 2);
    }

    #[tokio::test]
    async fn test_s3_missing_tag_set_keeps_bucket() {
        let api = MockApi::new(|_, op, args| match op {
            "list-buckets" => Ok(json!({"Buckets": [
                {"Name": "logs"}, {"Name": "assets"}, {"Name": "locked"}
            ]})),
            "get-bucket-tagging" => match arg_after(args, "--bucket") {
                Some("assets") => Ok(json!({"TagSet": [{"Key": "Team", "Value": "web"}]})),
                Some("logs") => Err(service_error("NoSuchTagSet")),
                _ => Err(service_error("AccessDenied")),
            },
            other => panic!("unexpected operation {}", other),
        });

        let buckets = list_resources(&api, ResourceKind::S3).await.unwrap();
        let names: Vec<&str> = buckets.iter().map(|r| r.identifier()).collect();
        assert_eq!(names, vec!["logs", "assets", "locked"]);
        assert!(buckets[0].facets.is_empty());
        assert_eq!(buckets[1].facet("team"), "web");
        assert!(buckets[2].facets.is_empty());
        assert_eq!(api.calls_to("get-bucket-tagging").len(), 3);
    }

    #[tokio::test]
    async fn test_s3_list_failure_is_an_error() {
        let api = MockApi::new(|_, _, _| Err(service_error("ExpiredToken")));
        let err = list_resources(&api, ResourceKind::S3).await.unwrap_err();
        assert_eq!(err.code(), Some("ExpiredToken"));
    }

    #[tokio::test]
    async fn test_rds_skips_cluster_members() {
        let api = MockApi::new(|_, op, args| match op {
            "describe-db-clusters" => Ok(json!({"DBClusters": [{
                "DBClusterArn": "arn:cluster",
                "Endpoint": "cluster.example.com"
            }]})),
            "describe-db-instances" => Ok(json!({"DBInstances": [
                {"DBInstanceArn": "arn:member", "DBClusterIdentifier": "c1",
                 "Endpoint": {"Address": "member.example.com"}},
                {"DBInstanceArn": "arn:solo", "Endpoint": {"Address": "solo.example.com"}}
            ]})),
            "list-tags-for-resource" => match arg_after(args, "--resource-name") {
                Some("arn:solo") => Ok(json!({"TagList": [{"Key": "Env", "Value": "prod"}]})),
                _ => Ok(json!({"TagList": []})),
            },
            other => panic!("unexpected operation {}", other),
        });

        let dbs = list_resources(&api, ResourceKind::Rds).await.unwrap();
        let names: Vec<&str> = dbs.iter().map(|r| r.name()).collect();
        assert_eq!(names, vec!["cluster.example.com", "solo.example.com"]);
        assert_eq!(dbs[0].field_str("type"), Some("cluster"));
        assert_eq!(dbs[1].field_str("type"), Some("instance"));
        assert_eq!(dbs[1].facet("env"), "prod");
        assert_eq!(api.calls_to("list-tags-for-resource").len(), 2);
    }

    #[tokio::test]
    async fn test_cfn_name_and_tags() {
        let api = MockApi::new(|_, _, _| {
            Ok(json!({"Stacks": [{
                "StackName": "network",
                "StackStatus": "UPDATE_COMPLETE",
                "Tags": [{"Key": "Owner", "Value": "infra"}]
            }]}))
        });

        let stacks = list_resources(&api, ResourceKind::Cfn).await.unwrap();
        assert_eq!(stacks.len(), 1);
        assert_eq!(stacks[0].name(), "network");
        assert_eq!(stacks[0].facet("owner"), "infra");
    }

    #[tokio::test]
    async fn test_sqs_attributes_and_name() {
        let api = MockApi::new(|_, op, args| match op {
            "list-queues" => Ok(json!({"QueueUrls": [
                "https://sqs.eu-west-1.amazonaws.com/1/jobs",
                "https://sqs.eu-west-1.amazonaws.com/1/broken"
            ]})),
            "get-queue-attributes" => {
                match arg_after(args, "--queue-url") {
                    Some(url) if url.ends_with("/jobs") => Ok(json!({"Attributes": {
                        "QueueArn": "arn:aws:sqs:eu-west-1:1:jobs",
                        "ApproximateNumberOfMessages": "3"
                    }})),
                    _ => Err(service_error("AccessDenied")),
                }
            }
            other => panic!("unexpected operation {}", other),
        });

        let queues = list_resources(&api, ResourceKind::Sqs).await.unwrap();
        assert_eq!(queues.len(), 2);
        assert_eq!(queues[0].identifier(), "jobs");
        assert_eq!(queues[0].field_str("ApproximateNumberOfMessages"), Some("3"));
        assert_eq!(queues[1].identifier(), "broken");
        assert_eq!(
            queues[1].field_str("QueueUrl"),
            Some("https://sqs.eu-west-1.amazonaws.com/1/broken")
        );
    }

    #[tokio::test]
    async fn test_sqs_without_queues() {
        let api = MockApi::new(|_, _, _| Ok(json!({})));
        assert!(list_resources(&api, ResourceKind::Sqs).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_lambda_functions() {
        let api = MockApi::new(|_, _, _| {
            Ok(json!({"Functions": [{"FunctionName": "resize", "Runtime": "python3.12"}]}))
        });
        let functions = list_resources(&api, ResourceKind::Lambda).await.unwrap();
        assert_eq!(functions[0].name(), "resize");
        assert_eq!(functions[0].field_str("Runtime"), Some("python3.12"));
    }

    #[test]
    fn test_queue_name() {
        assert_eq!(queue_name(Some("arn:aws:sqs:us-east-1:1:orders"), ""), "orders");
        assert_eq!(queue_name(None, "https://sqs.x/1/orders/"), "orders");
    }
}
