//! Utility functions for tools

use crate::aws::Resource;
use serde_json::{Map, Value};

/// Regional AWS console page, e.g.
/// `https://eu-west-1.console.aws.amazon.com/ec2/v2/home?region=eu-west-1`
pub fn regional_console_url(region: &str, path: &str) -> String {
    format!(
        "https://{region}.console.aws.amazon.com/{path}?region={region}",
        region = region,
        path = path
    )
}

/// Global AWS console page that still takes the region as a parameter
pub fn global_console_url(region: &str, path: &str) -> String {
    format!("https://console.aws.amazon.com/{}?region={}", path, region)
}

/// Console page listing one EC2 instance
pub fn ec2_instance_url(region: &str, instance_id: &str) -> String {
    format!(
        "{}#Instances:search={};sort=instanceState",
        regional_console_url(region, "ec2/v2/home"),
        instance_id
    )
}

/// Console page of one S3 bucket
pub fn s3_bucket_url(region: &str, bucket: &str) -> String {
    format!(
        "{}&bucket={}&prefix=",
        global_console_url(region, "s3/home"),
        urlencoding::encode(bucket)
    )
}

/// Console page of one RDS instance or cluster
pub fn rds_database_url(region: &str, id: &str, is_cluster: bool) -> String {
    format!(
        "{}#database:id={};is-cluster={}",
        regional_console_url(region, "rds/home"),
        urlencoding::encode(id),
        is_cluster
    )
}

/// Console page of one CloudFormation stack
pub fn cfn_stack_url(region: &str, stack_id: &str) -> String {
    format!(
        "{}#/stacks/stackinfo?stackId={}",
        regional_console_url(region, "cloudformation/home"),
        urlencoding::encode(stack_id)
    )
}

/// Console page of one SQS queue, addressed by its URL
pub fn sqs_queue_url(region: &str, queue_url: &str) -> String {
    format!(
        "{}#/queues/{}",
        regional_console_url(region, "sqs/v2/home"),
        urlencoding::encode(queue_url)
    )
}

/// Console page of one Lambda function
pub fn lambda_function_url(region: &str, name: &str) -> String {
    format!(
        "{}#/functions/{}",
        regional_console_url(region, "lambda/home"),
        urlencoding::encode(name)
    )
}

/// Base URL of the local preview server
pub fn quicklook_base(port: u16) -> String {
    format!("http://localhost:{}/quicklook", port)
}

/// Preview URL of one result:
/// `{base}/{kind}?template={kind}&context={"title", "uid", "<kind>": fields}`
pub fn quicklook_url(base: &str, resource: &Resource, title: &str, uid: &str) -> String {
    let kind = resource.kind.as_str();

    let mut context = Map::new();
    context.insert("title".to_string(), Value::String(title.to_string()));
    context.insert("uid".to_string(), Value::String(uid.to_string()));
    context.insert(kind.to_string(), Value::Object(resource.fields.clone()));
    let context = Value::Object(context).to_string();

    let query = url::form_urlencoded::Serializer::new(String::new())
        .append_pair("template", kind)
        .append_pair("context", &context)
        .finish();

    format!("{}/{}?{}", base.trim_end_matches('/'), kind, query)
}
