//! Resource records
//!
//! A record keeps the provider's JSON fields untouched and adds a lower-cased
//! facet map derived from tags, which is what `key:value` filters look up.

use crate::search::Faceted;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;

/// Kinds of AWS resource the workflow can list
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    Ec2,
    S3,
    Rds,
    Cfn,
    Sqs,
    Lambda,
}

impl ResourceKind {
    /// Search order of the result list
    pub const ALL: [ResourceKind; 6] = [
        ResourceKind::Ec2,
        ResourceKind::S3,
        ResourceKind::Rds,
        ResourceKind::Cfn,
        ResourceKind::Sqs,
        ResourceKind::Lambda,
    ];

    /// Short name used in cache names, uids and preview templates
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Ec2 => "ec2",
            ResourceKind::S3 => "s3",
            ResourceKind::Rds => "rds",
            ResourceKind::Cfn => "cfn",
            ResourceKind::Sqs => "sqs",
            ResourceKind::Lambda => "lambda",
        }
    }

    pub fn icon(&self) -> &'static str {
        match self {
            ResourceKind::Ec2 => "icons/ec2_instance.png",
            ResourceKind::S3 => "icons/s3_bucket.png",
            ResourceKind::Rds => "icons/db_instance.png",
            ResourceKind::Cfn => "icons/cfn_stack.png",
            ResourceKind::Sqs => "icons/sqs_queue.png",
            ResourceKind::Lambda => "icons/lambda_function.png",
        }
    }

    /// Raw id convention that switches term matching to id prefix matching
    pub fn id_prefix(&self) -> Option<&'static str> {
        match self {
            ResourceKind::Ec2 => Some("i-"),
            _ => None,
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One listed cloud resource
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    pub kind: ResourceKind,
    /// Provider fields as returned by the API, plus `Tag:<Key>` entries
    pub fields: Map<String, Value>,
    /// Lower-cased tag name to tag value, plus `name` where the kind has one
    #[serde(default)]
    pub facets: BTreeMap<String, String>,
}

impl Resource {
    pub fn new(kind: ResourceKind, fields: Map<String, Value>) -> Self {
        Self {
            kind,
            fields,
            facets: BTreeMap::new(),
        }
    }

    /// Build from a JSON value; anything but an object yields no fields
    pub fn from_value(kind: ResourceKind, value: Value) -> Self {
        match value {
            Value::Object(fields) => Self::new(kind, fields),
            _ => Self::new(kind, Map::new()),
        }
    }

    /// Look up a field by dotted path, e.g. `State.Name`
    pub fn field(&self, path: &str) -> Option<&Value> {
        let mut parts = path.split('.');
        let mut value = self.fields.get(parts.next()?)?;
        for part in parts {
            value = value.get(part)?;
        }
        Some(value)
    }

    pub fn field_str(&self, path: &str) -> Option<&str> {
        self.field(path).and_then(Value::as_str)
    }

    pub fn set_field(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.fields.insert(key.into(), value.into());
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.facets.insert("name".to_string(), name.into());
    }

    /// Add `{"Key": .., "Value": ..}` tags as facets and `Tag:<Key>` fields.
    /// Entries without a string key are skipped.
    pub fn add_tags(&mut self, tags: &[Value]) {
        for tag in tags {
            let Some(key) = tag.get("Key").and_then(Value::as_str) else {
                continue;
            };
            let value = tag.get("Value").and_then(Value::as_str).unwrap_or("");
            self.fields
                .insert(format!("Tag:{}", key), Value::String(value.to_string()));
            self.facets.insert(key.to_lowercase(), value.to_string());
        }
    }

    /// Display name used for free-text matching
    pub fn name(&self) -> &str {
        self.facet("name")
    }

    /// The id a user would recognise the resource by
    pub fn identifier(&self) -> &str {
        let id = match self.kind {
            ResourceKind::Ec2 => self.field_str("InstanceId"),
            ResourceKind::S3 => self.field_str("Name"),
            ResourceKind::Rds => self.facets.get("name").map(String::as_str),
            ResourceKind::Cfn => self.field_str("StackName"),
            ResourceKind::Sqs => self
                .field_str("QueueName")
                .or_else(|| self.field_str("QueueUrl")),
            ResourceKind::Lambda => self.field_str("FunctionName"),
        };
        id.unwrap_or("")
    }

    /// Text matched by free-text terms
    pub fn search_key(&self) -> String {
        match self.kind {
            ResourceKind::Ec2 | ResourceKind::Rds => self.name().to_string(),
            _ => self.identifier().to_string(),
        }
    }

    /// Result list title
    pub fn title(&self) -> String {
        match self.kind {
            ResourceKind::Ec2 => match self.field_str("Tag:Name") {
                Some(name) => format!("{} ({})", name, self.identifier()),
                None => self.identifier().to_string(),
            },
            _ => self.identifier().to_string(),
        }
    }
}

impl Faceted for Resource {
    fn facet(&self, key: &str) -> &str {
        self.facets.get(key).map(String::as_str).unwrap_or("")
    }
}
