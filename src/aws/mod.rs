//! AWS collaborator: the `aws` CLI client, resource records and listings

pub mod client;
pub mod provider;
pub mod records;

pub use client::{AwsCli, AwsConfigure, CloudApi, CloudError, ProfileSource};
pub use provider::list_resources;
pub use records::{Resource, ResourceKind};
