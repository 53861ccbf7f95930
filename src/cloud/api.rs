//! Remote provider operations
//!
//! The provider SDK is modelled as a handful of traits, one per service,
//! with plain serde records for request and response shapes. Every call is
//! scoped to one [`Account`]. Implementations return `anyhow::Result`; the
//! adapters translate failures into [`crate::Error`].

use super::accounts::Account;
use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Maximum number of services accepted by one `describe_services` call
pub const DESCRIBE_SERVICES_BATCH: usize = 10;

/// Resource tag
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub key: String,
    pub value: String,
}

impl Tag {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Virtual machine as returned by `describe_instances`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstanceRecord {
    pub instance_id: String,
    /// Raw provider state (`running`, `stopped`, `pending`, ...)
    pub state: String,
    #[serde(default)]
    pub instance_type: String,
    #[serde(default)]
    pub public_ip_address: Option<String>,
    #[serde(default)]
    pub private_ip_address: Option<String>,
    #[serde(default)]
    pub launch_time: Option<String>,
    #[serde(default)]
    pub tags: Vec<Tag>,
}

/// Database connection endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DbEndpoint {
    pub address: String,
    pub port: u16,
}

/// Managed database as returned by `describe_db_instances`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DbInstanceRecord {
    pub db_instance_identifier: String,
    #[serde(default)]
    pub db_name: Option<String>,
    /// Raw provider status (`available`, `stopped`, `starting`, ...)
    pub db_instance_status: String,
    #[serde(default)]
    pub db_instance_class: String,
    #[serde(default)]
    pub engine: String,
    #[serde(default)]
    pub endpoint: Option<DbEndpoint>,
    #[serde(default)]
    pub availability_zone: Option<String>,
    #[serde(default)]
    pub multi_az: bool,
    #[serde(default)]
    pub storage_type: String,
    #[serde(default)]
    pub allocated_storage: u32,
}

/// Container service as returned by `describe_services`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceRecord {
    pub service_arn: String,
    #[serde(default)]
    pub service_name: Option<String>,
    #[serde(default)]
    pub cluster_arn: Option<String>,
    #[serde(default)]
    pub desired_count: i32,
    #[serde(default)]
    pub running_count: i32,
    #[serde(default)]
    pub pending_count: i32,
    #[serde(default)]
    pub status: Option<String>,
}

impl ServiceRecord {
    /// Service name, falling back to the last ARN segment
    pub fn name(&self) -> String {
        self.service_name
            .clone()
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| last_arn_segment(&self.service_arn).to_string())
    }
}

/// Last `/`-separated segment of an ARN (`.../cluster/name` → `name`)
pub fn last_arn_segment(arn: &str) -> &str {
    arn.rsplit('/').next().filter(|s| !s.is_empty()).unwrap_or(arn)
}

#[async_trait]
pub trait ComputeApi: Send + Sync {
    async fn describe_instances(&self, account: &Account) -> Result<Vec<InstanceRecord>>;
    async fn start_instance(&self, account: &Account, instance_id: &str) -> Result<()>;
    async fn stop_instance(&self, account: &Account, instance_id: &str) -> Result<()>;
}

#[async_trait]
pub trait DatabaseApi: Send + Sync {
    async fn describe_db_instances(&self, account: &Account) -> Result<Vec<DbInstanceRecord>>;
    async fn start_db_instance(&self, account: &Account, identifier: &str) -> Result<()>;
    async fn stop_db_instance(&self, account: &Account, identifier: &str) -> Result<()>;
}

#[async_trait]
pub trait ContainerApi: Send + Sync {
    /// Cluster ARNs in the account
    async fn list_clusters(&self, account: &Account) -> Result<Vec<String>>;

    /// Service ARNs in one cluster
    async fn list_services(&self, account: &Account, cluster: &str) -> Result<Vec<String>>;

    /// Details for at most [`DESCRIBE_SERVICES_BATCH`] services. Services that
    /// do not exist are omitted from the result rather than reported as errors.
    async fn describe_services(
        &self,
        account: &Account,
        cluster: &str,
        services: &[String],
    ) -> Result<Vec<ServiceRecord>>;

    async fn update_service(
        &self,
        account: &Account,
        cluster: &str,
        service: &str,
        desired_count: i32,
    ) -> Result<()>;
}

/// Key/value metadata stored on the container service resource itself
#[async_trait]
pub trait TagStore: Send + Sync {
    async fn list_tags(&self, account: &Account, resource_arn: &str) -> Result<Vec<Tag>>;

    async fn read(&self, account: &Account, resource_arn: &str, key: &str) -> Result<Option<String>> {
        let tags = self.list_tags(account, resource_arn).await?;
        Ok(tags.into_iter().find(|t| t.key == key).map(|t| t.value))
    }

    async fn write(&self, account: &Account, resource_arn: &str, key: &str, value: &str)
        -> Result<()>;

    async fn delete(&self, account: &Account, resource_arn: &str, key: &str) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_service_record_defaults() {
        let record: ServiceRecord = serde_json::from_value(json!({
            "serviceArn": "arn:aws:ecs:us-east-1:1:service/prod/web"
        }))
        .unwrap();
        assert_eq!(record.desired_count, 0);
        assert_eq!(record.name(), "web");
    }

    #[test]
    fn test_instance_record_camel_case() {
        let record: InstanceRecord = serde_json::from_value(json!({
            "instanceId": "i-1",
            "state": "running",
            "publicIpAddress": "1.2.3.4",
            "tags": [{"key": "Name", "value": "web"}]
        }))
        .unwrap();
        assert_eq!(record.public_ip_address.as_deref(), Some("1.2.3.4"));
        assert_eq!(record.tags[0], Tag::new("Name", "web"));
    }

    #[test]
    fn test_last_arn_segment() {
        assert_eq!(last_arn_segment("arn:aws:ecs:r:1:cluster/prod"), "prod");
        assert_eq!(last_arn_segment("plain"), "plain");
        assert_eq!(last_arn_segment("trailing/"), "trailing/");
    }
}
