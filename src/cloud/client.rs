//! Gateway Client
//!
//! [`HttpCloud`] implements the remote operation traits over the provider
//! gateway's JSON REST API, one base URL per account.

use super::accounts::Account;
use super::api::{
    ComputeApi, ContainerApi, DatabaseApi, DbInstanceRecord, InstanceRecord, ServiceRecord, Tag,
    TagStore,
};
use super::http::ProviderHttpClient;
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use url::Url;
use urlencoding::encode;

/// HTTP-backed provider
#[derive(Clone)]
pub struct HttpCloud {
    http: ProviderHttpClient,
}

impl HttpCloud {
    pub fn new() -> Result<Self> {
        Ok(Self {
            http: ProviderHttpClient::new()?,
        })
    }

    /// Gateway base URL for an account
    pub fn base_url(account: &Account) -> String {
        match &account.endpoint {
            Some(endpoint) => endpoint.trim_end_matches('/').to_string(),
            None => format!("https://gateway.{}.cost-saver.invalid", account.region),
        }
    }

    /// Build a full URL from already-encoded path segments
    fn url(&self, account: &Account, path: &str) -> Result<String> {
        let raw = format!("{}/{}", Self::base_url(account), path);
        let url = Url::parse(&raw).with_context(|| format!("Invalid gateway URL for account {}", account.id))?;
        Ok(url.to_string())
    }

    // =========================================================================
    // Path helpers
    // =========================================================================

    fn compute_url(&self, account: &Account, path: &str) -> Result<String> {
        self.url(account, &format!("compute/{}", path))
    }

    fn database_url(&self, account: &Account, path: &str) -> Result<String> {
        self.url(account, &format!("database/{}", path))
    }

    fn cluster_url(&self, account: &Account, cluster: &str, path: &str) -> Result<String> {
        self.url(account, &format!("container/clusters/{}/{}", encode(cluster), path))
    }

    fn tags_url(&self, account: &Account, resource_arn: &str) -> Result<String> {
        self.url(account, &format!("container/tags/{}", encode(resource_arn)))
    }
}

/// Deserialize `response[field]`, treating a missing field or null body as empty
fn extract_list<T: DeserializeOwned>(response: Value, field: &str) -> Result<Vec<T>> {
    match response {
        Value::Object(mut map) => match map.remove(field) {
            Some(Value::Null) | None => Ok(Vec::new()),
            Some(items) => serde_json::from_value(items)
                .with_context(|| format!("Failed to parse '{}' from response", field)),
        },
        Value::Null => Ok(Vec::new()),
        _ => Err(anyhow::anyhow!("Unexpected response shape, expected object with '{}'", field)),
    }
}

#[async_trait]
impl ComputeApi for HttpCloud {
    async fn describe_instances(&self, account: &Account) -> Result<Vec<InstanceRecord>> {
        let url = self.compute_url(account, "instances")?;
        let response = self.http.get(&url, &account.credentials).await?;
        extract_list(response, "instances")
    }

    async fn start_instance(&self, account: &Account, instance_id: &str) -> Result<()> {
        let url = self.compute_url(account, &format!("instances/{}/start", encode(instance_id)))?;
        self.http.post(&url, &account.credentials, None).await?;
        Ok(())
    }

    async fn stop_instance(&self, account: &Account, instance_id: &str) -> Result<()> {
        let url = self.compute_url(account, &format!("instances/{}/stop", encode(instance_id)))?;
        self.http.post(&url, &account.credentials, None).await?;
        Ok(())
    }
}

#[async_trait]
impl DatabaseApi for HttpCloud {
    async fn describe_db_instances(&self, account: &Account) -> Result<Vec<DbInstanceRecord>> {
        let url = self.database_url(account, "instances")?;
        let response = self.http.get(&url, &account.credentials).await?;
        extract_list(response, "dbInstances")
    }

    async fn start_db_instance(&self, account: &Account, identifier: &str) -> Result<()> {
        let url = self.database_url(account, &format!("instances/{}/start", encode(identifier)))?;
        self.http.post(&url, &account.credentials, None).await?;
        Ok(())
    }

    async fn stop_db_instance(&self, account: &Account, identifier: &str) -> Result<()> {
        let url = self.database_url(account, &format!("instances/{}/stop", encode(identifier)))?;
        self.http.post(&url, &account.credentials, None).await?;
        Ok(())
    }
}

#[async_trait]
impl ContainerApi for HttpCloud {
    async fn list_clusters(&self, account: &Account) -> Result<Vec<String>> {
        let url = self.url(account, "container/clusters")?;
        let response = self.http.get(&url, &account.credentials).await?;
        extract_list(response, "clusterArns")
    }

    async fn list_services(&self, account: &Account, cluster: &str) -> Result<Vec<String>> {
        let url = self.cluster_url(account, cluster, "services")?;
        let response = self.http.get(&url, &account.credentials).await?;
        extract_list(response, "serviceArns")
    }

    async fn describe_services(
        &self,
        account: &Account,
        cluster: &str,
        services: &[String],
    ) -> Result<Vec<ServiceRecord>> {
        let url = self.cluster_url(account, cluster, "services/describe")?;
        let body = json!({ "services": services });
        let response = self.http.post(&url, &account.credentials, Some(&body)).await?;
        extract_list(response, "services")
    }

    async fn update_service(
        &self,
        account: &Account,
        cluster: &str,
        service: &str,
        desired_count: i32,
    ) -> Result<()> {
        let url = self.cluster_url(account, cluster, &format!("services/{}/update", encode(service)))?;
        let body = json!({ "desiredCount": desired_count });
        self.http.post(&url, &account.credentials, Some(&body)).await?;
        Ok(())
    }
}

#[async_trait]
impl TagStore for HttpCloud {
    async fn list_tags(&self, account: &Account, resource_arn: &str) -> Result<Vec<Tag>> {
        let url = self.tags_url(account, resource_arn)?;
        let response = self.http.get(&url, &account.credentials).await?;
        extract_list(response, "tags")
    }

    async fn write(&self, account: &Account, resource_arn: &str, key: &str, value: &str) -> Result<()> {
        let url = self.tags_url(account, resource_arn)?;
        let body = json!({ "tags": [Tag::new(key, value)] });
        self.http.post(&url, &account.credentials, Some(&body)).await?;
        Ok(())
    }

    async fn delete(&self, account: &Account, resource_arn: &str, key: &str) -> Result<()> {
        let url = format!("{}?tagKeys={}", self.tags_url(account, resource_arn)?, encode(key));
        self.http.delete(&url, &account.credentials).await?;
        Ok(())
    }
}
