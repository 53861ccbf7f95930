//! Resource Adapters
//!
//! One adapter per kind normalizes provider records into the snapshot model
//! and dispatches power actions. Every adapter speaks [`ResourceClient`], so
//! the fleet can treat the three kinds uniformly.

use super::model::{
    ComputeInstance, ContainerService, ManagedDatabase, ManagedResource, PowerState, ResourceKind,
    ResourceMeta, ResourceRef,
};
use super::reconciler::{preserved_capacity, ServiceReconciler};
use crate::cloud::api::{
    last_arn_segment, ComputeApi, ContainerApi, DatabaseApi, DbInstanceRecord, InstanceRecord,
    ServiceRecord, TagStore, DESCRIBE_SERVICES_BATCH,
};
use crate::cloud::http::api_status;
use crate::cloud::Account;
use crate::error::{Error, Result};
use async_trait::async_trait;
use futures::future::try_join_all;
use std::sync::Arc;

/// Acknowledgement of an accepted power action
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ack {
    pub message: String,
}

impl Ack {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Uniform interface over the three resource kinds
#[async_trait]
pub trait ResourceClient: Send + Sync {
    fn kind(&self) -> ResourceKind;

    /// Every resource of this kind in one account
    async fn list(&self, account: &Account) -> Result<Vec<ManagedResource>>;

    async fn start(&self, account: &Account, target: &ResourceRef) -> Result<Ack>;

    async fn stop(&self, account: &Account, target: &ResourceRef) -> Result<Ack>;
}

fn meta(account: &Account, resource_id: &str, display_name: String, power_state: PowerState) -> ResourceMeta {
    ResourceMeta {
        account_id: account.id.clone(),
        account_name: account.display_name.clone(),
        resource_id: resource_id.to_string(),
        display_name,
        power_state,
    }
}

/// 404 becomes `ResourceNotFound`; anything else keeps its cause
fn map_error(error: anyhow::Error, operation: &str, target: &str) -> Error {
    if api_status(&error) == Some(404) {
        Error::ResourceNotFound(target.to_string())
    } else {
        Error::remote(operation, error)
    }
}

fn instance_id(target: &ResourceRef) -> Result<&str> {
    match target {
        ResourceRef::Instance(id) => Ok(id),
        other => Err(Error::ResourceNotFound(other.to_string())),
    }
}

// =============================================================================
// Compute
// =============================================================================

pub struct ComputeClient {
    api: Arc<dyn ComputeApi>,
}

impl ComputeClient {
    pub fn new(api: Arc<dyn ComputeApi>) -> Self {
        Self { api }
    }

    fn normalize(account: &Account, record: InstanceRecord) -> ManagedResource {
        let display_name = record
            .tags
            .iter()
            .find(|t| t.key == "Name" && !t.value.is_empty())
            .map(|t| t.value.clone())
            .unwrap_or_else(|| record.instance_id.clone());

        ComputeInstance {
            meta: meta(
                account,
                &record.instance_id,
                display_name,
                PowerState::from_compute_state(&record.state),
            ),
            raw_state: record.state,
            instance_type: record.instance_type,
            public_ip: record.public_ip_address,
            private_ip: record.private_ip_address,
            launch_time: record.launch_time,
        }
        .into()
    }
}

#[async_trait]
impl ResourceClient for ComputeClient {
    fn kind(&self) -> ResourceKind {
        ResourceKind::Compute
    }

    async fn list(&self, account: &Account) -> Result<Vec<ManagedResource>> {
        let records = self
            .api
            .describe_instances(account)
            .await
            .map_err(|e| Error::remote("describe_instances", e))?;

        Ok(records
            .into_iter()
            .map(|r| Self::normalize(account, r))
            .collect())
    }

    async fn start(&self, account: &Account, target: &ResourceRef) -> Result<Ack> {
        let id = instance_id(target)?;
        self.api
            .start_instance(account, id)
            .await
            .map_err(|e| map_error(e, "start_instance", id))?;
        tracing::info!("Start requested for instance {} in account {}", id, account.id);
        Ok(Ack::new(format!("Starting instance {}", id)))
    }

    async fn stop(&self, account: &Account, target: &ResourceRef) -> Result<Ack> {
        let id = instance_id(target)?;
        self.api
            .stop_instance(account, id)
            .await
            .map_err(|e| map_error(e, "stop_instance", id))?;
        tracing::info!("Stop requested for instance {} in account {}", id, account.id);
        Ok(Ack::new(format!("Stopping instance {}", id)))
    }
}

// =============================================================================
// Database
// =============================================================================

pub struct DatabaseClient {
    api: Arc<dyn DatabaseApi>,
}

impl DatabaseClient {
    pub fn new(api: Arc<dyn DatabaseApi>) -> Self {
        Self { api }
    }

    fn normalize(account: &Account, record: DbInstanceRecord) -> ManagedResource {
        let (endpoint, port) = match record.endpoint {
            Some(ep) => (Some(ep.address), Some(ep.port)),
            None => (None, None),
        };

        ManagedDatabase {
            meta: meta(
                account,
                &record.db_instance_identifier,
                record.db_instance_identifier.clone(),
                PowerState::from_database_status(&record.db_instance_status),
            ),
            raw_status: record.db_instance_status,
            engine: record.engine,
            instance_class: record.db_instance_class,
            endpoint,
            port,
            availability_zone: record.availability_zone,
            multi_az: record.multi_az,
            storage_type: record.storage_type,
            allocated_storage: record.allocated_storage,
        }
        .into()
    }
}

#[async_trait]
impl ResourceClient for DatabaseClient {
    fn kind(&self) -> ResourceKind {
        ResourceKind::Database
    }

    async fn list(&self, account: &Account) -> Result<Vec<ManagedResource>> {
        let records = self
            .api
            .describe_db_instances(account)
            .await
            .map_err(|e| Error::remote("describe_db_instances", e))?;

        Ok(records
            .into_iter()
            .map(|r| Self::normalize(account, r))
            .collect())
    }

    async fn start(&self, account: &Account, target: &ResourceRef) -> Result<Ack> {
        let id = instance_id(target)?;
        self.api
            .start_db_instance(account, id)
            .await
            .map_err(|e| map_error(e, "start_db_instance", id))?;
        tracing::info!("Start requested for database {} in account {}", id, account.id);
        Ok(Ack::new(format!("Starting database {}", id)))
    }

    async fn stop(&self, account: &Account, target: &ResourceRef) -> Result<Ack> {
        let id = instance_id(target)?;
        self.api
            .stop_db_instance(account, id)
            .await
            .map_err(|e| map_error(e, "stop_db_instance", id))?;
        tracing::info!("Stop requested for database {} in account {}", id, account.id);
        Ok(Ack::new(format!("Stopping database {}", id)))
    }
}

// =============================================================================
// Container services
// =============================================================================

pub struct ContainerClient {
    containers: Arc<dyn ContainerApi>,
    tags: Arc<dyn TagStore>,
    reconciler: ServiceReconciler,
}

impl ContainerClient {
    pub fn new(containers: Arc<dyn ContainerApi>, tags: Arc<dyn TagStore>) -> Self {
        let reconciler = ServiceReconciler::new(containers.clone(), tags.clone());
        Self {
            containers,
            tags,
            reconciler,
        }
    }

    async fn list_cluster(&self, account: &Account, cluster_arn: &str) -> Result<Vec<ManagedResource>> {
        let service_arns = self
            .containers
            .list_services(account, cluster_arn)
            .await
            .map_err(|e| Error::remote("list_services", e))?;

        let mut records = Vec::with_capacity(service_arns.len());
        for chunk in service_arns.chunks(DESCRIBE_SERVICES_BATCH) {
            let batch = self
                .containers
                .describe_services(account, cluster_arn, chunk)
                .await
                .map_err(|e| Error::remote("describe_services", e))?;
            records.extend(batch);
        }

        let mut out = Vec::with_capacity(records.len());
        for record in records {
            let previous = self.preserved_capacity(account, &record).await;
            out.push(Self::normalize(account, cluster_arn, record, previous));
        }
        Ok(out)
    }

    /// A failed tag lookup only hides the preserved capacity; the service is still listed
    async fn preserved_capacity(&self, account: &Account, record: &ServiceRecord) -> Option<i32> {
        match self.tags.list_tags(account, &record.service_arn).await {
            Ok(tags) => preserved_capacity(&tags),
            Err(e) => {
                tracing::warn!("Failed to read tags for {}: {}", record.service_arn, e);
                None
            }
        }
    }

    fn normalize(
        account: &Account,
        cluster_arn: &str,
        record: ServiceRecord,
        previous_desired_count: Option<i32>,
    ) -> ManagedResource {
        let name = record.name();
        let cluster_arn = record
            .cluster_arn
            .clone()
            .unwrap_or_else(|| cluster_arn.to_string());

        ContainerService {
            meta: meta(
                account,
                &record.service_arn,
                name,
                PowerState::from_service_counts(
                    record.desired_count,
                    record.running_count,
                    record.pending_count,
                ),
            ),
            cluster_name: last_arn_segment(&cluster_arn).to_string(),
            cluster_arn,
            service_arn: record.service_arn,
            desired_count: record.desired_count,
            running_count: record.running_count,
            pending_count: record.pending_count,
            previous_desired_count,
        }
        .into()
    }
}

fn service_target(target: &ResourceRef) -> Result<(&str, &str)> {
    match target {
        ResourceRef::Service { cluster, service } => Ok((cluster, service)),
        other => Err(Error::ResourceNotFound(other.to_string())),
    }
}

#[async_trait]
impl ResourceClient for ContainerClient {
    fn kind(&self) -> ResourceKind {
        ResourceKind::Container
    }

    async fn list(&self, account: &Account) -> Result<Vec<ManagedResource>> {
        let clusters = self
            .containers
            .list_clusters(account)
            .await
            .map_err(|e| Error::remote("list_clusters", e))?;

        let per_cluster = try_join_all(clusters.iter().map(|c| self.list_cluster(account, c))).await?;
        Ok(per_cluster.into_iter().flatten().collect())
    }

    async fn start(&self, account: &Account, target: &ResourceRef) -> Result<Ack> {
        let (cluster, service) = service_target(target)?;
        let outcome = self.reconciler.start(account, cluster, service).await?;
        let name = last_arn_segment(service);

        let message = if outcome.unchanged {
            format!("Service {} is already running ({} tasks)", name, outcome.desired_count)
        } else if outcome.restored_from_tag {
            format!("Starting service {} (restoring {} tasks)", name, outcome.desired_count)
        } else {
            format!("Starting service {} with {} task", name, outcome.desired_count)
        };
        Ok(Ack::new(message))
    }

    async fn stop(&self, account: &Account, target: &ResourceRef) -> Result<Ack> {
        let (cluster, service) = service_target(target)?;
        let outcome = self.reconciler.stop(account, cluster, service).await?;
        Ok(Ack::new(format!(
            "Stopping service {} (was {} tasks)",
            last_arn_segment(service),
            outcome.previous_desired_count
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cloud::api::{Tag, DbEndpoint};
    use crate::cloud::memory::InMemoryCloud;
    use crate::cloud::CredentialHandle;
    use crate::resource::model::PowerManaged;
    use crate::resource::reconciler::PRESERVED_CAPACITY_TAG;

    fn account() -> Account {
        Account::new("7", "dev", "us-east-1", CredentialHandle::new("a", "b"))
    }

    fn service(cluster: &str, name: &str, desired: i32, running: i32) -> ServiceRecord {
        ServiceRecord {
            service_arn: format!("arn:svc/{}/{}", cluster, name),
            service_name: Some(name.to_string()),
            cluster_arn: None,
            desired_count: desired,
            running_count: running,
            pending_count: 0,
            status: None,
        }
    }

    #[tokio::test]
    async fn test_compute_uses_name_tag() {
        let cloud = Arc::new(InMemoryCloud::new());
        cloud.add_instance(
            "7",
            InstanceRecord {
                instance_id: "i-1".into(),
                state: "stopping".into(),
                instance_type: "t3.micro".into(),
                public_ip_address: None,
                private_ip_address: None,
                launch_time: None,
                tags: vec![Tag::new("Name", "web")],
            },
        );
        cloud.add_instance(
            "7",
            InstanceRecord {
                instance_id: "i-2".into(),
                state: "running".into(),
                instance_type: "t3.micro".into(),
                public_ip_address: None,
                private_ip_address: None,
                launch_time: None,
                tags: vec![],
            },
        );
        let client = ComputeClient::new(cloud);

        let resources = client.list(&account()).await.unwrap();

        assert_eq!(resources[0].meta().display_name, "web");
        assert_eq!(resources[0].power_state(), PowerState::Transitioning);
        assert_eq!(resources[1].meta().display_name, "i-2");
        assert_eq!(resources[1].account_id(), "7");
    }

    #[tokio::test]
    async fn test_compute_missing_instance_is_resource_not_found() {
        let client = ComputeClient::new(Arc::new(InMemoryCloud::new()));
        let err = client
            .stop(&account(), &ResourceRef::instance("i-gone"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ResourceNotFound(ref id) if id == "i-gone"));
    }

    #[tokio::test]
    async fn test_service_ref_rejected_by_compute() {
        let client = ComputeClient::new(Arc::new(InMemoryCloud::new()));
        let err = client
            .start(&account(), &ResourceRef::service("c", "s"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ResourceNotFound(_)));
    }

    #[tokio::test]
    async fn test_database_normalization() {
        let cloud = Arc::new(InMemoryCloud::new());
        cloud.add_database(
            "7",
            DbInstanceRecord {
                db_instance_identifier: "orders".into(),
                db_name: None,
                db_instance_status: "available".into(),
                db_instance_class: "db.t3.micro".into(),
                engine: "postgres".into(),
                endpoint: Some(DbEndpoint {
                    address: "orders.internal".into(),
                    port: 5432,
                }),
                availability_zone: None,
                multi_az: true,
                storage_type: "gp3".into(),
                allocated_storage: 20,
            },
        );
        let client = DatabaseClient::new(cloud);

        let resources = client.list(&account()).await.unwrap();

        let ManagedResource::ManagedDatabase(db) = &resources[0] else {
            panic!("expected database");
        };
        assert_eq!(db.meta.power_state, PowerState::Running);
        assert_eq!(db.endpoint.as_deref(), Some("orders.internal"));
        assert_eq!(db.port, Some(5432));
        assert!(db.multi_az);
    }

    #[tokio::test]
    async fn test_database_list_failure_is_remote_error() {
        let cloud = Arc::new(InMemoryCloud::new());
        cloud.fail_account("7");
        let client = DatabaseClient::new(cloud);

        let err = client.list(&account()).await.unwrap_err();
        assert!(matches!(err, Error::RemoteOperationFailed { ref operation, .. } if operation == "describe_db_instances"));
    }

    #[tokio::test]
    async fn test_container_listing_batches_and_reads_tags() {
        let cloud = Arc::new(InMemoryCloud::new());
        for i in 0..12 {
            cloud.add_service("7", "arn:cluster/big", service("big", &format!("s{}", i), 1, 1));
        }
        cloud.add_service("7", "arn:cluster/small", service("small", "api", 0, 0));
        cloud.set_tag("7", "arn:svc/small/api", Tag::new(PRESERVED_CAPACITY_TAG, "4"));
        let client = ContainerClient::new(cloud.clone(), cloud.clone());

        let resources = client.list(&account()).await.unwrap();

        assert_eq!(resources.len(), 13);
        let describes = cloud
            .calls()
            .iter()
            .filter(|c| c.contains("describe_services:arn:cluster/big"))
            .count();
        assert_eq!(describes, 2);

        let api = resources
            .iter()
            .filter_map(|r| r.as_container())
            .find(|s| s.meta.display_name == "api")
            .unwrap();
        assert_eq!(api.cluster_name, "small");
        assert_eq!(api.meta.power_state, PowerState::Stopped);
        assert_eq!(api.previous_desired_count, Some(4));
    }

    #[tokio::test]
    async fn test_container_tag_failure_still_lists_service() {
        let cloud = Arc::new(InMemoryCloud::new());
        cloud.add_service("7", "arn:cluster/prod", service("prod", "web", 2, 2));
        cloud.fail_operation("tag.list");
        let client = ContainerClient::new(cloud.clone(), cloud.clone());

        let resources = client.list(&account()).await.unwrap();

        assert_eq!(resources.len(), 1);
        assert_eq!(resources[0].as_container().unwrap().previous_desired_count, None);
    }

    #[tokio::test]
    async fn test_container_stop_then_start_round_trip() {
        let cloud = Arc::new(InMemoryCloud::new());
        cloud.add_service("7", "arn:cluster/prod", service("prod", "web", 3, 3));
        let client = ContainerClient::new(cloud.clone(), cloud.clone());
        let target = ResourceRef::service("arn:cluster/prod", "arn:svc/prod/web");

        let ack = client.stop(&account(), &target).await.unwrap();
        assert_eq!(ack.message, "Stopping service web (was 3 tasks)");

        let ack = client.start(&account(), &target).await.unwrap();
        assert_eq!(ack.message, "Starting service web (restoring 3 tasks)");
        assert_eq!(cloud.service("7", "prod", "web").unwrap().desired_count, 3);
    }
}
