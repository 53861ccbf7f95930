//! In-memory provider
//!
//! Keeps per-account instances, databases, services and tags in process.
//! Used by `--demo` and by the test suites. Unknown resources answer with a
//! 404 [`ApiStatusError`] like the HTTP gateway does.

use super::accounts::{Account, CredentialHandle};
use super::api::{
    last_arn_segment, ComputeApi, ContainerApi, DatabaseApi, DbEndpoint, DbInstanceRecord,
    InstanceRecord, ServiceRecord, Tag, TagStore,
};
use super::http::ApiStatusError;
use anyhow::Result;
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

#[derive(Debug, Default)]
struct AccountState {
    instances: Vec<InstanceRecord>,
    databases: Vec<DbInstanceRecord>,
    /// cluster ARN → services
    clusters: BTreeMap<String, Vec<ServiceRecord>>,
    /// resource ARN → tags
    tags: HashMap<String, Vec<Tag>>,
}

impl AccountState {
    fn cluster_mut(&mut self, cluster: &str) -> Option<&mut Vec<ServiceRecord>> {
        self.clusters
            .iter_mut()
            .find(|(arn, _)| arn.as_str() == cluster || last_arn_segment(arn) == cluster)
            .map(|(_, services)| services)
    }
}

fn matches_service(record: &ServiceRecord, service: &str) -> bool {
    record.service_arn == service || record.name() == service
}

fn not_found() -> anyhow::Error {
    ApiStatusError { status: 404 }.into()
}

/// Provider whose state lives in memory
#[derive(Debug, Default)]
pub struct InMemoryCloud {
    accounts: Mutex<HashMap<String, AccountState>>,
    failing_accounts: Mutex<HashSet<String>>,
    failing_operations: Mutex<HashSet<String>>,
    calls: Mutex<Vec<String>>,
    simulate_transitions: bool,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl InMemoryCloud {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start/stop pass through a transitional state that settles on the next listing
    pub fn with_transitions(mut self, enabled: bool) -> Self {
        self.simulate_transitions = enabled;
        self
    }

    pub fn add_instance(&self, account_id: &str, record: InstanceRecord) {
        lock(&self.accounts)
            .entry(account_id.to_string())
            .or_default()
            .instances
            .push(record);
    }

    pub fn add_database(&self, account_id: &str, record: DbInstanceRecord) {
        lock(&self.accounts)
            .entry(account_id.to_string())
            .or_default()
            .databases
            .push(record);
    }

    /// Register a cluster with no services
    pub fn add_cluster(&self, account_id: &str, cluster_arn: &str) {
        lock(&self.accounts)
            .entry(account_id.to_string())
            .or_default()
            .clusters
            .entry(cluster_arn.to_string())
            .or_default();
    }

    pub fn add_service(&self, account_id: &str, cluster_arn: &str, mut record: ServiceRecord) {
        record.cluster_arn.get_or_insert_with(|| cluster_arn.to_string());
        lock(&self.accounts)
            .entry(account_id.to_string())
            .or_default()
            .clusters
            .entry(cluster_arn.to_string())
            .or_default()
            .push(record);
    }

    pub fn remove_service(&self, account_id: &str, cluster: &str, service: &str) {
        let mut accounts = lock(&self.accounts);
        if let Some(services) = accounts
            .get_mut(account_id)
            .and_then(|state| state.cluster_mut(cluster))
        {
            services.retain(|s| !matches_service(s, service));
        }
    }

    /// Every call for this account fails with a 503
    pub fn fail_account(&self, account_id: &str) {
        lock(&self.failing_accounts).insert(account_id.to_string());
    }

    /// Every call of this operation (e.g. `"update_service"`, `"tag.write"`) fails with a 500
    pub fn fail_operation(&self, operation: &str) {
        lock(&self.failing_operations).insert(operation.to_string());
    }

    pub fn clear_failures(&self) {
        lock(&self.failing_accounts).clear();
        lock(&self.failing_operations).clear();
    }

    /// Current record of a service, if it exists
    pub fn service(&self, account_id: &str, cluster: &str, service: &str) -> Option<ServiceRecord> {
        let mut accounts = lock(&self.accounts);
        accounts
            .get_mut(account_id)?
            .cluster_mut(cluster)?
            .iter()
            .find(|s| matches_service(s, service))
            .cloned()
    }

    pub fn tags(&self, account_id: &str, resource_arn: &str) -> Vec<Tag> {
        lock(&self.accounts)
            .get(account_id)
            .and_then(|state| state.tags.get(resource_arn).cloned())
            .unwrap_or_default()
    }

    pub fn set_tag(&self, account_id: &str, resource_arn: &str, tag: Tag) {
        let mut accounts = lock(&self.accounts);
        let tags = accounts
            .entry(account_id.to_string())
            .or_default()
            .tags
            .entry(resource_arn.to_string())
            .or_default();
        tags.retain(|t| t.key != tag.key);
        tags.push(tag);
    }

    /// Log of `account:operation:target` entries in call order
    pub fn calls(&self) -> Vec<String> {
        lock(&self.calls).clone()
    }

    /// Record the call and apply failure injection
    fn enter(&self, account: &Account, operation: &str, target: &str) -> Result<()> {
        lock(&self.calls).push(format!("{}:{}:{}", account.id, operation, target));

        if lock(&self.failing_accounts).contains(&account.id) {
            return Err(ApiStatusError { status: 503 }.into());
        }
        if lock(&self.failing_operations).contains(operation) {
            return Err(ApiStatusError { status: 500 }.into());
        }
        Ok(())
    }

    fn with_account<T>(&self, account: &Account, f: impl FnOnce(&mut AccountState) -> Result<T>) -> Result<T> {
        let mut accounts = lock(&self.accounts);
        f(accounts.entry(account.id.clone()).or_default())
    }

    fn set_instance_state(&self, account: &Account, instance_id: &str, running: bool) -> Result<()> {
        let transitions = self.simulate_transitions;
        self.with_account(account, |state| {
            let instance = state
                .instances
                .iter_mut()
                .find(|i| i.instance_id == instance_id)
                .ok_or_else(not_found)?;
            instance.state = match (running, transitions) {
                (true, true) => "pending",
                (true, false) => "running",
                (false, true) => "stopping",
                (false, false) => "stopped",
            }
            .to_string();
            Ok(())
        })
    }

    fn set_database_state(&self, account: &Account, identifier: &str, running: bool) -> Result<()> {
        let transitions = self.simulate_transitions;
        self.with_account(account, |state| {
            let db = state
                .databases
                .iter_mut()
                .find(|d| d.db_instance_identifier == identifier)
                .ok_or_else(not_found)?;
            db.db_instance_status = match (running, transitions) {
                (true, true) => "starting",
                (true, false) => "available",
                (false, true) => "stopping",
                (false, false) => "stopped",
            }
            .to_string();
            Ok(())
        })
    }
}

#[async_trait]
impl ComputeApi for InMemoryCloud {
    async fn describe_instances(&self, account: &Account) -> Result<Vec<InstanceRecord>> {
        self.enter(account, "describe_instances", "*")?;
        let transitions = self.simulate_transitions;
        self.with_account(account, |state| {
            let snapshot = state.instances.clone();
            if transitions {
                for instance in &mut state.instances {
                    match instance.state.as_str() {
                        "pending" => instance.state = "running".to_string(),
                        "stopping" => instance.state = "stopped".to_string(),
                        _ => {}
                    }
                }
            }
            Ok(snapshot)
        })
    }

    async fn start_instance(&self, account: &Account, instance_id: &str) -> Result<()> {
        self.enter(account, "start_instance", instance_id)?;
        self.set_instance_state(account, instance_id, true)
    }

    async fn stop_instance(&self, account: &Account, instance_id: &str) -> Result<()> {
        self.enter(account, "stop_instance", instance_id)?;
        self.set_instance_state(account, instance_id, false)
    }
}

#[async_trait]
impl DatabaseApi for InMemoryCloud {
    async fn describe_db_instances(&self, account: &Account) -> Result<Vec<DbInstanceRecord>> {
        self.enter(account, "describe_db_instances", "*")?;
        let transitions = self.simulate_transitions;
        self.with_account(account, |state| {
            let snapshot = state.databases.clone();
            if transitions {
                for db in &mut state.databases {
                    match db.db_instance_status.as_str() {
                        "starting" => db.db_instance_status = "available".to_string(),
                        "stopping" => db.db_instance_status = "stopped".to_string(),
                        _ => {}
                    }
                }
            }
            Ok(snapshot)
        })
    }

    async fn start_db_instance(&self, account: &Account, identifier: &str) -> Result<()> {
        self.enter(account, "start_db_instance", identifier)?;
        self.set_database_state(account, identifier, true)
    }

    async fn stop_db_instance(&self, account: &Account, identifier: &str) -> Result<()> {
        self.enter(account, "stop_db_instance", identifier)?;
        self.set_database_state(account, identifier, false)
    }
}

#[async_trait]
impl ContainerApi for InMemoryCloud {
    async fn list_clusters(&self, account: &Account) -> Result<Vec<String>> {
        self.enter(account, "list_clusters", "*")?;
        self.with_account(account, |state| Ok(state.clusters.keys().cloned().collect()))
    }

    async fn list_services(&self, account: &Account, cluster: &str) -> Result<Vec<String>> {
        self.enter(account, "list_services", cluster)?;
        self.with_account(account, |state| {
            let services = state.cluster_mut(cluster).ok_or_else(not_found)?;
            Ok(services.iter().map(|s| s.service_arn.clone()).collect())
        })
    }

    async fn describe_services(
        &self,
        account: &Account,
        cluster: &str,
        services: &[String],
    ) -> Result<Vec<ServiceRecord>> {
        self.enter(account, "describe_services", cluster)?;
        let transitions = self.simulate_transitions;
        self.with_account(account, |state| {
            let Some(records) = state.cluster_mut(cluster) else {
                return Ok(Vec::new());
            };
            let mut found = Vec::new();
            for wanted in services {
                if let Some(record) = records.iter_mut().find(|s| matches_service(s, wanted)) {
                    found.push(record.clone());
                    if transitions {
                        record.running_count = record.desired_count;
                        record.pending_count = 0;
                    }
                }
            }
            Ok(found)
        })
    }

    async fn update_service(
        &self,
        account: &Account,
        cluster: &str,
        service: &str,
        desired_count: i32,
    ) -> Result<()> {
        self.enter(account, "update_service", service)?;
        let transitions = self.simulate_transitions;
        self.with_account(account, |state| {
            let record = state
                .cluster_mut(cluster)
                .and_then(|records| records.iter_mut().find(|s| matches_service(s, service)))
                .ok_or_else(not_found)?;
            record.desired_count = desired_count;
            if transitions {
                if desired_count > record.running_count {
                    record.pending_count = desired_count - record.running_count;
                }
            } else {
                record.running_count = desired_count;
                record.pending_count = 0;
            }
            Ok(())
        })
    }
}

#[async_trait]
impl TagStore for InMemoryCloud {
    async fn list_tags(&self, account: &Account, resource_arn: &str) -> Result<Vec<Tag>> {
        self.enter(account, "tag.list", resource_arn)?;
        self.with_account(account, |state| {
            Ok(state.tags.get(resource_arn).cloned().unwrap_or_default())
        })
    }

    async fn write(&self, account: &Account, resource_arn: &str, key: &str, value: &str) -> Result<()> {
        self.enter(account, "tag.write", resource_arn)?;
        self.with_account(account, |state| {
            let tags = state.tags.entry(resource_arn.to_string()).or_default();
            tags.retain(|t| t.key != key);
            tags.push(Tag::new(key, value));
            Ok(())
        })
    }

    async fn delete(&self, account: &Account, resource_arn: &str, key: &str) -> Result<()> {
        self.enter(account, "tag.delete", resource_arn)?;
        self.with_account(account, |state| {
            if let Some(tags) = state.tags.get_mut(resource_arn) {
                tags.retain(|t| t.key != key);
            }
            Ok(())
        })
    }
}

/// Seeded accounts and resources for `--demo`
pub fn demo_fleet() -> (Vec<Account>, InMemoryCloud) {
    let accounts = vec![
        Account::new("1", "production", "ap-northeast-1", CredentialHandle::new("DEMO1", "demo")),
        Account::new("2", "staging", "us-east-1", CredentialHandle::new("DEMO2", "demo")),
        Account::new("3", "sandbox", "eu-west-1", CredentialHandle::new("DEMO3", "demo")),
    ];

    let cloud = InMemoryCloud::new().with_transitions(true);

    let instance = |id: &str, name: &str, state: &str, kind: &str| InstanceRecord {
        instance_id: id.to_string(),
        state: state.to_string(),
        instance_type: kind.to_string(),
        public_ip_address: None,
        private_ip_address: Some("10.0.0.10".to_string()),
        launch_time: Some("2024-04-01T09:00:00Z".to_string()),
        tags: vec![Tag::new("Name", name)],
    };
    cloud.add_instance("1", instance("i-0a1b2c3d", "api-server", "running", "m5.large"));
    cloud.add_instance("1", instance("i-0e4f5a6b", "batch-worker", "stopped", "c5.xlarge"));
    cloud.add_instance("2", instance("i-1a2b3c4d", "staging-web", "running", "t3.medium"));
    cloud.add_instance("3", instance("i-2b3c4d5e", "experiments", "stopped", "t3.small"));

    let database = |id: &str, status: &str, engine: &str| DbInstanceRecord {
        db_instance_identifier: id.to_string(),
        db_name: None,
        db_instance_status: status.to_string(),
        db_instance_class: "db.t3.medium".to_string(),
        engine: engine.to_string(),
        endpoint: Some(DbEndpoint {
            address: format!("{}.internal", id),
            port: 5432,
        }),
        availability_zone: Some("ap-northeast-1a".to_string()),
        multi_az: false,
        storage_type: "gp3".to_string(),
        allocated_storage: 100,
    };
    cloud.add_database("1", database("orders-db", "available", "postgres"));
    cloud.add_database("2", database("staging-db", "stopped", "mysql"));

    let service = |cluster: &str, name: &str, desired: i32| ServiceRecord {
        service_arn: format!("arn:aws:ecs:region:000000000000:service/{}/{}", cluster, name),
        service_name: Some(name.to_string()),
        cluster_arn: None,
        desired_count: desired,
        running_count: desired,
        pending_count: 0,
        status: Some("ACTIVE".to_string()),
    };
    let prod = "arn:aws:ecs:region:000000000000:cluster/prod";
    let stage = "arn:aws:ecs:region:000000000000:cluster/stage";
    cloud.add_service("1", prod, service("prod", "web", 3));
    cloud.add_service("1", prod, service("prod", "worker", 2));
    cloud.add_service("2", stage, service("stage", "web", 1));
    cloud.add_cluster("3", "arn:aws:ecs:region:000000000000:cluster/empty");

    (accounts, cloud)
}
