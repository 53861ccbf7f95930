//! Resource model
//!
//! Snapshot types produced by every listing. A snapshot is never mutated;
//! each refresh builds a new `Vec<ManagedResource>`.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The three resource kinds the tool can power on and off
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    Compute,
    Database,
    Container,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 3] = [Self::Compute, Self::Database, Self::Container];

    pub fn key(&self) -> &'static str {
        match self {
            Self::Compute => "compute",
            Self::Database => "database",
            Self::Container => "container",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Compute => "VM Instances",
            Self::Database => "Databases",
            Self::Container => "Container Services",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.key() == key)
    }

    /// Next section in tab order
    pub fn next(&self) -> Self {
        match self {
            Self::Compute => Self::Database,
            Self::Database => Self::Container,
            Self::Container => Self::Compute,
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Normalized power state across all kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PowerState {
    Running,
    Stopped,
    Transitioning,
    Unknown,
}

impl PowerState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Running => "RUNNING",
            Self::Stopped => "STOPPED",
            Self::Transitioning => "TRANSITIONING",
            Self::Unknown => "UNKNOWN",
        }
    }

    pub fn is_transitional(&self) -> bool {
        matches!(self, Self::Transitioning)
    }

    /// Map a VM state string
    pub fn from_compute_state(raw: &str) -> Self {
        match raw {
            "running" => Self::Running,
            "stopped" | "terminated" => Self::Stopped,
            "pending" | "stopping" | "shutting-down" => Self::Transitioning,
            _ => Self::Unknown,
        }
    }

    /// Map a database status string
    pub fn from_database_status(raw: &str) -> Self {
        match raw {
            "available" => Self::Running,
            "stopped" => Self::Stopped,
            "starting" | "stopping" | "modifying" | "rebooting" | "creating" | "backing-up"
            | "upgrading" | "deleting" | "renaming" => Self::Transitioning,
            s if s.starts_with("configuring-") => Self::Transitioning,
            _ => Self::Unknown,
        }
    }

    /// Derive a container service state from its task counts
    pub fn from_service_counts(desired: i32, running: i32, pending: i32) -> Self {
        if desired <= 0 && running <= 0 && pending <= 0 {
            Self::Stopped
        } else if desired > 0 && running == desired && pending == 0 {
            Self::Running
        } else {
            Self::Transitioning
        }
    }
}

impl fmt::Display for PowerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identifies a resource within one account
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ResourceRef {
    /// VM instance id or database identifier
    Instance(String),
    /// Container service inside a cluster (ARNs or names)
    Service { cluster: String, service: String },
}

impl ResourceRef {
    pub fn instance(id: impl Into<String>) -> Self {
        Self::Instance(id.into())
    }

    pub fn service(cluster: impl Into<String>, service: impl Into<String>) -> Self {
        Self::Service {
            cluster: cluster.into(),
            service: service.into(),
        }
    }
}

impl fmt::Display for ResourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Instance(id) => f.write_str(id),
            Self::Service { cluster, service } => write!(f, "{}/{}", cluster, service),
        }
    }
}

/// Fields shared by every kind
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResourceMeta {
    pub account_id: String,
    pub account_name: String,
    pub resource_id: String,
    pub display_name: String,
    pub power_state: PowerState,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ComputeInstance {
    pub meta: ResourceMeta,
    pub raw_state: String,
    pub instance_type: String,
    pub public_ip: Option<String>,
    pub private_ip: Option<String>,
    pub launch_time: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ManagedDatabase {
    pub meta: ResourceMeta,
    pub raw_status: String,
    pub engine: String,
    pub instance_class: String,
    pub endpoint: Option<String>,
    pub port: Option<u16>,
    pub availability_zone: Option<String>,
    pub multi_az: bool,
    pub storage_type: String,
    pub allocated_storage: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContainerService {
    pub meta: ResourceMeta,
    pub cluster_name: String,
    pub cluster_arn: String,
    pub service_arn: String,
    pub desired_count: i32,
    pub running_count: i32,
    pub pending_count: i32,
    /// Capacity remembered by the preserved capacity tag, if the service was stopped by this tool
    pub previous_desired_count: Option<i32>,
}

/// Access to the common fields of every kind
pub trait PowerManaged {
    fn meta(&self) -> &ResourceMeta;
    fn kind(&self) -> ResourceKind;
    fn resource_ref(&self) -> ResourceRef;

    fn power_state(&self) -> PowerState {
        self.meta().power_state
    }

    fn account_id(&self) -> &str {
        &self.meta().account_id
    }
}

impl PowerManaged for ComputeInstance {
    fn meta(&self) -> &ResourceMeta {
        &self.meta
    }

    fn kind(&self) -> ResourceKind {
        ResourceKind::Compute
    }

    fn resource_ref(&self) -> ResourceRef {
        ResourceRef::instance(&self.meta.resource_id)
    }
}

impl PowerManaged for ManagedDatabase {
    fn meta(&self) -> &ResourceMeta {
        &self.meta
    }

    fn kind(&self) -> ResourceKind {
        ResourceKind::Database
    }

    fn resource_ref(&self) -> ResourceRef {
        ResourceRef::instance(&self.meta.resource_id)
    }
}

impl PowerManaged for ContainerService {
    fn meta(&self) -> &ResourceMeta {
        &self.meta
    }

    fn kind(&self) -> ResourceKind {
        ResourceKind::Container
    }

    fn resource_ref(&self) -> ResourceRef {
        ResourceRef::service(&self.cluster_arn, &self.service_arn)
    }
}

/// One resource in a snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ManagedResource {
    ComputeInstance(ComputeInstance),
    ManagedDatabase(ManagedDatabase),
    ContainerService(ContainerService),
}

impl ManagedResource {
    fn inner(&self) -> &dyn PowerManaged {
        match self {
            Self::ComputeInstance(r) => r,
            Self::ManagedDatabase(r) => r,
            Self::ContainerService(r) => r,
        }
    }

    /// Composite identity; resource ids are only unique per account
    pub fn key(&self) -> (&str, &str) {
        let meta = self.meta();
        (&meta.account_id, &meta.resource_id)
    }

    pub fn as_container(&self) -> Option<&ContainerService> {
        match self {
            Self::ContainerService(s) => Some(s),
            _ => None,
        }
    }
}

impl PowerManaged for ManagedResource {
    fn meta(&self) -> &ResourceMeta {
        self.inner().meta()
    }

    fn kind(&self) -> ResourceKind {
        self.inner().kind()
    }

    fn resource_ref(&self) -> ResourceRef {
        self.inner().resource_ref()
    }
}

impl From<ComputeInstance> for ManagedResource {
    fn from(r: ComputeInstance) -> Self {
        Self::ComputeInstance(r)
    }
}

impl From<ManagedDatabase> for ManagedResource {
    fn from(r: ManagedDatabase) -> Self {
        Self::ManagedDatabase(r)
    }
}

impl From<ContainerService> for ManagedResource {
    fn from(r: ContainerService) -> Self {
        Self::ContainerService(r)
    }
}

/// True when any resource in the snapshot is changing state
pub fn any_transitional(snapshot: &[ManagedResource]) -> bool {
    snapshot.iter().any(|r| r.power_state().is_transitional())
}
