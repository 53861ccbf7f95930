//! Container service power protocol
//!
//! Container services have no native stopped state. Stopping one records its
//! desired count in the `previous-desired-count` tag and then sets the desired
//! count to zero; starting reads the tag back, removes it and restores the
//! count. The remote service is the only source of truth and no lock is held
//! across the steps, so correctness rests on step order:
//!
//! - stop writes the tag *before* zeroing capacity. If zeroing fails the
//!   service keeps running with a stale tag, and the next stop overwrites it.
//! - start deletes the tag *before* restoring capacity. If restoring fails the
//!   service stays at zero without a tag: a visible stopped service rather than
//!   one that looks stopped-by-us forever.
//!
//! Neither operation rolls back. Callers retry; both operations converge on
//! retry.
//!
//! Start without a tag brings a service at zero up to
//! [`DEFAULT_RESTORE_CAPACITY`], but leaves a service that already has a
//! positive desired count untouched rather than resetting it to that default.

use crate::cloud::api::{ContainerApi, ServiceRecord, Tag, TagStore};
use crate::cloud::http::api_status;
use crate::cloud::Account;
use crate::error::{Error, Result};
use std::sync::Arc;

/// Tag key holding the desired count from before the service was stopped
pub const PRESERVED_CAPACITY_TAG: &str = "previous-desired-count";

/// Capacity restored when no preserved capacity tag exists
pub const DEFAULT_RESTORE_CAPACITY: i32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StopOutcome {
    pub previous_desired_count: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StartOutcome {
    pub desired_count: i32,
    /// The count came from the preserved capacity tag
    pub restored_from_tag: bool,
    /// The service was already running and had no tag; nothing was changed
    pub unchanged: bool,
}

/// Preserved capacity carried by a tag set, if any and if it parses
pub fn preserved_capacity(tags: &[Tag]) -> Option<i32> {
    tags.iter()
        .find(|t| t.key == PRESERVED_CAPACITY_TAG)
        .and_then(|t| t.value.trim().parse::<i32>().ok())
}

pub struct ServiceReconciler {
    containers: Arc<dyn ContainerApi>,
    tags: Arc<dyn TagStore>,
}

impl ServiceReconciler {
    pub fn new(containers: Arc<dyn ContainerApi>, tags: Arc<dyn TagStore>) -> Self {
        Self { containers, tags }
    }

    /// Administratively stop a service.
    ///
    /// Fails with [`Error::AlreadyStopped`] when the desired count is already
    /// zero, so an existing tag is never overwritten with 0.
    pub async fn stop(&self, account: &Account, cluster: &str, service: &str) -> Result<StopOutcome> {
        let record = self.describe(account, cluster, service).await?;
        let desired = record.desired_count;

        if desired <= 0 {
            return Err(Error::AlreadyStopped(record.name()));
        }

        self.tags
            .write(account, &record.service_arn, PRESERVED_CAPACITY_TAG, &desired.to_string())
            .await
            .map_err(|e| map_remote(e, "tag.write", cluster, service))?;

        if let Err(e) = self.containers.update_service(account, cluster, service, 0).await {
            tracing::warn!(
                "Stop of {} left tag {}={} with capacity unchanged; retry stop to converge",
                record.service_arn,
                PRESERVED_CAPACITY_TAG,
                desired
            );
            return Err(map_remote(e, "update_service", cluster, service));
        }

        tracing::info!(
            "Stopped service {} in account {} (previous desired count: {})",
            record.service_arn,
            account.id,
            desired
        );
        Ok(StopOutcome {
            previous_desired_count: desired,
        })
    }

    /// Restore a service stopped by [`Self::stop`], or bring an untagged
    /// service at zero up to [`DEFAULT_RESTORE_CAPACITY`].
    pub async fn start(&self, account: &Account, cluster: &str, service: &str) -> Result<StartOutcome> {
        let record = self.describe(account, cluster, service).await?;

        let tag = self
            .tags
            .read(account, &record.service_arn, PRESERVED_CAPACITY_TAG)
            .await
            .map_err(|e| map_remote(e, "tag.read", cluster, service))?;

        let Some(raw) = tag else {
            if record.desired_count > 0 {
                tracing::info!(
                    "Service {} already running at {} with no preserved capacity, leaving it",
                    record.service_arn,
                    record.desired_count
                );
                return Ok(StartOutcome {
                    desired_count: record.desired_count,
                    restored_from_tag: false,
                    unchanged: true,
                });
            }
            self.set_capacity(account, cluster, service, DEFAULT_RESTORE_CAPACITY)
                .await?;
            return Ok(StartOutcome {
                desired_count: DEFAULT_RESTORE_CAPACITY,
                restored_from_tag: false,
                unchanged: false,
            });
        };

        let (capacity, restored_from_tag) = match raw.trim().parse::<i32>() {
            Ok(n) if n > 0 => (n, true),
            _ => {
                tracing::warn!(
                    "Ignoring invalid {} value {:?} on {}",
                    PRESERVED_CAPACITY_TAG,
                    raw,
                    record.service_arn
                );
                (DEFAULT_RESTORE_CAPACITY, false)
            }
        };

        // Tag goes first: a failed restore must not leave the service looking stopped-by-us
        self.tags
            .delete(account, &record.service_arn, PRESERVED_CAPACITY_TAG)
            .await
            .map_err(|e| map_remote(e, "tag.delete", cluster, service))?;

        self.set_capacity(account, cluster, service, capacity).await?;

        Ok(StartOutcome {
            desired_count: capacity,
            restored_from_tag,
            unchanged: false,
        })
    }

    async fn set_capacity(&self, account: &Account, cluster: &str, service: &str, desired: i32) -> Result<()> {
        self.containers
            .update_service(account, cluster, service, desired)
            .await
            .map_err(|e| map_remote(e, "update_service", cluster, service))?;

        tracing::info!(
            "Started service {} in account {} with desired count {}",
            service,
            account.id,
            desired
        );
        Ok(())
    }

    async fn describe(&self, account: &Account, cluster: &str, service: &str) -> Result<ServiceRecord> {
        let records = self
            .containers
            .describe_services(account, cluster, &[service.to_string()])
            .await
            .map_err(|e| map_remote(e, "describe_services", cluster, service))?;

        records
            .into_iter()
            .find(|r| r.service_arn == service || r.name() == service)
            .ok_or_else(|| not_found(cluster, service))
    }
}

fn not_found(cluster: &str, service: &str) -> Error {
    Error::ServiceNotFound {
        cluster: cluster.to_string(),
        service: service.to_string(),
    }
}

/// 404 means the service is gone; everything else passes through with its cause
fn map_remote(error: anyhow::Error, operation: &str, cluster: &str, service: &str) -> Error {
    if api_status(&error) == Some(404) {
        not_found(cluster, service)
    } else {
        Error::remote(operation, error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cloud::memory::InMemoryCloud;
    use crate::cloud::CredentialHandle;

    const CLUSTER: &str = "arn:aws:ecs:r:1:cluster/clusterX";
    const SERVICE: &str = "arn:aws:ecs:r:1:service/clusterX/svcY";

    fn account() -> Account {
        Account::new("A1", "alpha", "us-east-1", CredentialHandle::new("a", "b"))
    }

    fn setup(desired: i32) -> (Arc<InMemoryCloud>, ServiceReconciler) {
        let cloud = Arc::new(InMemoryCloud::new());
        cloud.add_service(
            "A1",
            CLUSTER,
            ServiceRecord {
                service_arn: SERVICE.to_string(),
                service_name: Some("svcY".to_string()),
                cluster_arn: None,
                desired_count: desired,
                running_count: desired,
                pending_count: 0,
                status: None,
            },
        );
        let reconciler = ServiceReconciler::new(cloud.clone(), cloud.clone());
        (cloud, reconciler)
    }

    #[tokio::test]
    async fn test_stop_writes_tag_before_zeroing() {
        let (cloud, reconciler) = setup(3);

        let outcome = reconciler.stop(&account(), CLUSTER, SERVICE).await.unwrap();

        assert_eq!(outcome.previous_desired_count, 3);
        assert_eq!(cloud.tags("A1", SERVICE), vec![Tag::new(PRESERVED_CAPACITY_TAG, "3")]);
        assert_eq!(cloud.service("A1", CLUSTER, SERVICE).unwrap().desired_count, 0);

        let calls = cloud.calls();
        let tag_at = calls.iter().position(|c| c.contains("tag.write")).unwrap();
        let update_at = calls.iter().position(|c| c.contains("update_service")).unwrap();
        assert!(tag_at < update_at);
    }

    #[tokio::test]
    async fn test_stop_at_zero_is_rejected_without_tag() {
        let (cloud, reconciler) = setup(0);

        let err = reconciler.stop(&account(), CLUSTER, SERVICE).await.unwrap_err();

        assert!(matches!(err, Error::AlreadyStopped(ref name) if name == "svcY"));
        assert!(cloud.tags("A1", SERVICE).is_empty());
    }

    #[tokio::test]
    async fn test_second_stop_is_already_stopped() {
        let (cloud, reconciler) = setup(2);
        reconciler.stop(&account(), CLUSTER, SERVICE).await.unwrap();

        let err = reconciler.stop(&account(), CLUSTER, SERVICE).await.unwrap_err();

        assert!(matches!(err, Error::AlreadyStopped(_)));
        // original capacity is still remembered
        assert_eq!(cloud.tags("A1", SERVICE), vec![Tag::new(PRESERVED_CAPACITY_TAG, "2")]);
    }

    #[tokio::test]
    async fn test_failed_zeroing_leaves_stale_tag_and_retry_converges() {
        let (cloud, reconciler) = setup(4);
        cloud.fail_operation("update_service");

        let err = reconciler.stop(&account(), CLUSTER, SERVICE).await.unwrap_err();
        assert!(matches!(err, Error::RemoteOperationFailed { ref operation, .. } if operation == "update_service"));
        assert_eq!(cloud.service("A1", CLUSTER, SERVICE).unwrap().desired_count, 4);
        assert_eq!(cloud.tags("A1", SERVICE).len(), 1);

        cloud.clear_failures();
        reconciler.stop(&account(), CLUSTER, SERVICE).await.unwrap();
        assert_eq!(cloud.tags("A1", SERVICE), vec![Tag::new(PRESERVED_CAPACITY_TAG, "4")]);
        assert_eq!(cloud.service("A1", CLUSTER, SERVICE).unwrap().desired_count, 0);
    }

    #[tokio::test]
    async fn test_failed_tag_write_changes_nothing() {
        let (cloud, reconciler) = setup(2);
        cloud.fail_operation("tag.write");

        assert!(reconciler.stop(&account(), CLUSTER, SERVICE).await.is_err());
        assert_eq!(cloud.service("A1", CLUSTER, SERVICE).unwrap().desired_count, 2);
        assert!(!cloud.calls().iter().any(|c| c.contains("update_service")));
    }

    #[tokio::test]
    async fn test_start_restores_tagged_capacity_and_removes_tag() {
        let (cloud, reconciler) = setup(5);
        reconciler.stop(&account(), CLUSTER, SERVICE).await.unwrap();

        let outcome = reconciler.start(&account(), CLUSTER, SERVICE).await.unwrap();

        assert_eq!(outcome.desired_count, 5);
        assert!(outcome.restored_from_tag);
        assert!(cloud.tags("A1", SERVICE).is_empty());
        assert_eq!(cloud.service("A1", CLUSTER, SERVICE).unwrap().desired_count, 5);
    }

    #[tokio::test]
    async fn test_start_without_tag_defaults_to_one() {
        let (cloud, reconciler) = setup(0);

        let outcome = reconciler.start(&account(), CLUSTER, SERVICE).await.unwrap();

        assert_eq!(outcome.desired_count, DEFAULT_RESTORE_CAPACITY);
        assert!(!outcome.restored_from_tag);
        assert_eq!(cloud.service("A1", CLUSTER, SERVICE).unwrap().desired_count, 1);
    }

    #[tokio::test]
    async fn test_start_on_running_untagged_service_is_noop() {
        let (cloud, reconciler) = setup(3);

        let outcome = reconciler.start(&account(), CLUSTER, SERVICE).await.unwrap();

        assert!(outcome.unchanged);
        assert_eq!(cloud.service("A1", CLUSTER, SERVICE).unwrap().desired_count, 3);
        assert!(!cloud.calls().iter().any(|c| c.contains("update_service")));
    }

    #[tokio::test]
    async fn test_failed_restore_still_removes_tag() {
        let (cloud, reconciler) = setup(2);
        reconciler.stop(&account(), CLUSTER, SERVICE).await.unwrap();
        cloud.fail_operation("update_service");

        assert!(reconciler.start(&account(), CLUSTER, SERVICE).await.is_err());
        assert!(cloud.tags("A1", SERVICE).is_empty());
        assert_eq!(cloud.service("A1", CLUSTER, SERVICE).unwrap().desired_count, 0);
    }

    #[tokio::test]
    async fn test_invalid_tag_value_falls_back_to_default() {
        let (cloud, reconciler) = setup(0);
        cloud.set_tag("A1", SERVICE, Tag::new(PRESERVED_CAPACITY_TAG, "lots"));

        let outcome = reconciler.start(&account(), CLUSTER, SERVICE).await.unwrap();

        assert_eq!(outcome.desired_count, DEFAULT_RESTORE_CAPACITY);
        assert!(cloud.tags("A1", SERVICE).is_empty());
    }

    #[tokio::test]
    async fn test_missing_service_is_service_not_found() {
        let (cloud, reconciler) = setup(1);
        cloud.remove_service("A1", CLUSTER, SERVICE);

        let err = reconciler.start(&account(), CLUSTER, SERVICE).await.unwrap_err();
        assert!(matches!(err, Error::ServiceNotFound { .. }));

        let err = reconciler.stop(&account(), CLUSTER, SERVICE).await.unwrap_err();
        assert!(matches!(err, Error::ServiceNotFound { .. }));
    }

    #[test]
    fn test_preserved_capacity_parsing() {
        assert_eq!(
            preserved_capacity(&[Tag::new("Name", "x"), Tag::new(PRESERVED_CAPACITY_TAG, "7")]),
            Some(7)
        );
        assert_eq!(preserved_capacity(&[Tag::new(PRESERVED_CAPACITY_TAG, "x")]), None);
        assert_eq!(preserved_capacity(&[]), None);
    }
}
