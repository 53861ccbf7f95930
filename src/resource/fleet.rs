//! Fleet: the account registry plus one adapter per resource kind.

use super::adapter::{Ack, ComputeClient, ContainerClient, DatabaseClient, ResourceClient};
use super::aggregator::{aggregate_with_report, FanOut};
use super::model::{ResourceKind, ResourceRef};
use crate::cloud::api::{ComputeApi, ContainerApi, DatabaseApi, TagStore};
use crate::cloud::{AccountRegistry, PublicAccount};
use crate::error::{Error, Result};
use std::collections::HashMap;
use std::sync::Arc;

pub struct Fleet {
    registry: AccountRegistry,
    clients: HashMap<ResourceKind, Arc<dyn ResourceClient>>,
    max_concurrent_accounts: Option<usize>,
}

impl Fleet {
    pub fn new(registry: AccountRegistry, clients: Vec<Arc<dyn ResourceClient>>) -> Self {
        let clients = clients.into_iter().map(|c| (c.kind(), c)).collect();
        Self {
            registry,
            clients,
            max_concurrent_accounts: None,
        }
    }

    /// Wire all three adapters to one provider implementing every remote trait
    pub fn with_provider<P>(registry: AccountRegistry, provider: Arc<P>) -> Self
    where
        P: ComputeApi + DatabaseApi + ContainerApi + TagStore + 'static,
    {
        Self::new(
            registry,
            vec![
                Arc::new(ComputeClient::new(provider.clone())),
                Arc::new(DatabaseClient::new(provider.clone())),
                Arc::new(ContainerClient::new(provider.clone(), provider)),
            ],
        )
    }

    pub fn with_concurrency_limit(mut self, limit: Option<usize>) -> Self {
        self.max_concurrent_accounts = limit.filter(|n| *n > 0);
        self
    }

    pub fn registry(&self) -> &AccountRegistry {
        &self.registry
    }

    pub fn public_accounts(&self) -> Vec<PublicAccount> {
        self.registry.public_accounts()
    }

    fn client(&self, kind: ResourceKind) -> Result<&Arc<dyn ResourceClient>> {
        self.clients
            .get(&kind)
            .ok_or_else(|| Error::ResourceNotFound(format!("no adapter for {}", kind)))
    }

    /// List one kind across every account. Never fails; failed accounts are
    /// reported in [`FanOut::failures`].
    pub async fn list(&self, kind: ResourceKind) -> FanOut {
        let Ok(client) = self.client(kind) else {
            tracing::warn!("No adapter registered for {}", kind);
            return FanOut::default();
        };

        tracing::debug!(
            "Listing {} across {} accounts",
            kind,
            self.registry.len()
        );
        aggregate_with_report(self.registry.accounts(), self.max_concurrent_accounts, |account| {
            client.list(account)
        })
        .await
    }

    pub async fn start(&self, kind: ResourceKind, account_id: &str, target: &ResourceRef) -> Result<Ack> {
        let account = self.registry.get(account_id)?;
        tracing::info!("Start {} {} in account {}", kind, target, account.id);
        self.client(kind)?.start(account, target).await
    }

    pub async fn stop(&self, kind: ResourceKind, account_id: &str, target: &ResourceRef) -> Result<Ack> {
        let account = self.registry.get(account_id)?;
        tracing::info!("Stop {} {} in account {}", kind, target, account.id);
        self.client(kind)?.stop(account, target).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cloud::memory::{demo_fleet, InMemoryCloud};
    use crate::resource::model::{PowerManaged, PowerState};

    fn demo() -> (Fleet, Arc<InMemoryCloud>) {
        let (accounts, cloud) = demo_fleet();
        let cloud = Arc::new(cloud);
        let fleet = Fleet::with_provider(AccountRegistry::new(accounts), cloud.clone());
        (fleet, cloud)
    }

    #[tokio::test]
    async fn test_list_is_in_registry_order() {
        let (fleet, _) = demo();

        let out = fleet.list(ResourceKind::Compute).await;

        let owners: Vec<&str> = out.resources.iter().map(|r| r.account_id()).collect();
        assert_eq!(owners, vec!["1", "1", "2", "3"]);
        assert!(!out.is_partial());
    }

    #[tokio::test]
    async fn test_failing_account_yields_partial_listing() {
        let (fleet, cloud) = demo();
        cloud.fail_account("2");

        let out = fleet.list(ResourceKind::Container).await;

        assert_eq!(out.resources.len(), 2);
        assert_eq!(out.failures.len(), 1);
        assert_eq!(out.failures[0].account_name, "staging");
    }

    #[tokio::test]
    async fn test_unknown_account_is_rejected() {
        let (fleet, _) = demo();
        let err = fleet
            .stop(ResourceKind::Compute, "99", &ResourceRef::instance("i-1"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::AccountNotFound(ref id) if id == "99"));
    }

    #[tokio::test]
    async fn test_stop_service_through_fleet() {
        let (fleet, _) = demo();
        let web = fleet
            .list(ResourceKind::Container)
            .await
            .resources
            .into_iter()
            .find(|r| r.meta().display_name == "web" && r.account_id() == "1")
            .unwrap();

        fleet
            .stop(ResourceKind::Container, "1", &web.resource_ref())
            .await
            .unwrap();

        // demo provider drains on the following listing
        let _ = fleet.list(ResourceKind::Container).await;
        let after = fleet.list(ResourceKind::Container).await;
        let web = after
            .resources
            .iter()
            .filter_map(|r| r.as_container())
            .find(|s| s.meta.display_name == "web" && s.meta.account_id == "1")
            .unwrap();
        assert_eq!(web.desired_count, 0);
        assert_eq!(web.previous_desired_count, Some(3));
        assert_eq!(web.meta.power_state, PowerState::Stopped);
    }

    #[tokio::test]
    async fn test_empty_registry_lists_nothing() {
        let fleet = Fleet::with_provider(AccountRegistry::new(Vec::new()), Arc::new(InMemoryCloud::new()));
        assert!(fleet.list(ResourceKind::Database).await.resources.is_empty());
    }
}
