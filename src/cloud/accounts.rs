//! Account Registry
//!
//! Holds the accounts configured at startup. Accounts come from the config
//! file and from `AWS_ACCOUNT_<n>_*` environment variables; once the registry
//! is built it never changes.

use crate::config::AccountConfig;
use crate::error::{Error, Result};
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use std::fmt;

const ENV_PREFIX: &str = "AWS_ACCOUNT_";

/// Opaque credentials for one account. `Debug` never prints the secret.
#[derive(Clone, PartialEq, Eq)]
pub struct CredentialHandle {
    access_key_id: String,
    secret_access_key: String,
}

impl CredentialHandle {
    pub fn new(access_key_id: impl Into<String>, secret_access_key: impl Into<String>) -> Self {
        Self {
            access_key_id: access_key_id.into(),
            secret_access_key: secret_access_key.into(),
        }
    }

    pub fn access_key_id(&self) -> &str {
        &self.access_key_id
    }

    pub fn secret_access_key(&self) -> &str {
        &self.secret_access_key
    }
}

impl fmt::Debug for CredentialHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialHandle")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .finish()
    }
}

/// One independently credentialed cloud environment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    pub id: String,
    pub display_name: String,
    pub region: String,
    /// Gateway base URL; `None` uses the regional default
    pub endpoint: Option<String>,
    pub credentials: CredentialHandle,
}

impl Account {
    pub fn new(
        id: impl Into<String>,
        display_name: impl Into<String>,
        region: impl Into<String>,
        credentials: CredentialHandle,
    ) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            region: region.into(),
            endpoint: None,
            credentials,
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    fn from_config(config: &AccountConfig) -> Option<Self> {
        if config.id.is_empty()
            || config.name.is_empty()
            || config.region.is_empty()
            || config.access_key_id.is_empty()
            || config.secret_access_key.is_empty()
        {
            return None;
        }

        Some(Self {
            id: config.id.clone(),
            display_name: config.name.clone(),
            region: config.region.clone(),
            endpoint: config.endpoint.clone(),
            credentials: CredentialHandle::new(&config.access_key_id, &config.secret_access_key),
        })
    }
}

/// Account info safe to hand to the view (no credentials)
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PublicAccount {
    pub id: String,
    pub name: String,
    pub region: String,
}

/// Immutable set of configured accounts, in registry order
#[derive(Debug, Clone, Default)]
pub struct AccountRegistry {
    accounts: Vec<Account>,
}

impl AccountRegistry {
    /// Build a registry, dropping accounts whose id was already seen.
    pub fn new(accounts: Vec<Account>) -> Self {
        let mut seen = HashSet::new();
        let accounts = accounts
            .into_iter()
            .filter(|account| {
                let fresh = seen.insert(account.id.clone());
                if !fresh {
                    tracing::warn!("Duplicate account id {}, ignoring", account.id);
                }
                fresh
            })
            .collect();

        Self { accounts }
    }

    /// Load accounts from config entries followed by environment variables.
    pub fn load(configured: &[AccountConfig]) -> Self {
        let mut accounts = Vec::new();

        for entry in configured {
            match Account::from_config(entry) {
                Some(account) => accounts.push(account),
                None => tracing::warn!(
                    "Account {:?} is missing required information, skipping",
                    entry.id
                ),
            }
        }

        accounts.extend(accounts_from_vars(std::env::vars()));

        let registry = Self::new(accounts);
        tracing::info!("Total accounts found: {}", registry.len());
        registry
    }

    pub fn accounts(&self) -> &[Account] {
        &self.accounts
    }

    pub fn get(&self, id: &str) -> Result<&Account> {
        self.accounts
            .iter()
            .find(|a| a.id == id)
            .ok_or_else(|| Error::AccountNotFound(id.to_string()))
    }

    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }

    /// Accounts with credentials stripped
    pub fn public_accounts(&self) -> Vec<PublicAccount> {
        self.accounts
            .iter()
            .map(|a| PublicAccount {
                id: a.id.clone(),
                name: a.display_name.clone(),
                region: a.region.clone(),
            })
            .collect()
    }
}

/// Build accounts from `AWS_ACCOUNT_<n>_{NAME,REGION,ACCESS_KEY_ID,SECRET_ACCESS_KEY}`
/// groups, ordered numerically by `<n>`. Incomplete groups are skipped.
pub fn accounts_from_vars<I>(vars: I) -> Vec<Account>
where
    I: IntoIterator<Item = (String, String)>,
{
    let mut groups: BTreeMap<u64, BTreeMap<String, String>> = BTreeMap::new();

    for (key, value) in vars {
        let Some(rest) = key.strip_prefix(ENV_PREFIX) else {
            continue;
        };
        let Some((index, field)) = rest.split_once('_') else {
            continue;
        };
        let Ok(index) = index.parse::<u64>() else {
            continue;
        };
        groups
            .entry(index)
            .or_default()
            .insert(field.to_string(), value);
    }

    groups
        .into_iter()
        .filter_map(|(index, fields)| {
            // Only groups that declare a NAME are accounts at all
            fields.get("NAME")?;

            let get = |field: &str| fields.get(field).filter(|v| !v.is_empty()).cloned();
            match (
                get("NAME"),
                get("REGION"),
                get("ACCESS_KEY_ID"),
                get("SECRET_ACCESS_KEY"),
            ) {
                (Some(name), Some(region), Some(key_id), Some(secret)) => {
                    let mut account = Account::new(
                        index.to_string(),
                        name,
                        region,
                        CredentialHandle::new(key_id, secret),
                    );
                    account.endpoint = get("ENDPOINT");
                    Some(account)
                }
                _ => {
                    tracing::warn!("Account {} is missing required information.", index);
                    None
                }
            }
        })
        .collect()
}
