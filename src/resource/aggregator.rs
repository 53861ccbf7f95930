//! Fan-Out Aggregator
//!
//! Runs one operation per account concurrently and merges the results in
//! registry order. A failing account contributes nothing and is reported;
//! it never aborts the other accounts.

use super::model::ManagedResource;
use crate::cloud::Account;
use crate::error::{format_error, Result};
use futures::stream::{self, StreamExt};
use std::future::Future;

/// An account whose contribution was replaced by an empty list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountFailure {
    pub account_id: String,
    pub account_name: String,
    pub message: String,
}

/// Result of one aggregation pass
#[derive(Debug, Clone, Default)]
pub struct FanOut {
    pub resources: Vec<ManagedResource>,
    pub failures: Vec<AccountFailure>,
}

impl FanOut {
    pub fn is_partial(&self) -> bool {
        !self.failures.is_empty()
    }

    /// One-line summary of failed accounts for the status line
    pub fn failure_summary(&self) -> Option<String> {
        match self.failures.as_slice() {
            [] => None,
            [only] => Some(format!("{}: {}", only.account_name, only.message)),
            many => Some(format!(
                "{} accounts failed: {}",
                many.len(),
                many.iter()
                    .map(|f| f.account_name.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            )),
        }
    }
}

/// Aggregate across accounts, returning only the merged resources
pub async fn aggregate<'a, F, Fut>(accounts: &'a [Account], op: F) -> Vec<ManagedResource>
where
    F: Fn(&'a Account) -> Fut,
    Fut: Future<Output = Result<Vec<ManagedResource>>>,
{
    aggregate_with_report(accounts, None, op).await.resources
}

/// Aggregate across accounts with at most `limit` accounts in flight
/// (`None` = all at once). Always waits for every account.
pub async fn aggregate_with_report<'a, F, Fut>(
    accounts: &'a [Account],
    limit: Option<usize>,
    op: F,
) -> FanOut
where
    F: Fn(&'a Account) -> Fut,
    Fut: Future<Output = Result<Vec<ManagedResource>>>,
{
    let limit = limit.unwrap_or(accounts.len()).max(1);

    // Futures are built up front so the stream holds no borrowing closure
    // and the whole pass stays `Send` for `tokio::spawn`.
    let pending: Vec<_> = accounts
        .iter()
        .map(|account| {
            let fut = op(account);
            async move { (account, fut.await) }
        })
        .collect();

    // `buffered` keeps input order regardless of completion order
    let results: Vec<(&Account, Result<Vec<ManagedResource>>)> =
        stream::iter(pending).buffered(limit).collect().await;

    let mut out = FanOut::default();
    for (account, result) in results {
        match result {
            Ok(items) => {
                tracing::debug!("Account {} returned {} resources", account.id, items.len());
                out.resources.extend(items);
            }
            Err(e) => {
                let message = format_error(&e);
                tracing::warn!(
                    kind = e.kind(),
                    "Error for account {} ({}), using empty result: {}",
                    account.id,
                    account.display_name,
                    message
                );
                tracing::debug!("Account {} failure detail: {:?}", account.id, e);
                out.failures.push(AccountFailure {
                    account_id: account.id.clone(),
                    account_name: account.display_name.clone(),
                    message,
                });
            }
        }
    }

    tracing::debug!(
        "Aggregated {} resources from {} accounts ({} failed)",
        out.resources.len(),
        accounts.len(),
        out.failures.len()
    );
    out
}
