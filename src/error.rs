//! Error taxonomy
//!
//! Errors surfaced by single-resource operations. Aggregation never returns
//! these; per-account failures are swallowed at the account boundary.

use thiserror::Error;

/// Errors returned by adapters, the reconciler and the fleet.
#[derive(Debug, Error)]
pub enum Error {
    /// The referenced account id is not in the registry.
    #[error("account not found: {0}")]
    AccountNotFound(String),

    /// Transport or provider failure. The underlying cause is kept as source.
    #[error("{operation} failed")]
    RemoteOperationFailed {
        operation: String,
        #[source]
        source: anyhow::Error,
    },

    /// The compute instance or database does not exist.
    #[error("resource not found: {0}")]
    ResourceNotFound(String),

    /// Stop was requested on a resource that has nothing running or desired.
    #[error("{0} is already stopped")]
    AlreadyStopped(String),

    /// The container service no longer exists in its cluster.
    #[error("service {service} not found in cluster {cluster}")]
    ServiceNotFound { cluster: String, service: String },
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn remote(operation: impl Into<String>, source: anyhow::Error) -> Self {
        Self::RemoteOperationFailed {
            operation: operation.into(),
            source,
        }
    }

    /// Short name of the variant, used as a structured log field.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::AccountNotFound(_) => "account_not_found",
            Self::RemoteOperationFailed { .. } => "remote_operation_failed",
            Self::ResourceNotFound(_) => "resource_not_found",
            Self::AlreadyStopped(_) => "already_stopped",
            Self::ServiceNotFound { .. } => "service_not_found",
        }
    }
}

/// Format an error for the status line.
///
/// Remote failures are reduced to a generic message keyed on the HTTP status
/// so provider response details never reach the screen.
pub fn format_error(error: &Error) -> String {
    match error {
        Error::RemoteOperationFailed { operation, source } => {
            format!("{}: {}", operation, crate::cloud::http::format_api_error(source))
        }
        other => other.to_string(),
    }
}
