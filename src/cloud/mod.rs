//! Provider interaction module
//!
//! Accounts, the remote operation contracts, and the two providers that
//! implement them.
//!
//! # Module Structure
//!
//! - [`accounts`] - Account Registry and credential handles
//! - [`api`] - Remote operation traits and wire records
//! - [`http`] - HTTP utilities for gateway calls
//! - [`client`] - Gateway-backed provider ([`client::HttpCloud`])
//! - [`memory`] - In-process provider for demo mode and tests
//!
//! # Example
//!
//! ```ignore
//! use cost_saver::cloud::{client::HttpCloud, api::ComputeApi};
//!
//! async fn example(account: &Account) -> anyhow::Result<()> {
//!     let cloud = HttpCloud::new()?;
//!     let instances = cloud.describe_instances(account).await?;
//!     Ok(())
//! }
//! ```

pub mod accounts;
pub mod api;
pub mod client;
pub mod http;
pub mod memory;

pub use accounts::{Account, AccountRegistry, CredentialHandle, PublicAccount};
