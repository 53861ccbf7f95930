//! cost-saver
//!
//! View and toggle the power state of VM instances, managed databases and
//! container services across many independently credentialed cloud
//! accounts.

pub mod app;
pub mod cloud;
pub mod config;
pub mod error;
pub mod event;
pub mod notification;
pub mod resource;
pub mod scheduler;
pub mod ui;

pub use error::{Error, Result};

/// Version injected at compile time via COST_SAVER_VERSION env var (set by CI/CD),
/// or "dev" for local builds.
pub const VERSION: &str = match option_env!("COST_SAVER_VERSION") {
    Some(v) => v,
    None => "dev",
};
