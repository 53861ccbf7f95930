//! Resource layer
//!
//! Normalizes the three resource kinds into one model and drives their power
//! state across every account.
//!
//! - [`model`] - snapshot types and power state mapping
//! - [`adapter`] - one [`adapter::ResourceClient`] per kind
//! - [`aggregator`] - per-account fan-out with failure isolation
//! - [`reconciler`] - container service stop/start with preserved capacity
//! - [`fleet`] - the registry plus adapters, addressed by kind

pub mod adapter;
pub mod aggregator;
pub mod fleet;
pub mod model;
pub mod reconciler;
