//! Cluster orchestration for SafeScale
//!
//! This crate drives the lifecycle of clusters of hosts on a provider stack:
//!
//! - [`properties`]: versioned property store with per-key locking
//! - [`metadata`]: persistence of cluster records (memory or sled)
//! - [`flavors`]: topology policies (BOH, DCOS, K8S, Swarm, OHPC)
//! - [`control`]: the cluster controller and its state machine
//! - [`manager`]: tenant-wide entry point, parallel deletion
//!
//! Collaborators are reached through traits: [`provider::Stack`] for the
//! cloud, [`safescale_ssh::SshExecutor`] for remote commands and
//! [`feature::FeatureEngine`] for feature installation. The `test-utils`
//! feature exposes in-memory versions of all of them in `sim`.

#![warn(missing_docs)]

pub mod control;
pub mod enums;
pub mod feature;
pub mod flavors;
pub mod identity;
pub mod manager;
pub mod metadata;
pub mod properties;
pub mod provider;
pub mod resources;
pub mod session;

#[cfg(any(test, feature = "test-utils"))]
pub mod sim;

pub use control::{Cluster, Request};
pub use enums::{ClusterState, Complexity, Flavor, HostState};
pub use identity::Identity;
pub use manager::Manager;
pub use session::Session;
