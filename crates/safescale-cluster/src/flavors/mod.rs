//! Topology policies of the cluster flavors
//!
//! A flavor decides how many masters and nodes a complexity needs, how hosts
//! are sized by default, which features a new cluster receives and which
//! commands attach a node to (or detach it from) the orchestrator.

pub mod boh;
mod dcos;
mod k8s;
mod ohpc;
mod swarm;

pub use boh::BohPolicy;
pub use dcos::DcosPolicy;
pub use k8s::K8sPolicy;
pub use ohpc::OhpcPolicy;
pub use swarm::SwarmPolicy;

use crate::enums::{Complexity, Flavor};
use crate::properties::Node;
use crate::resources::{DEFAULT_IMAGE, HostSizing};
use std::sync::Arc;

/// Feature giving browser access to the masters
pub const REMOTE_DESKTOP_FEATURE: &str = "remotedesktop";

/// Features every flavor installs
pub const COMMON_FEATURES: [&str; 2] = ["docker", REMOTE_DESKTOP_FEATURE];

/// Host a step runs on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepHost {
    /// An available master
    Master,
    /// The node being joined or removed
    Node,
}

/// Command run while a node joins or leaves the cluster
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step {
    /// Where the command runs
    pub on: StepHost,
    /// Shell command
    pub command: String,
    /// Short description used in logs and errors
    pub label: String,
}

impl Step {
    /// Step running on an available master
    pub fn on_master(label: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            on: StepHost::Master,
            command: command.into(),
            label: label.into(),
        }
    }

    /// Step running on the node itself
    pub fn on_node(label: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            on: StepHost::Node,
            command: command.into(),
            label: label.into(),
        }
    }
}

/// Policy of a flavor
pub trait FlavorPolicy: Send + Sync {
    /// Flavor implemented
    fn flavor(&self) -> Flavor;

    /// `(masters, nodes)` to create for `complexity`
    fn minimum_required_servers(&self, complexity: Complexity) -> (u32, u32);

    /// Gateway sizing when the request leaves it unset
    fn default_gateway_sizing(&self) -> HostSizing {
        HostSizing::gateway_default()
    }

    /// Master sizing when the request leaves it unset
    fn default_master_sizing(&self) -> HostSizing {
        HostSizing::new(4, 8, 15.0, 32.0, 100)
    }

    /// Node sizing when the request leaves it unset
    fn default_node_sizing(&self) -> HostSizing {
        HostSizing::new(4, 8, 15.0, 32.0, 100)
    }

    /// Image when the request leaves it unset
    fn default_image(&self) -> &'static str {
        DEFAULT_IMAGE
    }

    /// Features installed on creation, before removing the disabled ones
    fn default_features(&self) -> Vec<&'static str> {
        COMMON_FEATURES.to_vec()
    }

    /// Commands attaching `node` to the orchestrator
    fn node_join_steps(&self, _node: &Node) -> Vec<Step> {
        Vec::new()
    }

    /// Commands detaching `node` from the orchestrator
    fn node_leave_steps(&self, _node: &Node) -> Vec<Step> {
        Vec::new()
    }

    /// Meaning of a failing step return code, when the flavor defines one
    fn describe_retcode(&self, _retcode: i32) -> Option<String> {
        None
    }
}

/// Policy of `flavor`
pub fn policy(flavor: Flavor) -> Arc<dyn FlavorPolicy> {
    match flavor {
        Flavor::Boh => Arc::new(BohPolicy),
        Flavor::Dcos => Arc::new(DcosPolicy),
        Flavor::K8s => Arc::new(K8sPolicy),
        Flavor::Swarm => Arc::new(SwarmPolicy),
        Flavor::Ohpc => Arc::new(OhpcPolicy),
    }
}
