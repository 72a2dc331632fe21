//! Version 1 property schemas

use crate::enums::ClusterState;
use crate::resources::{DEFAULT_IMAGE, HostSizing};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

/// Tenants the cluster resources live in
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompositeV1 {
    /// Tenant names, the first one holding the cluster
    pub tenants: Vec<String>,
}

/// Default sizing of masters and nodes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DefaultsV1 {
    /// Image of every host
    pub image: String,
    /// Sizing of masters
    pub master_sizing: HostSizing,
    /// Sizing of nodes
    pub node_sizing: HostSizing,
}

impl Default for DefaultsV1 {
    fn default() -> Self {
        Self {
            image: DEFAULT_IMAGE.to_string(),
            master_sizing: HostSizing::new(4, 8, 15.0, 32.0, 100),
            node_sizing: HostSizing::new(4, 8, 15.0, 32.0, 100),
        }
    }
}

/// A master or node of the cluster
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    /// Provider identifier of the host
    pub id: String,
    /// Host name
    pub name: String,
    /// Address in the cluster network
    pub private_ip: String,
    /// Public address, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_ip: Option<String>,
}

/// Masters and private nodes, in creation order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodesV1 {
    /// Masters
    pub masters: Vec<Node>,
    /// Private nodes
    pub private_nodes: Vec<Node>,
    /// Index used to name the last master created
    pub master_last_index: u32,
    /// Index used to name the last node created
    pub private_last_index: u32,
}

impl NodesV1 {
    /// Find a master or node by host name
    pub fn find(&self, hostname: &str) -> Option<&Node> {
        self.masters
            .iter()
            .chain(self.private_nodes.iter())
            .find(|node| node.name == hostname)
    }
}

/// A feature installed on the cluster
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstalledFeature {
    /// Feature name
    pub name: String,
    /// Features this one required
    #[serde(default)]
    pub requires: BTreeSet<String>,
    /// Features requiring this one
    #[serde(default)]
    pub required_by: BTreeSet<String>,
}

/// Installed and disabled features
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeaturesV1 {
    /// Installed features by name
    pub installed: BTreeMap<String, InstalledFeature>,
    /// Default features not to install, lowercased
    pub disabled: BTreeSet<String>,
}

/// Last known state of the cluster
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateV1 {
    /// State
    pub state: ClusterState,
    /// Age after which the state is probed again
    #[serde(with = "humantime_serde")]
    pub collect_interval: Duration,
    /// When the state was last computed or set
    #[serde(default)]
    pub last_collected: Option<DateTime<Utc>>,
}

impl Default for StateV1 {
    fn default() -> Self {
        Self {
            state: ClusterState::Unknown,
            collect_interval: Duration::from_secs(5 * 60),
            last_collected: None,
        }
    }
}

/// Network configuration, single gateway
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkV1 {
    /// Provider identifier of the network
    pub network_id: String,
    /// Address range
    pub cidr: String,
    /// Provider identifier of the gateway
    pub gateway_id: String,
    /// Gateway address in the network
    pub gateway_ip: String,
    /// Gateway public address
    pub public_ip: String,
}
