//! Serializable report of a cluster

use super::Cluster;
use crate::enums::{ClusterState, Complexity, Flavor};
use crate::flavors::REMOTE_DESKTOP_FEATURE;
use crate::identity::ADMIN_LOGIN;
use crate::properties::{CompositeV1, DefaultsV1, FeaturesV1, Node, NodesV1, PropertyKey, StateV1};
use crate::resources::HostSizing;
use safescale_utils::concurrency::Task;
use safescale_utils::scerr::Result;
use serde::Serialize;
use std::collections::BTreeMap;

/// Everything known about a cluster
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClusterInspection {
    /// Cluster name
    pub name: String,
    /// Topology family
    pub flavor: Flavor,
    /// Size class
    pub complexity: Complexity,
    /// Login of the administrator account
    pub admin_login: String,
    /// Password of the administrator account
    pub admin_password: String,
    /// Key pair granting SSH access
    pub keypair: String,
    /// Tenant holding the cluster
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tenant: Option<String>,
    /// Provider identifier of the network
    pub network_id: String,
    /// Address range
    pub cidr: String,
    /// Route used by the hosts
    pub default_route_ip: String,
    /// Same as `default_route_ip`, for older clients
    pub gateway_ip: String,
    /// Primary gateway address in the network
    pub primary_gateway_ip: String,
    /// Public address clients connect to
    pub endpoint_ip: String,
    /// Primary gateway public address
    pub primary_public_ip: String,
    /// Secondary gateway address, with failover
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secondary_gateway_ip: Option<String>,
    /// Secondary gateway public address, with failover
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secondary_public_ip: Option<String>,
    /// Same as `endpoint_ip` with failover, for older clients
    #[serde(skip_serializing_if = "Option::is_none")]
    pub public_ip: Option<String>,
    /// Default sizing
    pub defaults: SizingDefaults,
    /// Masters, in creation order
    pub masters: Vec<Node>,
    /// Private nodes, in creation order
    pub nodes: Vec<Node>,
    /// Features
    pub features: FeaturesV1,
    /// Last recorded state
    pub last_state: ClusterState,
    /// Remote desktop access
    pub remote_desktop: RemoteDesktop,
}

/// Default sizing, in the newest schema recorded
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SizingDefaults {
    /// Image of every host
    pub image: String,
    /// Sizing of gateways, unknown to clusters created before it was recorded
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gateway: Option<HostSizing>,
    /// Sizing of masters
    pub master: HostSizing,
    /// Sizing of nodes
    pub node: HostSizing,
}

/// Remote desktop URLs per master, or why there are none
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum RemoteDesktop {
    /// URLs by master name
    Urls(BTreeMap<String, Vec<String>>),
    /// The feature is disabled
    NotInstalled(String),
}

impl Cluster {
    /// Report identity, network, sizing, hosts, features and last state
    pub async fn inspect(&self, task: &Task) -> Result<ClusterInspection> {
        let (task, _job) = self.start_job(task, "inspect");
        let _tracer = self.tracer(&task, "inspect", String::new());

        let tenant = self
            .properties
            .lock_for_read::<CompositeV1>()
            .then_use(|composite| Ok(composite.tenants.first().cloned()))?;
        let network = self.properties.network()?;
        let defaults = if self.properties.lookup(PropertyKey::DefaultsV2) {
            let v2 = self.properties.defaults()?;
            SizingDefaults {
                image: v2.image,
                gateway: Some(v2.gateway_sizing),
                master: v2.master_sizing,
                node: v2.node_sizing,
            }
        } else {
            let v1 = self.properties.get::<DefaultsV1>()?;
            SizingDefaults {
                image: v1.image,
                gateway: None,
                master: v1.master_sizing,
                node: v1.node_sizing,
            }
        };
        let nodes = self.properties.get::<NodesV1>()?;
        let features = self.properties.get::<FeaturesV1>()?;
        let last_state = self
            .properties
            .lock_for_read::<StateV1>()
            .then_use(|state| Ok(state.state))?;

        let remote_desktop = if features.disabled.contains(REMOTE_DESKTOP_FEATURE) {
            RemoteDesktop::NotInstalled(format!(
                "Remote Desktop not installed. To install it, execute 'safescale platform add-feature {} {}'.",
                self.name(),
                REMOTE_DESKTOP_FEATURE
            ))
        } else {
            let urls = nodes
                .masters
                .iter()
                .map(|master| {
                    let mut urls = vec![remote_desktop_url(&network.endpoint_ip, &master.name)];
                    if let Some(ip) = &network.secondary_public_ip {
                        urls.push(remote_desktop_url(ip, &master.name));
                    }
                    (master.name.clone(), urls)
                })
                .collect();
            RemoteDesktop::Urls(urls)
        };

        let failover = network.secondary_gateway_ip.is_some();
        Ok(ClusterInspection {
            name: self.name().to_string(),
            flavor: self.identity.flavor(),
            complexity: self.identity.complexity(),
            admin_login: ADMIN_LOGIN.to_string(),
            admin_password: self.identity.admin_password().to_string(),
            keypair: self.identity.keypair().to_string(),
            tenant,
            network_id: network.network_id.clone(),
            cidr: network.cidr.clone(),
            gateway_ip: network.default_route_ip.clone(),
            default_route_ip: network.default_route_ip.clone(),
            primary_gateway_ip: network.gateway_ip.clone(),
            primary_public_ip: network.endpoint_ip.clone(),
            public_ip: failover.then(|| network.endpoint_ip.clone()),
            endpoint_ip: network.endpoint_ip,
            secondary_gateway_ip: network.secondary_gateway_ip,
            secondary_public_ip: network.secondary_public_ip,
            defaults,
            masters: nodes.masters,
            nodes: nodes.private_nodes,
            features,
            last_state,
            remote_desktop,
        })
    }
}

fn remote_desktop_url(endpoint: &str, host: &str) -> String {
    format!("https://{}/_platform/remotedesktop/{}/", endpoint, host)
}
