//! Provider-side resource descriptions

use ipnet::IpNet;
use serde::{Deserialize, Serialize};

/// Image used when neither the request nor the flavor names one
pub const DEFAULT_IMAGE: &str = "Ubuntu 18.04";

/// Sizing requirements of a host
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HostSizing {
    /// Minimum number of cores
    pub min_cores: u32,
    /// Maximum number of cores, 0 for no limit
    pub max_cores: u32,
    /// Minimum RAM in GB
    pub min_ram_gb: f32,
    /// Maximum RAM in GB, 0 for no limit
    pub max_ram_gb: f32,
    /// Minimum disk size in GB
    pub min_disk_gb: u32,
    /// Minimum number of GPUs
    pub min_gpu: u32,
}

impl HostSizing {
    /// Sizing between `cores` and `max_cores` cores and `ram` to `max_ram` GB of RAM
    pub const fn new(cores: u32, max_cores: u32, ram: f32, max_ram: f32, disk: u32) -> Self {
        Self {
            min_cores: cores,
            max_cores,
            min_ram_gb: ram,
            max_ram_gb: max_ram,
            min_disk_gb: disk,
            min_gpu: 0,
        }
    }

    /// Sizing of gateways when nothing else is known
    pub const fn gateway_default() -> Self {
        Self::new(2, 4, 7.0, 16.0, 50)
    }
}

/// Optional sizing and image for a kind of host
///
/// Anything left unset is filled from the flavor and complexity defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HostDefinition {
    /// Sizing requirements
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sizing: Option<HostSizing>,
    /// Image name or identifier
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

impl HostDefinition {
    /// Definition with the given sizing
    pub fn with_sizing(sizing: HostSizing) -> Self {
        Self {
            sizing: Some(sizing),
            image: None,
        }
    }

    /// Fill unset fields from defaults
    pub fn resolve(def: Option<&HostDefinition>, sizing: HostSizing, image: &str) -> (HostSizing, String) {
        let sizing = def.and_then(|d| d.sizing).unwrap_or(sizing);
        let image = def
            .and_then(|d| d.image.clone())
            .unwrap_or_else(|| image.to_string());
        (sizing, image)
    }
}

/// Request for a host
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HostRequest {
    /// Host name
    pub name: String,
    /// Sizing requirements
    pub sizing: HostSizing,
    /// Image name or identifier
    pub image: String,
    /// Network to attach to
    pub network_id: String,
    /// Whether the host gets a public IP
    pub public_ip: bool,
    /// Key pair granting SSH access
    pub keypair: String,
}

/// Host as created by the provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Host {
    /// Provider identifier
    pub id: String,
    /// Host name
    pub name: String,
    /// Address in the cluster network
    pub private_ip: String,
    /// Public address, if any
    pub public_ip: Option<String>,
}

/// Request for a network and its gateway(s)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkRequest {
    /// Network name
    pub name: String,
    /// Address range
    pub cidr: IpNet,
    /// DNS domain of the hosts
    pub domain: String,
    /// Sizing of the gateway(s)
    pub gateway_sizing: HostSizing,
    /// Image of the gateway(s)
    pub gateway_image: String,
    /// Whether to create a secondary gateway sharing a virtual IP
    pub failover: bool,
    /// Key pair granting SSH access to the gateways
    pub keypair: String,
}

/// Network as created by the provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Network {
    /// Provider identifier
    pub id: String,
    /// Network name
    pub name: String,
    /// Address range
    pub cidr: String,
    /// DNS domain
    pub domain: String,
    /// Primary gateway
    pub gateway: Host,
    /// Secondary gateway, with failover
    pub secondary_gateway: Option<Host>,
    /// Route used by the hosts: the virtual IP with failover, else the gateway address
    pub default_route_ip: String,
    /// Public address clients connect to
    pub endpoint_ip: String,
}
