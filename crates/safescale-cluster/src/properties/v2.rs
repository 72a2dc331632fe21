//! Version 2 property schemas and their migration from version 1

use super::v1::{DefaultsV1, NetworkV1};
use crate::resources::{DEFAULT_IMAGE, HostSizing};
use serde::{Deserialize, Serialize};

/// Default sizing of gateways, masters and nodes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DefaultsV2 {
    /// Image of every host
    pub image: String,
    /// Sizing of gateways
    pub gateway_sizing: HostSizing,
    /// Sizing of masters
    pub master_sizing: HostSizing,
    /// Sizing of nodes
    pub node_sizing: HostSizing,
}

impl Default for DefaultsV2 {
    fn default() -> Self {
        DefaultsV1::default().into()
    }
}

impl From<DefaultsV1> for DefaultsV2 {
    fn from(v1: DefaultsV1) -> Self {
        Self {
            image: if v1.image.is_empty() {
                DEFAULT_IMAGE.to_string()
            } else {
                v1.image
            },
            gateway_sizing: HostSizing::gateway_default(),
            master_sizing: v1.master_sizing,
            node_sizing: v1.node_sizing,
        }
    }
}

/// Network configuration with optional gateway failover
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkV2 {
    /// Provider identifier of the network
    pub network_id: String,
    /// Address range
    pub cidr: String,
    /// DNS domain
    pub domain: String,
    /// Provider identifier of the primary gateway
    pub gateway_id: String,
    /// Primary gateway address in the network
    pub gateway_ip: String,
    /// Provider identifier of the secondary gateway
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secondary_gateway_id: Option<String>,
    /// Secondary gateway address in the network
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secondary_gateway_ip: Option<String>,
    /// Route used by the hosts
    pub default_route_ip: String,
    /// Primary gateway public address
    pub primary_public_ip: String,
    /// Secondary gateway public address
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secondary_public_ip: Option<String>,
    /// Public address clients connect to
    pub endpoint_ip: String,
}

impl NetworkV2 {
    /// Whether a secondary gateway is configured
    pub fn has_failover(&self) -> bool {
        self.secondary_gateway_id.is_some()
    }

    /// Gateway identifiers, primary first
    pub fn gateway_ids(&self) -> Vec<String> {
        let mut ids = vec![self.gateway_id.clone()];
        ids.extend(self.secondary_gateway_id.clone());
        ids.retain(|id| !id.is_empty());
        ids
    }
}

impl From<NetworkV1> for NetworkV2 {
    fn from(v1: NetworkV1) -> Self {
        Self {
            network_id: v1.network_id,
            cidr: v1.cidr,
            domain: String::new(),
            gateway_id: v1.gateway_id,
            default_route_ip: v1.gateway_ip.clone(),
            gateway_ip: v1.gateway_ip,
            secondary_gateway_id: None,
            secondary_gateway_ip: None,
            primary_public_ip: v1.public_ip.clone(),
            secondary_public_ip: None,
            endpoint_ip: v1.public_ip,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_network_migration() {
        let v1 = NetworkV1 {
            network_id: "net-1".to_string(),
            cidr: "192.168.0.0/16".to_string(),
            gateway_id: "gw-1".to_string(),
            gateway_ip: "192.168.0.1".to_string(),
            public_ip: "1.2.3.4".to_string(),
        };
        let v2 = NetworkV2::from(v1);
        assert_eq!(v2.default_route_ip, "192.168.0.1");
        assert_eq!(v2.endpoint_ip, "1.2.3.4");
        assert_eq!(v2.primary_public_ip, "1.2.3.4");
        assert!(!v2.has_failover());
        assert_eq!(v2.gateway_ids(), vec!["gw-1".to_string()]);
    }

    #[test]
    fn test_defaults_migration_keeps_image() {
        let v1 = DefaultsV1 {
            image: "CentOS 7".to_string(),
            ..DefaultsV1::default()
        };
        let v2 = DefaultsV2::from(v1.clone());
        assert_eq!(v2.image, "CentOS 7");
        assert_eq!(v2.master_sizing, v1.master_sizing);
        assert_eq!(v2.gateway_sizing, HostSizing::gateway_default());
    }
}
