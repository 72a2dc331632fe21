//! DC/OS

use super::{COMMON_FEATURES, FlavorPolicy, Step};
use crate::enums::{Complexity, Flavor};
use crate::properties::Node;
use crate::resources::HostSizing;

/// DC/OS policy
#[derive(Debug, Clone, Copy, Default)]
pub struct DcosPolicy;

impl FlavorPolicy for DcosPolicy {
    fn flavor(&self) -> Flavor {
        Flavor::Dcos
    }

    fn minimum_required_servers(&self, complexity: Complexity) -> (u32, u32) {
        match complexity {
            Complexity::Small => (1, 2),
            Complexity::Normal => (3, 4),
            Complexity::Large => (5, 6),
        }
    }

    fn default_master_sizing(&self) -> HostSizing {
        HostSizing::new(4, 8, 15.0, 32.0, 60)
    }

    fn default_node_sizing(&self) -> HostSizing {
        HostSizing::new(2, 4, 15.0, 32.0, 60)
    }

    fn default_image(&self) -> &'static str {
        "CentOS 7.3"
    }

    fn default_features(&self) -> Vec<&'static str> {
        let mut features = COMMON_FEATURES.to_vec();
        features.push("dcos");
        features
    }

    fn node_join_steps(&self, _node: &Node) -> Vec<Step> {
        vec![Step::on_node(
            "install agent",
            "sudo bash /opt/safescale/dcos_install.sh slave",
        )]
    }

    fn node_leave_steps(&self, node: &Node) -> Vec<Step> {
        vec![Step::on_master(
            "decommission agent",
            format!("dcos node decommission {}", node.private_ip),
        )]
    }
}
