//! Docker Swarm

use super::{COMMON_FEATURES, FlavorPolicy, Step};
use crate::enums::{Complexity, Flavor};
use crate::properties::Node;

/// Docker Swarm policy
#[derive(Debug, Clone, Copy, Default)]
pub struct SwarmPolicy;

impl FlavorPolicy for SwarmPolicy {
    fn flavor(&self) -> Flavor {
        Flavor::Swarm
    }

    fn minimum_required_servers(&self, complexity: Complexity) -> (u32, u32) {
        match complexity {
            Complexity::Small => (1, 1),
            Complexity::Normal => (3, 3),
            Complexity::Large => (5, 3),
        }
    }

    fn default_features(&self) -> Vec<&'static str> {
        let mut features = COMMON_FEATURES.to_vec();
        features.push("docker-swarm");
        features
    }

    fn node_leave_steps(&self, node: &Node) -> Vec<Step> {
        vec![
            Step::on_master(
                "drain node",
                format!("docker node update --availability drain {}", node.name),
            ),
            Step::on_master("remove node", format!("docker node rm --force {}", node.name)),
        ]
    }
}
