//! OpenHPC

use super::{COMMON_FEATURES, FlavorPolicy, Step};
use crate::enums::{Complexity, Flavor};
use crate::properties::Node;

/// OpenHPC policy, always a single master
#[derive(Debug, Clone, Copy, Default)]
pub struct OhpcPolicy;

impl FlavorPolicy for OhpcPolicy {
    fn flavor(&self) -> Flavor {
        Flavor::Ohpc
    }

    fn minimum_required_servers(&self, complexity: Complexity) -> (u32, u32) {
        match complexity {
            Complexity::Small => (1, 1),
            Complexity::Normal => (1, 3),
            Complexity::Large => (1, 7),
        }
    }

    fn default_image(&self) -> &'static str {
        "CentOS 7.3"
    }

    fn default_features(&self) -> Vec<&'static str> {
        let mut features = COMMON_FEATURES.to_vec();
        features.push("ohpc-slurm");
        features
    }

    fn node_join_steps(&self, node: &Node) -> Vec<Step> {
        vec![Step::on_master(
            "resume node",
            format!("scontrol update nodename={} state=resume", node.name),
        )]
    }

    fn node_leave_steps(&self, node: &Node) -> Vec<Step> {
        vec![Step::on_master(
            "drain node",
            format!(
                "scontrol update nodename={} state=drain reason=\"removed\"",
                node.name
            ),
        )]
    }
}
