//! Kubernetes

use super::{COMMON_FEATURES, FlavorPolicy, Step};
use crate::enums::{Complexity, Flavor};
use crate::properties::Node;

/// Kubernetes policy
#[derive(Debug, Clone, Copy, Default)]
pub struct K8sPolicy;

impl FlavorPolicy for K8sPolicy {
    fn flavor(&self) -> Flavor {
        Flavor::K8s
    }

    fn minimum_required_servers(&self, complexity: Complexity) -> (u32, u32) {
        match complexity {
            Complexity::Small => (1, 1),
            Complexity::Normal => (3, 3),
            Complexity::Large => (5, 6),
        }
    }

    fn default_features(&self) -> Vec<&'static str> {
        let mut features = COMMON_FEATURES.to_vec();
        features.extend(["kubernetes", "helm"]);
        features
    }

    fn node_join_steps(&self, node: &Node) -> Vec<Step> {
        vec![Step::on_master(
            "label node",
            format!(
                "kubectl label node {} node-role.kubernetes.io/worker= --overwrite",
                node.name
            ),
        )]
    }

    fn node_leave_steps(&self, node: &Node) -> Vec<Step> {
        vec![
            Step::on_master(
                "drain node",
                format!(
                    "kubectl drain {} --ignore-daemonsets --delete-local-data --force",
                    node.name
                ),
            ),
            Step::on_master("delete node", format!("kubectl delete node {}", node.name)),
        ]
    }
}
