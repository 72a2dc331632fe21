//! Immutable identity of a cluster

use crate::enums::{Complexity, Flavor};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Login of the administrator account created on every cluster host
pub const ADMIN_LOGIN: &str = "cladm";

/// Identity of a cluster, fixed at creation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    name: String,
    flavor: Flavor,
    complexity: Complexity,
    admin_password: String,
    keypair: String,
}

impl Identity {
    /// New identity with a generated administrator password
    pub fn new(name: impl Into<String>, flavor: Flavor, complexity: Complexity) -> Self {
        let name = name.into();
        let keypair = format!("cluster_{}_{}_key", name, ADMIN_LOGIN);
        Self {
            name,
            flavor,
            complexity,
            admin_password: Uuid::new_v4().simple().to_string(),
            keypair,
        }
    }

    /// Cluster name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Flavor
    pub fn flavor(&self) -> Flavor {
        self.flavor
    }

    /// Complexity
    pub fn complexity(&self) -> Complexity {
        self.complexity
    }

    /// Password of the administrator account
    pub fn admin_password(&self) -> &str {
        &self.admin_password
    }

    /// Name of the key pair granting SSH access to the hosts
    pub fn keypair(&self) -> &str {
        &self.keypair
    }
}
