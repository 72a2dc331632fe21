//! Cluster enumerations: flavor, complexity, state

use safescale_utils::scerr::Error;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Topology family of a cluster
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Flavor {
    /// Bunch of hosts, no orchestrator
    Boh,
    /// DC/OS
    Dcos,
    /// Kubernetes
    K8s,
    /// Docker Swarm
    Swarm,
    /// OpenHPC
    Ohpc,
}

impl fmt::Display for Flavor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Flavor::Boh => "BOH",
            Flavor::Dcos => "DCOS",
            Flavor::K8s => "K8S",
            Flavor::Swarm => "SWARM",
            Flavor::Ohpc => "OHPC",
        };
        f.write_str(label)
    }
}

impl FromStr for Flavor {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "boh" => Ok(Flavor::Boh),
            "dcos" => Ok(Flavor::Dcos),
            "k8s" => Ok(Flavor::K8s),
            "swarm" => Ok(Flavor::Swarm),
            "ohpc" => Ok(Flavor::Ohpc),
            _ => Err(Error::invalid_parameter(
                "flavor",
                format!("failed to find a Flavor matching with '{}'", s),
            )),
        }
    }
}

/// Size class of a cluster
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Complexity {
    /// One gateway, minimal masters and nodes
    Small,
    /// Gateway failover, redundant masters
    Normal,
    /// Gateway failover, more masters and nodes
    Large,
}

impl Complexity {
    /// Whether clusters of this complexity get a secondary gateway
    pub fn has_failover(&self) -> bool {
        !matches!(self, Complexity::Small)
    }
}

impl fmt::Display for Complexity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Complexity::Small => "Small",
            Complexity::Normal => "Normal",
            Complexity::Large => "Large",
        };
        f.write_str(label)
    }
}

impl FromStr for Complexity {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "small" => Ok(Complexity::Small),
            "normal" => Ok(Complexity::Normal),
            "large" => Ok(Complexity::Large),
            _ => Err(Error::invalid_parameter(
                "complexity",
                format!("failed to find a Complexity matching with '{}'", s),
            )),
        }
    }
}

/// Lifecycle state of a cluster
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClusterState {
    /// Never observed
    #[default]
    Unknown,
    /// Being created
    Creating,
    /// Created and running
    Created,
    /// Creation failed, resources kept for diagnosis
    CreationFailed,
    /// Hosts being started
    Starting,
    /// Hosts being stopped
    Stopping,
    /// All hosts stopped
    Stopped,
    /// Nodes being added
    Expanding,
    /// Nodes being removed
    Shrinking,
    /// A feature is being installed
    InstallingFeature,
    /// A feature is being removed
    RemovingFeature,
    /// Some hosts are not in the expected state
    Degraded,
    /// Being deleted
    Deleting,
    /// Deleted
    Deleted,
}

impl ClusterState {
    /// States an operation is in progress in
    pub fn is_transient(&self) -> bool {
        use ClusterState::*;
        matches!(
            self,
            Creating
                | Starting
                | Stopping
                | Expanding
                | Shrinking
                | InstallingFeature
                | RemovingFeature
                | Deleting
        )
    }

    /// Whether the state machine allows going from `from` to `to`
    pub fn is_valid_transition(from: ClusterState, to: ClusterState) -> bool {
        use ClusterState::*;

        match (from, to) {
            // Creation
            (Unknown, Creating) => true,
            (Creating, Created) | (Creating, CreationFailed) => true,

            // Power operations
            (Stopped, Starting) | (Degraded, Starting) => true,
            (Starting, Created) | (Starting, Degraded) => true,
            (Created, Stopping) | (Degraded, Stopping) => true,
            (Stopping, Stopped) | (Stopping, Degraded) => true,

            // Operations on a running cluster go back to a stable state
            (Created | Degraded, Expanding | Shrinking | InstallingFeature | RemovingFeature) => {
                true
            }
            (Expanding | Shrinking | InstallingFeature | RemovingFeature, Created | Degraded) => {
                true
            }

            // Deletion
            (Created | Stopped | Degraded | CreationFailed, Deleting) => true,
            (Deleting, Deleted) | (Deleting, Degraded) => true,

            // Probing may correct a stable state
            (Created | Stopped | Degraded, Created | Stopped | Degraded) => true,

            _ => false,
        }
    }
}

impl fmt::Display for ClusterState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ClusterState::Unknown => "Unknown",
            ClusterState::Creating => "Creating",
            ClusterState::Created => "Created",
            ClusterState::CreationFailed => "CreationFailed",
            ClusterState::Starting => "Starting",
            ClusterState::Stopping => "Stopping",
            ClusterState::Stopped => "Stopped",
            ClusterState::Expanding => "Expanding",
            ClusterState::Shrinking => "Shrinking",
            ClusterState::InstallingFeature => "InstallingFeature",
            ClusterState::RemovingFeature => "RemovingFeature",
            ClusterState::Degraded => "Degraded",
            ClusterState::Deleting => "Deleting",
            ClusterState::Deleted => "Deleted",
        };
        f.write_str(label)
    }
}

/// Power state of a host as reported by the provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HostState {
    /// Running
    Started,
    /// Powered off
    Stopped,
    /// Transitioning
    Pending,
    /// In error at the provider
    Error,
    /// Not known
    Unknown,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_transitions() {
        use ClusterState::*;

        assert!(ClusterState::is_valid_transition(Unknown, Creating));
        assert!(ClusterState::is_valid_transition(Creating, Created));
        assert!(ClusterState::is_valid_transition(Creating, CreationFailed));
        assert!(ClusterState::is_valid_transition(Created, Expanding));
        assert!(ClusterState::is_valid_transition(Expanding, Created));
        assert!(ClusterState::is_valid_transition(Stopped, Starting));
        assert!(ClusterState::is_valid_transition(CreationFailed, Deleting));
        assert!(ClusterState::is_valid_transition(Deleting, Deleted));

        assert!(!ClusterState::is_valid_transition(Created, Creating));
        assert!(!ClusterState::is_valid_transition(Stopped, Expanding));
        assert!(!ClusterState::is_valid_transition(Expanding, Shrinking));
        assert!(!ClusterState::is_valid_transition(Deleted, Created));
        assert!(!ClusterState::is_valid_transition(CreationFailed, Created));
    }

    #[test]
    fn test_transient_states() {
        assert!(ClusterState::Creating.is_transient());
        assert!(ClusterState::Shrinking.is_transient());
        assert!(!ClusterState::Created.is_transient());
        assert!(!ClusterState::Degraded.is_transient());
    }

    #[test]
    fn test_parse_flavor_and_complexity() {
        assert_eq!("k8s".parse::<Flavor>().unwrap(), Flavor::K8s);
        assert_eq!("BOH".parse::<Flavor>().unwrap(), Flavor::Boh);
        assert!("mesos".parse::<Flavor>().is_err());
        assert_eq!("Normal".parse::<Complexity>().unwrap(), Complexity::Normal);
        assert!(Complexity::Large.has_failover());
        assert!(!Complexity::Small.has_failover());
    }

    #[test]
    fn test_serde_labels() {
        assert_eq!(serde_json::to_string(&Flavor::K8s).unwrap(), "\"K8S\"");
        assert_eq!(
            serde_json::to_string(&ClusterState::CreationFailed).unwrap(),
            "\"creation_failed\""
        );
    }
}
