//! Cluster creation and its rollback

use super::{Cluster, TRACE_CATEGORY, tolerate_not_found};
use crate::enums::{ClusterState, Complexity, Flavor};
use crate::feature::{FeatureSettings, Variables};
use crate::identity::Identity;
use crate::properties::{
    CompositeV1, DefaultsV2, FeaturesV1, NetworkV2, Node, NodesV1, Properties, StateV1,
};
use crate::resources::{Host, HostDefinition, HostRequest, Network, NetworkRequest};
use crate::session::Session;
use chrono::Utc;
use ipnet::IpNet;
use safescale_utils::concurrency::{Task, Tracer, register_or_warn};
use safescale_utils::logging::is_optional_log_active;
use safescale_utils::scerr::{Error, Result};
use std::collections::BTreeSet;
use tracing::{debug, info, warn};

/// Parameters of a cluster creation
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    /// Cluster name
    pub name: String,
    /// Size class
    pub complexity: Complexity,
    /// Topology family
    pub flavor: Flavor,
    /// Address range of the cluster network
    pub cidr: String,
    /// DNS domain of the hosts
    pub domain: String,
    /// Keep resources and metadata when creation fails
    pub keep_on_failure: bool,
    /// Gateway sizing and image
    pub gateways_def: Option<HostDefinition>,
    /// Master sizing and image
    pub masters_def: Option<HostDefinition>,
    /// Node sizing and image
    pub nodes_def: Option<HostDefinition>,
    /// Default features not to install
    pub disabled_default_features: BTreeSet<String>,
}

impl Request {
    /// Request with default domain and definitions
    pub fn new(
        name: impl Into<String>,
        complexity: Complexity,
        flavor: Flavor,
        cidr: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            complexity,
            flavor,
            cidr: cidr.into(),
            domain: "cluster.local".to_string(),
            keep_on_failure: false,
            gateways_def: None,
            masters_def: None,
            nodes_def: None,
            disabled_default_features: BTreeSet::new(),
        }
    }

    fn validate(&self) -> Result<IpNet> {
        let valid_name = !self.name.is_empty()
            && !self.name.starts_with('-')
            && self
                .name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-');
        if !valid_name {
            return Err(Error::invalid_parameter(
                "name",
                format!(
                    "'{}' must be made of letters, digits and dashes",
                    self.name
                ),
            ));
        }
        self.cidr
            .parse::<IpNet>()
            .map_err(|e| Error::invalid_parameter("cidr", format!("'{}': {}", self.cidr, e)))
    }
}

/// Resource created so far, undone in reverse order on failure
#[derive(Debug)]
enum Created {
    Network(String),
    Host { id: String, name: String },
}

impl Cluster {
    /// Create a cluster
    ///
    /// Fails with `Duplicate`, before provisioning anything, when a cluster
    /// with the same name is already recorded.
    pub async fn create(session: &Session, task: &Task, request: Request) -> Result<Cluster> {
        let (task, cancel) = task.child();
        let _job = register_or_warn(
            session.jobs(),
            &task,
            cancel,
            &format!("create cluster '{}'", request.name),
        );
        let tracer = Tracer::new(
            Some(&task),
            "create",
            format!("({})", request.name),
            is_optional_log_active(TRACE_CATEGORY),
        );

        let cidr = request.validate()?;
        if session.metadata().get(&request.name).await?.is_some() {
            return Err(Error::duplicate(format!(
                "cluster '{}' already exists",
                request.name
            )));
        }

        let identity = Identity::new(&request.name, request.flavor, request.complexity);
        let cluster = Cluster::assemble(identity, Properties::new(), session.clone());
        cluster.bootstrap_properties(&request)?;
        cluster.persist().await?;
        info!(
            "Creating cluster '{}' ({}, {})",
            request.name, request.flavor, request.complexity
        );

        let mut created = Vec::new();
        let provisioned = match cluster.provision(&task, &request, cidr, &mut created).await {
            Ok(()) => cluster.end(ClusterState::Created).await,
            Err(e) => Err(e),
        };
        tracer.trace_error(&provisioned);
        match provisioned {
            Ok(()) => {
                info!("Cluster '{}' created", request.name);
                Ok(cluster)
            }
            Err(e) => {
                let err = e.wrap(format!("failed to create cluster '{}'", request.name));
                Err(cluster.unwind(&request, created, err).await)
            }
        }
    }

    fn bootstrap_properties(&self, request: &Request) -> Result<()> {
        let policy = &self.policy;
        let gateway_sizing = request
            .gateways_def
            .as_ref()
            .and_then(|def| def.sizing)
            .unwrap_or_else(|| policy.default_gateway_sizing());
        let image = [&request.masters_def, &request.nodes_def, &request.gateways_def]
            .into_iter()
            .flatten()
            .find_map(|def| def.image.clone())
            .unwrap_or_else(|| policy.default_image().to_string());
        let (master_sizing, _) = HostDefinition::resolve(
            request.masters_def.as_ref(),
            policy.default_master_sizing(),
            &image,
        );
        let (node_sizing, _) = HostDefinition::resolve(
            request.nodes_def.as_ref(),
            policy.default_node_sizing(),
            &image,
        );

        self.properties.set(CompositeV1 {
            tenants: vec![self.session.tenant().to_string()],
        })?;
        self.properties.set(DefaultsV2 {
            image,
            gateway_sizing,
            master_sizing,
            node_sizing,
        })?;
        self.properties.set(NodesV1::default())?;
        self.properties.set(FeaturesV1 {
            installed: Default::default(),
            disabled: request
                .disabled_default_features
                .iter()
                .map(|f| f.to_lowercase())
                .collect(),
        })?;
        self.properties.set(StateV1 {
            state: ClusterState::Creating,
            collect_interval: self.session.timeouts().state_collect_interval,
            last_collected: Some(Utc::now()),
        })
    }

    async fn provision(
        &self,
        task: &Task,
        request: &Request,
        cidr: IpNet,
        created: &mut Vec<Created>,
    ) -> Result<()> {
        let defaults = self.properties.defaults()?;
        let timeouts = *self.session.timeouts();

        // Network and gateway(s)
        let (_, gateway_image) =
            HostDefinition::resolve(request.gateways_def.as_ref(), defaults.gateway_sizing, &defaults.image);
        let network_request = NetworkRequest {
            name: format!("net-{}", request.name),
            cidr,
            domain: request.domain.clone(),
            gateway_sizing: defaults.gateway_sizing,
            gateway_image,
            failover: request.complexity.has_failover(),
            keypair: self.identity.keypair().to_string(),
        };
        let network = self
            .provider_call(task, timeouts.host_creation, || {
                self.session.stack().create_network(&network_request)
            })
            .await
            .map_err(|e| e.wrap("failed to create network"))?;
        created.push(Created::Network(network.id.clone()));
        self.properties.set(network_config(&network))?;
        self.persist().await?;
        debug!("Network '{}' of cluster '{}' created", network.name, request.name);

        for gateway in std::iter::once(&network.gateway).chain(network.secondary_gateway.as_ref()) {
            let config = self.session.stack().ssh_config(&gateway.id).await?;
            safescale_ssh::wait_ready(
                self.session.ssh().as_ref(),
                Some(task),
                &config,
                &timeouts,
                timeouts.ssh_connect,
            )
            .await
            .map_err(|e| e.wrap(format!("gateway '{}' is not reachable", gateway.name)))?;
        }

        // Masters
        let (masters, _) = self.policy.minimum_required_servers(request.complexity);
        let (master_sizing, master_image) =
            HostDefinition::resolve(request.masters_def.as_ref(), defaults.master_sizing, &defaults.image);
        for _ in 0..masters {
            task.check_cancelled()?;
            let index = self
                .properties
                .lock_for_write::<NodesV1>()
                .then_use(|nodes| {
                    nodes.master_last_index += 1;
                    Ok(nodes.master_last_index)
                })?;
            let host_request = HostRequest {
                name: format!("{}-master-{}", request.name, index),
                sizing: master_sizing,
                image: master_image.clone(),
                network_id: network.id.clone(),
                public_ip: false,
                keypair: self.identity.keypair().to_string(),
            };
            let host = self
                .provider_call(task, timeouts.host_creation, || {
                    self.session.stack().create_host(&host_request)
                })
                .await
                .map_err(|e| e.wrap(format!("failed to create master #{}", index)))?;
            created.push(Created::Host {
                id: host.id.clone(),
                name: host.name.clone(),
            });
            self.properties
                .lock_for_write::<NodesV1>()
                .then_use(|nodes| {
                    nodes.masters.push(node_of(&host));
                    Ok(())
                })?;
            self.persist().await?;
        }

        // Nodes
        let (_, nodes) = self.policy.minimum_required_servers(request.complexity);
        for _ in 0..nodes {
            task.check_cancelled()?;
            let host = self.create_node_host(task, request.nodes_def.as_ref()).await?;
            created.push(Created::Host {
                id: host.id.clone(),
                name: host.name.clone(),
            });
            self.properties
                .lock_for_write::<NodesV1>()
                .then_use(|nodes| {
                    nodes.private_nodes.push(node_of(&host));
                    Ok(())
                })?;
            self.persist().await?;
        }

        // Default features
        let disabled = self
            .properties
            .lock_for_read::<FeaturesV1>()
            .then_use(|features| Ok(features.disabled.clone()))?;
        let variables = Variables::new();
        let settings = FeatureSettings::default();
        for feature in self.policy.default_features() {
            if disabled.contains(feature) {
                debug!("Default feature '{}' disabled, skipped", feature);
                continue;
            }
            task.check_cancelled()?;
            self.install_feature(task, feature, &variables, &settings)
                .await
                .map_err(|e| e.wrap(format!("failed to install default feature '{}'", feature)))?;
        }

        Ok(())
    }

    async fn unwind(&self, request: &Request, created: Vec<Created>, mut err: Error) -> Error {
        if request.keep_on_failure {
            warn!(
                "Creation of cluster '{}' failed, keeping its resources for inspection",
                request.name
            );
            return self.end_with_error(ClusterState::CreationFailed, err).await;
        }

        warn!("Creation of cluster '{}' failed, cleaning up", request.name);
        let stack = self.session.stack();
        for resource in created.into_iter().rev() {
            let (what, outcome) = match &resource {
                Created::Host { id, name } => {
                    (format!("host '{}'", name), stack.delete_host(id).await)
                }
                Created::Network(id) => {
                    (format!("network '{}'", id), stack.delete_network(id).await)
                }
            };
            if let Err(e) = tolerate_not_found(outcome) {
                warn!("Failed to delete {}: {}", what, e);
                err.add_consequence(e.wrap(format!("cleanup failed to delete {}", what)));
            }
        }
        if let Err(e) = self.session.metadata().remove(&request.name).await {
            err.add_consequence(e.wrap("cleanup failed to remove metadata"));
        }
        err
    }

    /// Create the host of the next node, without attaching it
    pub(super) async fn create_node_host(&self, task: &Task, def: Option<&HostDefinition>) -> Result<Host> {
        let defaults = self.properties.defaults()?;
        let network = self.properties.network()?;
        let (sizing, image) = HostDefinition::resolve(def, defaults.node_sizing, &defaults.image);
        let index = self
            .properties
            .lock_for_write::<NodesV1>()
            .then_use(|nodes| {
                nodes.private_last_index += 1;
                Ok(nodes.private_last_index)
            })?;
        let host_request = HostRequest {
            name: format!("{}-node-{}", self.name(), index),
            sizing,
            image,
            network_id: network.network_id,
            public_ip: false,
            keypair: self.identity.keypair().to_string(),
        };
        self.provider_call(task, self.session.timeouts().host_creation, || {
            self.session.stack().create_host(&host_request)
        })
        .await
        .map_err(|e| e.wrap(format!("failed to create node #{}", index)))
    }
}

pub(super) fn node_of(host: &Host) -> Node {
    Node {
        id: host.id.clone(),
        name: host.name.clone(),
        private_ip: host.private_ip.clone(),
        public_ip: host.public_ip.clone(),
    }
}

fn network_config(network: &Network) -> NetworkV2 {
    let secondary = network.secondary_gateway.as_ref();
    NetworkV2 {
        network_id: network.id.clone(),
        cidr: network.cidr.clone(),
        domain: network.domain.clone(),
        gateway_id: network.gateway.id.clone(),
        gateway_ip: network.gateway.private_ip.clone(),
        secondary_gateway_id: secondary.map(|h| h.id.clone()),
        secondary_gateway_ip: secondary.map(|h| h.private_ip.clone()),
        default_route_ip: network.default_route_ip.clone(),
        primary_public_ip: network.gateway.public_ip.clone().unwrap_or_default(),
        secondary_public_ip: secondary.and_then(|h| h.public_ip.clone()),
        endpoint_ip: network.endpoint_ip.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use safescale_utils::scerr::ErrorKind;

    #[test]
    fn test_request_validation() {
        let ok = Request::new("demo-1", Complexity::Small, Flavor::K8s, "192.168.0.0/16");
        assert!(ok.validate().is_ok());

        let bad_name = Request::new("demo_1", Complexity::Small, Flavor::K8s, "192.168.0.0/16");
        assert_eq!(bad_name.validate().unwrap_err().kind(), ErrorKind::InvalidParameter);

        let bad_cidr = Request::new("demo", Complexity::Small, Flavor::K8s, "192.168.0.0/33");
        assert_eq!(bad_cidr.validate().unwrap_err().kind(), ErrorKind::InvalidParameter);
    }
}
