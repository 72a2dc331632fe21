//! In-memory provider stack with failure injection

use crate::enums::HostState;
use crate::identity::ADMIN_LOGIN;
use crate::provider::Stack;
use crate::resources::{Host, HostRequest, Network, NetworkRequest};
use async_trait::async_trait;
use ipnet::IpNet;
use safescale_ssh::SshConfig;
use safescale_utils::scerr::{Error, Result};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::debug;
use uuid::Uuid;

#[derive(Debug)]
struct SimHost {
    host: Host,
    network_id: String,
    gateway: bool,
    state: HostState,
}

#[derive(Debug)]
struct SimNetwork {
    network: Network,
    cidr: IpNet,
    allocated: usize,
}

#[derive(Debug, Default)]
struct Inner {
    networks: HashMap<String, SimNetwork>,
    hosts: HashMap<String, SimHost>,
    public_ips: u32,
    fail_network: bool,
    fail_create: HashSet<String>,
    fail_delete: HashSet<String>,
    fail_power: HashSet<String>,
    deleted: Vec<String>,
}

impl Inner {
    fn allocate_ip(&mut self, network_id: &str) -> Result<String> {
        let network = self
            .networks
            .get_mut(network_id)
            .ok_or_else(|| Error::not_found(format!("network '{}' not found", network_id)))?;
        network.allocated += 1;
        network
            .cidr
            .hosts()
            .nth(network.allocated)
            .map(|ip| ip.to_string())
            .ok_or_else(|| Error::overflow(format!("network '{}' is full", network.network.name)))
    }

    fn public_ip(&mut self) -> String {
        self.public_ips += 1;
        format!("203.0.113.{}", self.public_ips)
    }

    fn host(&self, id: &str) -> Result<&SimHost> {
        self.hosts
            .get(id)
            .ok_or_else(|| Error::not_found(format!("host '{}' not found", id)))
    }

    fn host_mut(&mut self, id: &str) -> Result<&mut SimHost> {
        self.hosts
            .get_mut(id)
            .ok_or_else(|| Error::not_found(format!("host '{}' not found", id)))
    }

    fn add_gateway(&mut self, network_id: &str, name: String, public: bool) -> Result<Host> {
        let host = Host {
            id: Uuid::new_v4().to_string(),
            name,
            private_ip: self.allocate_ip(network_id)?,
            public_ip: public.then(|| self.public_ip()),
        };
        self.hosts.insert(
            host.id.clone(),
            SimHost {
                host: host.clone(),
                network_id: network_id.to_string(),
                gateway: true,
                state: HostState::Started,
            },
        );
        Ok(host)
    }
}

/// Provider stack keeping everything in memory
///
/// Failures are injected by host name; gateway names are `gw-<network>` and
/// `gw2-<network>`.
#[derive(Debug, Default)]
pub struct SimStack {
    inner: Mutex<Inner>,
}

impl SimStack {
    /// Empty stack
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Make network creation fail
    pub fn fail_network_creation(&self) {
        self.lock().fail_network = true;
    }

    /// Make the creation of host `name` fail
    pub fn fail_host_creation(&self, name: impl Into<String>) {
        self.lock().fail_create.insert(name.into());
    }

    /// Make the deletion of host `name` fail
    pub fn fail_host_deletion(&self, name: impl Into<String>) {
        self.lock().fail_delete.insert(name.into());
    }

    /// Make powering host `name` on or off fail
    pub fn fail_power(&self, name: impl Into<String>) {
        self.lock().fail_power.insert(name.into());
    }

    /// Force the power state of host `name`
    pub fn set_host_state(&self, name: &str, state: HostState) {
        let mut inner = self.lock();
        for host in inner.hosts.values_mut() {
            if host.host.name == name {
                host.state = state;
            }
        }
    }

    /// Names of the existing hosts, gateways included, sorted
    pub fn host_names(&self) -> Vec<String> {
        let mut names: Vec<_> = self
            .lock()
            .hosts
            .values()
            .map(|h| h.host.name.clone())
            .collect();
        names.sort();
        names
    }

    /// Power state of every host by name
    pub fn host_states(&self) -> BTreeMap<String, HostState> {
        self.lock()
            .hosts
            .values()
            .map(|h| (h.host.name.clone(), h.state))
            .collect()
    }

    /// Number of existing networks
    pub fn network_count(&self) -> usize {
        self.lock().networks.len()
    }

    /// Names of the deleted hosts, in deletion order
    pub fn deleted_hosts(&self) -> Vec<String> {
        self.lock().deleted.clone()
    }

    fn power(&self, id: &str, state: HostState) -> Result<()> {
        let mut inner = self.lock();
        let name = inner.host(id)?.host.name.clone();
        if inner.fail_power.contains(&name) {
            return Err(Error::provider(format!("power operation refused on '{}'", name)));
        }
        inner.host_mut(id)?.state = state;
        Ok(())
    }
}

#[async_trait]
impl Stack for SimStack {
    async fn create_network(&self, request: &NetworkRequest) -> Result<Network> {
        let mut inner = self.lock();
        if inner.fail_network {
            return Err(Error::provider(format!(
                "failed to create network '{}'",
                request.name
            )));
        }
        if inner.networks.values().any(|n| n.network.name == request.name) {
            return Err(Error::duplicate(format!(
                "network '{}' already exists",
                request.name
            )));
        }

        let id = Uuid::new_v4().to_string();
        inner.networks.insert(
            id.clone(),
            SimNetwork {
                network: Network {
                    id: id.clone(),
                    name: request.name.clone(),
                    cidr: request.cidr.to_string(),
                    domain: request.domain.clone(),
                    gateway: Host {
                        id: String::new(),
                        name: String::new(),
                        private_ip: String::new(),
                        public_ip: None,
                    },
                    secondary_gateway: None,
                    default_route_ip: String::new(),
                    endpoint_ip: String::new(),
                },
                cidr: request.cidr,
                allocated: 0,
            },
        );

        let gateway = inner.add_gateway(&id, format!("gw-{}", request.name), true)?;
        let secondary = if request.failover {
            Some(inner.add_gateway(&id, format!("gw2-{}", request.name), true)?)
        } else {
            None
        };
        let default_route_ip = if request.failover {
            inner.allocate_ip(&id)?
        } else {
            gateway.private_ip.clone()
        };

        let entry = inner
            .networks
            .get_mut(&id)
            .ok_or_else(|| Error::inconsistent("network vanished during creation"))?;
        entry.network.endpoint_ip = gateway.public_ip.clone().unwrap_or_default();
        entry.network.gateway = gateway;
        entry.network.secondary_gateway = secondary;
        entry.network.default_route_ip = default_route_ip;
        debug!("Network '{}' created", request.name);
        Ok(entry.network.clone())
    }

    async fn delete_network(&self, id: &str) -> Result<()> {
        let mut inner = self.lock();
        if inner.networks.remove(id).is_none() {
            return Err(Error::not_found(format!("network '{}' not found", id)));
        }
        let gateways: Vec<_> = inner
            .hosts
            .values()
            .filter(|h| h.gateway && h.network_id == id)
            .map(|h| (h.host.id.clone(), h.host.name.clone()))
            .collect();
        for (host_id, name) in gateways {
            inner.hosts.remove(&host_id);
            inner.deleted.push(name);
        }
        Ok(())
    }

    async fn create_host(&self, request: &HostRequest) -> Result<Host> {
        let mut inner = self.lock();
        if inner.fail_create.contains(&request.name) {
            return Err(Error::provider(format!(
                "quota exceeded creating '{}'",
                request.name
            )));
        }
        if inner.hosts.values().any(|h| h.host.name == request.name) {
            return Err(Error::duplicate(format!(
                "host '{}' already exists",
                request.name
            )));
        }
        let host = Host {
            id: Uuid::new_v4().to_string(),
            name: request.name.clone(),
            private_ip: inner.allocate_ip(&request.network_id)?,
            public_ip: request.public_ip.then(|| inner.public_ip()),
        };
        inner.hosts.insert(
            host.id.clone(),
            SimHost {
                host: host.clone(),
                network_id: request.network_id.clone(),
                gateway: false,
                state: HostState::Started,
            },
        );
        Ok(host)
    }

    async fn inspect_host(&self, id: &str) -> Result<Host> {
        Ok(self.lock().host(id)?.host.clone())
    }

    async fn delete_host(&self, id: &str) -> Result<()> {
        let mut inner = self.lock();
        let name = inner.host(id)?.host.name.clone();
        if inner.fail_delete.contains(&name) {
            return Err(Error::provider(format!("failed to delete '{}'", name)));
        }
        inner.hosts.remove(id);
        inner.deleted.push(name);
        Ok(())
    }

    async fn start_host(&self, id: &str) -> Result<()> {
        self.power(id, HostState::Started)
    }

    async fn stop_host(&self, id: &str) -> Result<()> {
        self.power(id, HostState::Stopped)
    }

    async fn host_state(&self, id: &str) -> Result<HostState> {
        Ok(self.lock().host(id)?.state)
    }

    async fn ssh_config(&self, id: &str) -> Result<SshConfig> {
        let inner = self.lock();
        let host = inner.host(id)?;
        if let Some(public_ip) = &host.host.public_ip {
            return Ok(SshConfig::new(&host.host.name, public_ip).with_user(ADMIN_LOGIN));
        }
        let config = SshConfig::new(&host.host.name, &host.host.private_ip).with_user(ADMIN_LOGIN);
        let gateway = inner
            .networks
            .get(&host.network_id)
            .map(|n| &n.network.gateway)
            .and_then(|gw| gw.public_ip.as_ref().map(|ip| (gw, ip)));
        Ok(match gateway {
            Some((gw, ip)) => {
                config.with_gateway(SshConfig::new(&gw.name, ip).with_user(ADMIN_LOGIN))
            }
            None => config,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::HostSizing;
    use safescale_utils::scerr::ErrorKind;

    fn network_request(failover: bool) -> NetworkRequest {
        NetworkRequest {
            name: "net-demo".to_string(),
            cidr: "192.168.0.0/16".parse().unwrap(),
            domain: "cluster.local".to_string(),
            gateway_sizing: HostSizing::gateway_default(),
            gateway_image: "Ubuntu 18.04".to_string(),
            failover,
            keypair: "key".to_string(),
        }
    }

    fn host_request(name: &str, network_id: &str) -> HostRequest {
        HostRequest {
            name: name.to_string(),
            sizing: HostSizing::new(2, 4, 4.0, 8.0, 20),
            image: "Ubuntu 18.04".to_string(),
            network_id: network_id.to_string(),
            public_ip: false,
            keypair: "key".to_string(),
        }
    }

    #[smol_potat::test]
    async fn test_network_with_failover() {
        let stack = SimStack::new();
        let network = stack.create_network(&network_request(true)).await.unwrap();
        let secondary = network.secondary_gateway.clone().unwrap();
        assert_eq!(network.gateway.private_ip, "192.168.0.2");
        assert_eq!(secondary.private_ip, "192.168.0.3");
        assert_eq!(network.default_route_ip, "192.168.0.4");
        assert_eq!(network.endpoint_ip, "203.0.113.1");

        stack.delete_network(&network.id).await.unwrap();
        assert_eq!(stack.network_count(), 0);
        assert!(stack.host_names().is_empty());
    }

    #[smol_potat::test]
    async fn test_host_reached_through_gateway() {
        let stack = SimStack::new();
        let network = stack.create_network(&network_request(false)).await.unwrap();
        let host = stack
            .create_host(&host_request("demo-node-1", &network.id))
            .await
            .unwrap();

        let config = stack.ssh_config(&host.id).await.unwrap();
        assert_eq!(config.address(), host.private_ip);
        assert_eq!(config.gateway().unwrap().hostname(), "gw-net-demo");
    }

    #[smol_potat::test]
    async fn test_injected_failures() {
        let stack = SimStack::new();
        let network = stack.create_network(&network_request(false)).await.unwrap();
        stack.fail_host_creation("demo-node-2");
        stack.fail_power("demo-node-1");

        let host = stack
            .create_host(&host_request("demo-node-1", &network.id))
            .await
            .unwrap();
        let err = stack
            .create_host(&host_request("demo-node-2", &network.id))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Provider);
        assert!(stack.stop_host(&host.id).await.is_err());
        assert_eq!(
            stack.delete_host("missing").await.unwrap_err().kind(),
            ErrorKind::NotFound
        );
    }
}
