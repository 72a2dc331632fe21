//! State probing, power operations and deletion

use super::{Cluster, tolerate_not_found};
use crate::enums::{ClusterState, HostState};
use crate::properties::StateV1;
use chrono::Utc;
use safescale_utils::concurrency::{FanOutReport, Task, fan_out};
use safescale_utils::scerr::Result;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Power {
    On,
    Off,
    Delete,
}

impl Cluster {
    /// Current state, probed from the hosts when the last one is stale
    ///
    /// Transient states and states outside of the running lifecycle are
    /// returned as recorded.
    pub async fn get_state(&self, task: &Task) -> Result<ClusterState> {
        let (task, _job) = self.start_job(task, "get state of");
        let _tracer = self.tracer(&task, "get_state", String::new());

        let recorded = self.properties.get::<StateV1>()?;
        let probeable = matches!(
            recorded.state,
            ClusterState::Created | ClusterState::Stopped | ClusterState::Degraded
        );
        let fresh = recorded.last_collected.is_some_and(|at| {
            (Utc::now() - at)
                .to_std()
                .is_ok_and(|age| age < recorded.collect_interval)
        });
        if !probeable || fresh {
            return Ok(recorded.state);
        }

        let observed = self.probe_state(&task).await?;
        let name = self.name().to_string();
        let state = self
            .properties
            .lock_for_write::<StateV1>()
            .then_use(|state| {
                if state.state.is_transient() {
                    // An operation started while probing
                    return Ok(state.state);
                }
                if state.state != observed {
                    info!("Cluster '{}' observed {}, was {}", name, observed, state.state);
                }
                state.state = observed;
                state.last_collected = Some(Utc::now());
                Ok(observed)
            })?;
        self.persist().await?;
        debug!("State of cluster '{}' is {}", self.name(), state);
        Ok(state)
    }

    async fn probe_state(&self, task: &Task) -> Result<ClusterState> {
        let mut ids = self.properties.network()?.gateway_ids();
        ids.extend(self.list_master_ids()?);
        ids.extend(self.list_node_ids()?);

        let mut started = 0;
        let mut stopped = 0;
        for id in &ids {
            task.check_cancelled()
                .map_err(|e| e.wrap(format!("failed to probe state of cluster '{}'", self.name())))?;
            match self.session.stack().host_state(id).await {
                Ok(HostState::Started) => started += 1,
                Ok(HostState::Stopped) => stopped += 1,
                Ok(other) => debug!("Host '{}' is {:?}", id, other),
                Err(e) if e.is_terminal() => {
                    return Err(e.wrap(format!("failed to probe state of cluster '{}'", self.name())));
                }
                Err(e) => warn!("Cannot get state of host '{}': {}", id, e),
            }
        }
        Ok(if started == ids.len() {
            ClusterState::Created
        } else if stopped == ids.len() {
            ClusterState::Stopped
        } else {
            ClusterState::Degraded
        })
    }

    /// Power on the gateways, then the masters and nodes
    ///
    /// Does nothing on a running cluster. Any host failing leaves the cluster
    /// `Degraded`.
    pub async fn start(&self, task: &Task) -> Result<()> {
        let (task, _job) = self.start_job(task, "start");
        let _tracer = self.tracer(&task, "start", String::new());

        if self.last_state()? == ClusterState::Created {
            debug!("Cluster '{}' already started", self.name());
            return Ok(());
        }
        self.begin(ClusterState::Starting).await?;

        let gateways = self.gateway_targets()?;
        let hosts = self.host_targets()?;
        let mut outcome = self.power(&task, Power::On, gateways).await;
        if outcome.is_ok() {
            outcome = self.power(&task, Power::On, hosts).await;
        }
        self.conclude(outcome, ClusterState::Created, "start").await
    }

    /// Power off the masters and nodes, then the gateways
    ///
    /// Does nothing on a stopped cluster. Any host failing leaves the cluster
    /// `Degraded`.
    pub async fn stop(&self, task: &Task) -> Result<()> {
        let (task, _job) = self.start_job(task, "stop");
        let _tracer = self.tracer(&task, "stop", String::new());

        if self.last_state()? == ClusterState::Stopped {
            debug!("Cluster '{}' already stopped", self.name());
            return Ok(());
        }
        self.begin(ClusterState::Stopping).await?;

        let gateways = self.gateway_targets()?;
        let hosts = self.host_targets()?;
        let mut outcome = self.power(&task, Power::Off, hosts).await;
        if outcome.is_ok() {
            outcome = self.power(&task, Power::Off, gateways).await;
        }
        self.conclude(outcome, ClusterState::Stopped, "stop").await
    }

    /// Delete every host, the network and the metadata of the cluster
    pub async fn delete(&self, task: &Task) -> Result<()> {
        let (task, _job) = self.start_job(task, "delete");
        let _tracer = self.tracer(&task, "delete", String::new());

        self.begin(ClusterState::Deleting).await?;
        info!("Deleting cluster '{}'", self.name());

        let hosts = self.host_targets()?;
        if let Err(e) = self.power(&task, Power::Delete, hosts).await {
            return Err(self.end_with_error(ClusterState::Degraded, e).await);
        }

        let network = self.properties.network();
        if let Ok(network) = network {
            let limit = self.session.timeouts().host;
            let deleted = tolerate_not_found(
                self.provider_call(&task, limit, || {
                    self.session.stack().delete_network(&network.network_id)
                })
                .await,
            );
            if let Err(e) = deleted {
                let e = e.wrap(format!("failed to delete network of cluster '{}'", self.name()));
                return Err(self.end_with_error(ClusterState::Degraded, e).await);
            }
        }

        self.set_state(ClusterState::Deleted)?;
        self.session
            .metadata()
            .remove(self.name())
            .await
            .map_err(|e| e.wrap(format!("failed to remove metadata of cluster '{}'", self.name())))?;
        info!("Cluster '{}' deleted", self.name());
        Ok(())
    }

    async fn conclude(&self, outcome: Result<()>, success: ClusterState, what: &str) -> Result<()> {
        match outcome {
            Ok(()) => {
                self.end(success).await?;
                info!("Cluster '{}' {} done", self.name(), what);
                Ok(())
            }
            Err(e) => {
                warn!("Failed to {} cluster '{}': {}", what, self.name(), e);
                let e = e.wrap(format!("failed to {} cluster '{}'", what, self.name()));
                Err(self.end_with_error(ClusterState::Degraded, e).await)
            }
        }
    }

    /// Gateways, keyed by identifier
    fn gateway_targets(&self) -> Result<HashMap<String, String>> {
        let network = self.properties.network()?;
        Ok(network
            .gateway_ids()
            .into_iter()
            .map(|id| (id.clone(), id))
            .collect())
    }

    /// Masters and nodes by host name
    fn host_targets(&self) -> Result<HashMap<String, String>> {
        let mut targets: HashMap<String, String> = self
            .list_masters()?
            .into_iter()
            .map(|n| (n.name, n.id))
            .collect();
        targets.extend(self.list_nodes()?.into_iter().map(|n| (n.name, n.id)));
        Ok(targets)
    }

    /// Apply `power` to every target in parallel
    async fn power(&self, task: &Task, power: Power, targets: HashMap<String, String>) -> Result<()> {
        if targets.is_empty() {
            return Ok(());
        }
        task.check_cancelled()?;

        let names: Vec<String> = targets.keys().cloned().collect();
        let ids = Arc::new(targets);
        let stack = self.session.stack().clone();
        let report: FanOutReport<()> = fan_out(
            self.session.spawner().as_ref(),
            names,
            move |name| {
                let stack = stack.clone();
                let id = ids.get(&name).cloned().unwrap_or(name);
                async move {
                    match power {
                        Power::On => stack.start_host(&id).await,
                        Power::Off => stack.stop_host(&id).await,
                        Power::Delete => tolerate_not_found(stack.delete_host(&id).await),
                    }
                }
            },
            self.session.timeouts().host,
        )
        .await;

        let what = match power {
            Power::On => "starting hosts",
            Power::Off => "stopping hosts",
            Power::Delete => "deleting hosts",
        };
        report.into_result(what).map(|_| ())
    }
}
