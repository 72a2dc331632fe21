//! Growing and shrinking the node sequence

use super::create::node_of;
use super::{Cluster, tolerate_not_found};
use crate::enums::ClusterState;
use crate::properties::{Node, NodesV1};
use crate::resources::{Host, HostDefinition};
use safescale_utils::concurrency::Task;
use safescale_utils::scerr::{Error, Result};
use tracing::{info, warn};

/// Outcome of [`Cluster::add_nodes`]
///
/// Nodes created before a failure stay in the cluster.
#[derive(Debug)]
pub struct ExpandOutcome {
    /// Hosts created and joined, in order
    pub hosts: Vec<Host>,
    /// Failure that stopped the expansion
    pub failure: Option<Error>,
}

impl ExpandOutcome {
    /// Whether every requested node was added
    pub fn is_complete(&self) -> bool {
        self.failure.is_none()
    }
}

impl Cluster {
    /// Add `count` nodes, joining each one to the cluster
    ///
    /// Nodes are created one after the other; the first failure stops the
    /// expansion and is reported along with the nodes already added.
    pub async fn add_nodes(
        &self,
        task: &Task,
        count: u32,
        def: Option<&HostDefinition>,
    ) -> Result<ExpandOutcome> {
        let (task, _job) = self.start_job(task, "expand");
        let tracer = self.tracer(&task, "add_nodes", format!("({})", count));

        if count == 0 {
            return Err(Error::invalid_parameter("count", "must be greater than 0"));
        }

        let previous = self.begin(ClusterState::Expanding).await?;
        let _ops = self.node_ops.lock().await;

        let mut outcome = ExpandOutcome {
            hosts: Vec::new(),
            failure: None,
        };
        for _ in 0..count {
            match self.add_node(&task, def).await {
                Ok(host) => {
                    tracer.trace(format!("node '{}' joined", host.name));
                    outcome.hosts.push(host);
                }
                Err(e) => {
                    warn!("Expansion of cluster '{}' stopped: {}", self.name(), e);
                    outcome.failure = Some(e);
                    break;
                }
            }
        }
        info!(
            "Added {}/{} node(s) to cluster '{}'",
            outcome.hosts.len(),
            count,
            self.name()
        );

        if let Err(e) = self.end(previous).await {
            match outcome.failure.as_mut() {
                Some(failure) => failure.add_consequence(e),
                None => outcome.failure = Some(e),
            }
        }
        Ok(outcome)
    }

    async fn add_node(&self, task: &Task, def: Option<&HostDefinition>) -> Result<Host> {
        task.check_cancelled()?;
        let host = self.create_node_host(task, def).await?;
        let node = node_of(&host);

        let steps = self.policy.node_join_steps(&node);
        if !steps.is_empty() {
            let joined = match self.find_available_master(task).await {
                Ok(master) => self.run_steps(task, &master, &node, steps).await,
                Err(e) => Err(e),
            };
            if let Err(e) = joined {
                let mut err = e.wrap(format!("failed to join node '{}'", node.name));
                if let Err(cleanup) = tolerate_not_found(self.session.stack().delete_host(&host.id).await) {
                    err.add_consequence(cleanup.wrap(format!("cleanup failed to delete host '{}'", host.name)));
                }
                return Err(err);
            }
        }

        self.properties
            .lock_for_write::<NodesV1>()
            .then_use(|nodes| {
                nodes.private_nodes.push(node);
                Ok(())
            })?;
        self.persist().await?;
        Ok(host)
    }

    /// Remove the last node after detaching it through `available_master`
    ///
    /// Fails with `NotFound`, leaving the cluster untouched, when there is no
    /// node.
    pub async fn delete_last_node(&self, task: &Task, available_master: &Node) -> Result<Node> {
        let (task, _job) = self.start_job(task, "shrink");
        let tracer = self.tracer(&task, "delete_last_node", format!("({})", available_master.name));

        if self.count_nodes()? == 0 {
            return Err(self.no_node());
        }

        let previous = self.begin(ClusterState::Shrinking).await?;
        let removed = self.remove_last_node(&task, available_master).await;
        tracer.trace_error(&removed);
        if let Err(e) = self.end(previous).await {
            return Err(match removed {
                Ok(_) => e,
                Err(mut err) => {
                    err.add_consequence(e);
                    err
                }
            });
        }
        removed
    }

    /// Remove the last `count` nodes
    ///
    /// `count` may not exceed the number of nodes. Every removal is
    /// attempted; failures are reported together.
    pub async fn shrink(&self, task: &Task, count: usize) -> Result<Vec<Node>> {
        let (task, _job) = self.start_job(task, "shrink");
        let _tracer = self.tracer(&task, "shrink", format!("({})", count));

        let present = self.count_nodes()?;
        if count == 0 || count > present {
            return Err(Error::invalid_parameter(
                "count",
                format!("must be between 1 and {}, the number of nodes", present),
            ));
        }
        let master = self.find_available_master(&task).await?;

        let previous = self.begin(ClusterState::Shrinking).await?;
        let mut removed = Vec::new();
        let mut failures = Vec::new();
        for i in 1..=count {
            match self.remove_last_node(&task, &master).await {
                Ok(node) => removed.push(node),
                Err(e) => failures.push(e.wrap(format!("failed to delete node #{}", i))),
            }
        }
        let ended = self.end(previous).await;

        let result = match failures.first() {
            None => Ok(removed),
            Some(first) => Err(Error::new(
                first.kind(),
                format!(
                    "failed to delete {} of {} node(s) from cluster '{}'",
                    failures.len(),
                    count,
                    self.name()
                ),
            )
            .with_consequences(failures)),
        };
        match (result, ended) {
            (result, Ok(())) => result,
            (Ok(_), Err(e)) => Err(e),
            (Err(mut err), Err(e)) => {
                err.add_consequence(e);
                Err(err)
            }
        }
    }

    async fn remove_last_node(&self, task: &Task, master: &Node) -> Result<Node> {
        let _ops = self.node_ops.lock().await;
        task.check_cancelled()?;

        let node = self
            .properties
            .lock_for_read::<NodesV1>()
            .then_use(|nodes| Ok(nodes.private_nodes.last().cloned()))?
            .ok_or_else(|| self.no_node())?;

        let steps = self.policy.node_leave_steps(&node);
        self.run_steps(task, master, &node, steps)
            .await
            .map_err(|e| e.wrap(format!("failed to detach node '{}'", node.name)))?;

        let limit = self.session.timeouts().host;
        tolerate_not_found(
            self.provider_call(task, limit, || self.session.stack().delete_host(&node.id))
                .await,
        )
        .map_err(|e| e.wrap(format!("failed to delete host '{}'", node.name)))?;

        self.properties
            .lock_for_write::<NodesV1>()
            .then_use(|nodes| match nodes.private_nodes.last() {
                Some(last) if last.id == node.id => {
                    nodes.private_nodes.pop();
                    Ok(())
                }
                _ => Err(Error::inconsistent(format!(
                    "node '{}' is no longer the last one",
                    node.name
                ))),
            })?;
        self.persist().await?;
        info!("Node '{}' removed from cluster '{}'", node.name, self.name());
        Ok(node)
    }

    fn no_node(&self) -> Error {
        Error::not_found(format!("no node to delete in cluster '{}'", self.name()))
    }
}
