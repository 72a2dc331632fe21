//! Cluster controller
//!
//! A [`Cluster`] couples an immutable [`Identity`] with its property store
//! and the [`Session`] collaborators. Every public operation runs in a child
//! task registered in the session job registry, moves the cluster through
//! its state machine and persists the properties after each mutation.
//!
//! Operations moving the cluster to a transient state refuse to run while
//! another one is in progress: the state acts as a busy flag.

mod create;
mod features;
mod inspect;
mod lifecycle;
mod nodes;

pub use create::Request;
pub use features::ClusterTarget;
pub use inspect::{ClusterInspection, RemoteDesktop, SizingDefaults};
pub use nodes::ExpandOutcome;

use crate::enums::ClusterState;
use crate::flavors::{self, FlavorPolicy, Step, StepHost};
use crate::identity::Identity;
use crate::metadata::ClusterRecord;
use crate::properties::{Node, NodesV1, Properties, StateV1};
use crate::session::Session;
use chrono::Utc;
use safescale_ssh::{CommandOutput, OutputMode};
use safescale_utils::concurrency::{JobGuard, Task, Tracer, register_or_warn};
use safescale_utils::logging::is_optional_log_active;
use safescale_utils::retry::{AbortCause, Action, Constant, Try, Verdict};
use safescale_utils::scerr::{Error, ErrorKind, Result};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Optional log category tracing controller calls
pub const TRACE_CATEGORY: &str = "cluster";

/// A cluster and the collaborators to drive it
pub struct Cluster {
    identity: Identity,
    properties: Properties,
    session: Session,
    policy: Arc<dyn FlavorPolicy>,
    /// Serializes index computation and mutation of the node sequence
    node_ops: futures::lock::Mutex<()>,
}

impl std::fmt::Debug for Cluster {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cluster")
            .field("identity", &self.identity)
            .field("tenant", &self.session.tenant())
            .finish_non_exhaustive()
    }
}

impl Cluster {
    fn assemble(identity: Identity, properties: Properties, session: Session) -> Self {
        let policy = flavors::policy(identity.flavor());
        Self {
            identity,
            properties,
            session,
            policy,
            node_ops: futures::lock::Mutex::new(()),
        }
    }

    /// Load a cluster from its persisted record
    pub async fn load(session: &Session, name: &str) -> Result<Self> {
        let record = session
            .metadata()
            .get(name)
            .await?
            .ok_or_else(|| Error::not_found(format!("cluster '{}' not found", name)))?;
        Self::from_record(session, &record)
    }

    /// Rebuild a cluster from a record
    pub fn from_record(session: &Session, record: &ClusterRecord) -> Result<Self> {
        let properties = record
            .restore()
            .map_err(|e| e.wrap(format!("failed to load cluster '{}'", record.name())))?;
        Ok(Self::assemble(
            record.identity.clone(),
            properties,
            session.clone(),
        ))
    }

    /// Identity of the cluster
    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    /// Name of the cluster
    pub fn name(&self) -> &str {
        self.identity.name()
    }

    /// Property store
    pub fn properties(&self) -> &Properties {
        &self.properties
    }

    /// Session the cluster is driven with
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Last persisted state, without probing
    pub fn last_state(&self) -> Result<ClusterState> {
        self.properties
            .lock_for_read::<StateV1>()
            .then_use(|state| Ok(state.state))
    }

    /// Write the property store to the metadata backend
    pub async fn persist(&self) -> Result<()> {
        let record = ClusterRecord::capture(&self.identity, &self.properties)?;
        self.session
            .metadata()
            .put(&record)
            .await
            .map_err(|e| e.wrap(format!("failed to persist cluster '{}'", self.name())))
    }

    /// Child task registered as a job for the duration of an operation
    fn start_job(&self, parent: &Task, operation: &str) -> (Task, Option<JobGuard>) {
        let (task, cancel) = parent.child();
        let description = format!("{} cluster '{}'", operation, self.name());
        let guard = register_or_warn(self.session.jobs(), &task, cancel, &description);
        (task, guard)
    }

    #[track_caller]
    fn tracer(&self, task: &Task, operation: &str, params: String) -> Tracer {
        Tracer::new(
            Some(task),
            operation,
            params,
            is_optional_log_active(TRACE_CATEGORY),
        )
    }

    /// Enter `next`, returning the stable state left
    async fn begin(&self, next: ClusterState) -> Result<ClusterState> {
        let name = self.name().to_string();
        let previous = self
            .properties
            .lock_for_write::<StateV1>()
            .then_use(|state| {
                if state.state.is_transient() {
                    return Err(Error::not_available(format!(
                        "cluster '{}' is busy ({})",
                        name, state.state
                    )));
                }
                if !ClusterState::is_valid_transition(state.state, next) {
                    return Err(Error::not_available(format!(
                        "cluster '{}' cannot go from {} to {}",
                        name, state.state, next
                    )));
                }
                let previous = state.state;
                state.state = next;
                state.last_collected = Some(Utc::now());
                Ok(previous)
            })?;
        debug!("Cluster '{}' went from {} to {}", self.name(), previous, next);
        if let Err(mut err) = self.persist().await {
            if let Err(e) = self.properties.lock_for_write::<StateV1>().then_use(|state| {
                state.state = previous;
                Ok(())
            }) {
                err.add_consequence(e);
            }
            return Err(err);
        }
        Ok(previous)
    }

    /// Leave a transient state for `state`
    async fn end(&self, state: ClusterState) -> Result<()> {
        self.set_state(state)?;
        self.persist().await
    }

    fn set_state(&self, next: ClusterState) -> Result<()> {
        self.properties
            .lock_for_write::<StateV1>()
            .then_use(|state| {
                if !ClusterState::is_valid_transition(state.state, next) && state.state != next {
                    warn!("Unexpected transition from {} to {}", state.state, next);
                }
                state.state = next;
                state.last_collected = Some(Utc::now());
                Ok(())
            })
    }

    /// Leave a transient state, attaching a persistence failure to `err`
    async fn end_with_error(&self, state: ClusterState, mut err: Error) -> Error {
        if let Err(e) = self.end(state).await {
            err.add_consequence(e);
        }
        err
    }

    // Node queries

    /// Provider identifiers of the masters
    pub fn list_master_ids(&self) -> Result<Vec<String>> {
        self.properties
            .lock_for_read::<NodesV1>()
            .then_use(|nodes| Ok(nodes.masters.iter().map(|n| n.id.clone()).collect()))
    }

    /// Provider identifiers of the private nodes
    pub fn list_node_ids(&self) -> Result<Vec<String>> {
        self.properties
            .lock_for_read::<NodesV1>()
            .then_use(|nodes| Ok(nodes.private_nodes.iter().map(|n| n.id.clone()).collect()))
    }

    /// Masters, in creation order
    pub fn list_masters(&self) -> Result<Vec<Node>> {
        self.properties
            .lock_for_read::<NodesV1>()
            .then_use(|nodes| Ok(nodes.masters.clone()))
    }

    /// Private nodes, in creation order
    pub fn list_nodes(&self) -> Result<Vec<Node>> {
        self.properties
            .lock_for_read::<NodesV1>()
            .then_use(|nodes| Ok(nodes.private_nodes.clone()))
    }

    /// Number of private nodes
    pub fn count_nodes(&self) -> Result<usize> {
        self.properties
            .lock_for_read::<NodesV1>()
            .then_use(|nodes| Ok(nodes.private_nodes.len()))
    }

    /// Master or node named `hostname`
    pub fn search_node(&self, hostname: &str) -> Result<Option<Node>> {
        self.properties
            .lock_for_read::<NodesV1>()
            .then_use(|nodes| Ok(nodes.find(hostname).cloned()))
    }

    // Remote execution

    /// First master, in list order, answering a probe
    ///
    /// `NotFound` when the cluster has no master, `NotAvailable` when none
    /// answers.
    pub async fn find_available_master(&self, task: &Task) -> Result<Node> {
        let masters = self.list_masters()?;
        if masters.is_empty() {
            return Err(Error::not_found(format!(
                "no masters exist in cluster '{}'",
                self.name()
            )));
        }

        let timeouts = self.session.timeouts();
        let mut failures = Vec::new();
        for master in masters {
            task.check_cancelled()?;
            match self.probe(&master.id, timeouts.connection).await {
                Ok(()) => return Ok(master),
                Err(e) => {
                    debug!("Master '{}' is not available: {}", master.name, e);
                    failures.push(e.wrap(format!("master '{}' unreachable", master.name)));
                }
            }
        }
        Err(Error::not_available(format!(
            "no masters reachable in cluster '{}'",
            self.name()
        ))
        .with_consequences(failures))
    }

    /// One bounded connection attempt to a host
    async fn probe(&self, host_id: &str, timeout: Duration) -> Result<()> {
        let config = self.session.stack().ssh_config(host_id).await?;
        let output = self
            .session
            .ssh()
            .run(&config, "true", OutputMode::Collect, timeout, timeout)
            .await?;
        if output.is_success() {
            Ok(())
        } else {
            Err(Error::execution(
                format!("probe of '{}' failed", config.hostname()),
                output.retcode,
            ))
        }
    }

    /// Run `command` on an available master and return its output
    pub async fn run_on_master(&self, task: &Task, command: &str) -> Result<CommandOutput> {
        let (task, _job) = self.start_job(task, "run command on");
        let _tracer = self.tracer(&task, "run_on_master", format!("({})", command));

        let master = self.find_available_master(&task).await?;
        self.run_on_host(&task, &master.id, command).await
    }

    /// Run `command` on a host, retrying while ssh cannot reach it
    async fn run_on_host(&self, task: &Task, host_id: &str, command: &str) -> Result<CommandOutput> {
        let config = self.session.stack().ssh_config(host_id).await?;
        let timeouts = self.session.timeouts();
        safescale_ssh::run(
            self.session.ssh().as_ref(),
            Some(task),
            &config,
            command,
            OutputMode::Collect,
            timeouts.connection,
            timeouts.execution,
            timeouts,
        )
        .await
    }

    /// Run flavor steps for `node`
    async fn run_steps(&self, task: &Task, master: &Node, node: &Node, steps: Vec<Step>) -> Result<()> {
        for step in steps {
            let (host, host_id) = match step.on {
                StepHost::Master => (&master.name, &master.id),
                StepHost::Node => (&node.name, &node.id),
            };
            debug!("Running step '{}' on '{}'", step.label, host);
            let output = self.run_on_host(task, host_id, &step.command).await?;
            if !output.is_success() {
                let mut message = format!(
                    "step '{}' failed on '{}' (retcode {})",
                    step.label, host, output.retcode
                );
                if let Some(meaning) = self.policy.describe_retcode(output.retcode) {
                    message.push_str(&format!(": {}", meaning));
                }
                if !output.stderr.is_empty() {
                    message.push_str(&format!(": {}", output.stderr.trim()));
                }
                return Err(Error::execution(message, output.retcode));
            }
        }
        Ok(())
    }

    /// Retry a provider call while it fails with a transient error
    async fn provider_call<T, F, Fut>(&self, task: &Task, limit: Duration, op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        Action::new(move |t: &Try| transient_verdict(t, limit))
            .delay(Constant(self.session.timeouts().default_delay))
            .within(task)
            .run(op)
            .await
    }
}

fn transient_verdict(t: &Try, limit: Duration) -> Verdict {
    match &t.err {
        Some(err) if err.is_transient() => {
            if t.elapsed() < limit {
                Verdict::Retry
            } else {
                Verdict::Abort(AbortCause::Timeout(limit))
            }
        }
        _ => Verdict::Done,
    }
}

/// Treat a missing resource as already deleted
fn tolerate_not_found(outcome: Result<()>) -> Result<()> {
    match outcome {
        Err(e) if e.kind() == ErrorKind::NotFound => {
            debug!("Resource already gone: {}", e);
            Ok(())
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[test]
    fn test_transient_verdict() {
        let limit = Duration::from_secs(60);
        let start = Instant::now();
        let ok = Try::new(1, start, None);
        assert_eq!(transient_verdict(&ok, limit), Verdict::Done);

        let busy = Try::new(1, start, Some(Error::not_available("quota")));
        assert_eq!(transient_verdict(&busy, limit), Verdict::Retry);

        let denied = Try::new(1, start, Some(Error::provider("denied")));
        assert_eq!(transient_verdict(&denied, limit), Verdict::Done);

        if let Some(earlier) = start.checked_sub(Duration::from_secs(61)) {
            let late = Try::new(3, earlier, Some(Error::timeout("slow")));
            assert_eq!(
                transient_verdict(&late, limit),
                Verdict::Abort(AbortCause::Timeout(limit))
            );
        }
    }

    #[test]
    fn test_tolerate_not_found() {
        assert!(tolerate_not_found(Err(Error::not_found("host"))).is_ok());
        assert!(tolerate_not_found(Err(Error::provider("denied"))).is_err());
    }
}
