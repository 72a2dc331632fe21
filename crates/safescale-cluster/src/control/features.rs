//! Feature operations and the cluster as a feature target

use super::Cluster;
use crate::enums::ClusterState;
use crate::feature::{FeatureSettings, Results, Target, Variables};
use crate::identity::ADMIN_LOGIN;
use crate::properties::{FeaturesV1, InstalledFeature, Node};
use async_trait::async_trait;
use safescale_ssh::CommandOutput;
use safescale_utils::concurrency::Task;
use safescale_utils::scerr::{Error, ErrorKind, Result};
use tracing::info;

/// A cluster seen by the feature engine
pub struct ClusterTarget<'a> {
    cluster: &'a Cluster,
    task: &'a Task,
}

impl<'a> ClusterTarget<'a> {
    /// Target `cluster` within `task`
    pub fn new(cluster: &'a Cluster, task: &'a Task) -> Self {
        Self { cluster, task }
    }
}

#[async_trait]
impl Target for ClusterTarget<'_> {
    fn name(&self) -> &str {
        self.cluster.name()
    }

    async fn run_on_master(&self, command: &str) -> Result<CommandOutput> {
        let master = self.cluster.find_available_master(self.task).await?;
        self.cluster.run_on_host(self.task, &master.id, command).await
    }

    async fn masters(&self) -> Result<Vec<Node>> {
        self.cluster.list_masters()
    }

    async fn nodes(&self) -> Result<Vec<Node>> {
        self.cluster.list_nodes()
    }
}

#[derive(Debug, Clone, Copy)]
enum FeatureAction {
    Add,
    Check,
    Remove,
}

impl FeatureAction {
    fn verb(self) -> &'static str {
        match self {
            FeatureAction::Add => "add",
            FeatureAction::Check => "check",
            FeatureAction::Remove => "remove",
        }
    }
}

impl Cluster {
    /// Install feature `name` on the cluster
    pub async fn add_feature(
        &self,
        task: &Task,
        name: &str,
        variables: &Variables,
        settings: &FeatureSettings,
    ) -> Result<()> {
        let (task, _job) = self.start_job(task, &format!("add feature '{}' to", name));
        let _tracer = self.tracer(&task, "add_feature", format!("({})", name));

        let previous = self.begin(ClusterState::InstallingFeature).await?;
        match self.install_feature(&task, name, variables, settings).await {
            Ok(()) => {
                self.end(previous).await?;
                Ok(())
            }
            Err(e) => Err(self.end_with_error(previous, e).await),
        }
    }

    /// Whether feature `name` is installed, as checked on the hosts
    pub async fn check_feature(
        &self,
        task: &Task,
        name: &str,
        variables: &Variables,
        settings: &FeatureSettings,
    ) -> Result<bool> {
        let (task, _job) = self.start_job(task, &format!("check feature '{}' on", name));
        let _tracer = self.tracer(&task, "check_feature", format!("({})", name));

        let results = self
            .apply_feature(&task, FeatureAction::Check, name, variables, settings)
            .await?;
        Ok(results.successful())
    }

    /// Uninstall feature `name` from the cluster
    pub async fn remove_feature(
        &self,
        task: &Task,
        name: &str,
        variables: &Variables,
        settings: &FeatureSettings,
    ) -> Result<()> {
        let (task, _job) = self.start_job(task, &format!("remove feature '{}' from", name));
        let _tracer = self.tracer(&task, "remove_feature", format!("({})", name));

        let previous = self.begin(ClusterState::RemovingFeature).await?;
        let outcome = self
            .apply_feature(&task, FeatureAction::Remove, name, variables, settings)
            .await
            .and_then(|results| self.verdict(FeatureAction::Remove, name, &results));
        if let Err(e) = outcome {
            return Err(self.end_with_error(previous, e).await);
        }

        let removed = self.properties.lock_for_write::<FeaturesV1>().then_use(|features| {
            features.installed.remove(name);
            for installed in features.installed.values_mut() {
                installed.required_by.remove(name);
            }
            Ok(())
        });
        if let Err(e) = removed {
            return Err(self.end_with_error(previous, e).await);
        }
        self.end(previous).await?;
        info!("Feature '{}' removed from cluster '{}'", name, self.name());
        Ok(())
    }

    /// Install a feature and record it, without state transition
    pub(super) async fn install_feature(
        &self,
        task: &Task,
        name: &str,
        variables: &Variables,
        settings: &FeatureSettings,
    ) -> Result<()> {
        let results = self
            .apply_feature(task, FeatureAction::Add, name, variables, settings)
            .await?;
        self.verdict(FeatureAction::Add, name, &results)?;

        self.properties.lock_for_write::<FeaturesV1>().then_use(|features| {
            features
                .installed
                .entry(name.to_string())
                .or_insert_with(|| InstalledFeature {
                    name: name.to_string(),
                    ..InstalledFeature::default()
                });
            Ok(())
        })?;
        self.persist().await?;
        info!("Feature '{}' installed on cluster '{}'", name, self.name());
        Ok(())
    }

    async fn apply_feature(
        &self,
        task: &Task,
        action: FeatureAction,
        name: &str,
        variables: &Variables,
        settings: &FeatureSettings,
    ) -> Result<Results> {
        let feature = self.session.features().feature(name)?;
        let target = ClusterTarget::new(self, task);
        let variables = self.feature_variables(variables)?;
        let outcome = match action {
            FeatureAction::Add => feature.add(&target, &variables, settings).await,
            FeatureAction::Check => feature.check(&target, &variables, settings).await,
            FeatureAction::Remove => feature.remove(&target, &variables, settings).await,
        };
        outcome.map_err(|e| {
            e.wrap(format!(
                "failed to {} feature '{}' on cluster '{}'",
                action.verb(),
                name,
                self.name()
            ))
        })
    }

    fn verdict(&self, action: FeatureAction, name: &str, results: &Results) -> Result<()> {
        if results.successful() {
            return Ok(());
        }
        Err(Error::new(
            ErrorKind::Execution,
            format!(
                "failed to {} feature '{}' on cluster '{}': {}",
                action.verb(),
                name,
                self.name(),
                results.all_error_messages()
            ),
        ))
    }

    /// Variables describing the cluster, overridden by `extra`
    pub fn feature_variables(&self, extra: &Variables) -> Result<Variables> {
        let network = self.properties.network()?;
        let masters = self.list_masters()?;

        let mut variables = Variables::new();
        variables.insert("ClusterName".into(), self.name().to_string());
        variables.insert("ClusterFlavor".into(), self.identity.flavor().to_string());
        variables.insert("Complexity".into(), self.identity.complexity().to_string());
        variables.insert("ClusterAdminUsername".into(), ADMIN_LOGIN.to_string());
        variables.insert(
            "ClusterAdminPassword".into(),
            self.identity.admin_password().to_string(),
        );
        variables.insert("CIDR".into(), network.cidr.clone());
        variables.insert("Domain".into(), network.domain.clone());
        variables.insert("DefaultRouteIP".into(), network.default_route_ip.clone());
        variables.insert("PrimaryGatewayIP".into(), network.gateway_ip.clone());
        variables.insert("EndpointIP".into(), network.endpoint_ip.clone());
        if let Some(ip) = &network.secondary_gateway_ip {
            variables.insert("SecondaryGatewayIP".into(), ip.clone());
        }
        variables.insert(
            "MasterIPs".into(),
            masters
                .iter()
                .map(|m| m.private_ip.as_str())
                .collect::<Vec<_>>()
                .join(","),
        );
        variables.extend(extra.iter().map(|(k, v)| (k.clone(), v.clone())));
        Ok(variables)
    }
}
