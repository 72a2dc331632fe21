//! Contract with the feature installation engine

use crate::properties::Node;
use async_trait::async_trait;
use safescale_ssh::CommandOutput;
use safescale_utils::scerr::Result;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Template variables handed to feature scripts
pub type Variables = BTreeMap<String, String>;

/// Knobs altering how a feature is applied
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FeatureSettings {
    /// Do not configure the reverse proxy rules of the feature
    pub skip_proxy: bool,
    /// Do not install the features this one requires
    pub skip_feature_requirements: bool,
    /// Run the add even if the check says the feature is present
    pub add_unconditionally: bool,
}

/// Outcome of one step on one host
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepResult {
    /// Host the step ran on
    pub host: String,
    /// Whether the step succeeded
    pub success: bool,
    /// Failure message
    pub error: Option<String>,
}

impl StepResult {
    /// Successful step on `host`
    pub fn ok(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            success: true,
            error: None,
        }
    }

    /// Failed step on `host`
    pub fn failed(host: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            success: false,
            error: Some(error.into()),
        }
    }
}

/// Step results of a feature action, by step name
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Results {
    steps: BTreeMap<String, Vec<StepResult>>,
}

impl Results {
    /// Empty results
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the result of `step`
    pub fn push(&mut self, step: impl Into<String>, result: StepResult) {
        self.steps.entry(step.into()).or_default().push(result);
    }

    /// Whether every step succeeded on every host
    pub fn successful(&self) -> bool {
        self.steps.values().flatten().all(|r| r.success)
    }

    /// Failure messages, one line per failed step and host
    pub fn all_error_messages(&self) -> String {
        let mut lines = Vec::new();
        for (step, results) in &self.steps {
            for result in results.iter().filter(|r| !r.success) {
                lines.push(format!(
                    "{}: {}: {}",
                    step,
                    result.host,
                    result.error.as_deref().unwrap_or("failed")
                ));
            }
        }
        lines.join("\n")
    }
}

/// What a feature acts upon
#[async_trait]
pub trait Target: Send + Sync {
    /// Name of the target
    fn name(&self) -> &str;

    /// Run a command on an available master
    async fn run_on_master(&self, command: &str) -> Result<CommandOutput>;

    /// Masters of the target
    async fn masters(&self) -> Result<Vec<Node>>;

    /// Nodes of the target
    async fn nodes(&self) -> Result<Vec<Node>>;
}

/// An installable feature
#[async_trait]
pub trait Feature: Send + Sync {
    /// Name of the feature
    fn name(&self) -> &str;

    /// Install the feature on `target`
    async fn add(
        &self,
        target: &dyn Target,
        variables: &Variables,
        settings: &FeatureSettings,
    ) -> Result<Results>;

    /// Check whether the feature is installed on `target`
    async fn check(
        &self,
        target: &dyn Target,
        variables: &Variables,
        settings: &FeatureSettings,
    ) -> Result<Results>;

    /// Uninstall the feature from `target`
    async fn remove(
        &self,
        target: &dyn Target,
        variables: &Variables,
        settings: &FeatureSettings,
    ) -> Result<Results>;
}

/// Source of features by name
pub trait FeatureEngine: Send + Sync {
    /// Load a feature, `NotFound` when unknown
    fn feature(&self, name: &str) -> Result<Arc<dyn Feature>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_results_aggregation() {
        let mut results = Results::new();
        assert!(results.successful());

        results.push("install", StepResult::ok("demo-master-1"));
        results.push("install", StepResult::failed("demo-node-1", "apt failed"));
        results.push("configure", StepResult::failed("demo-node-2", "timeout"));
        assert!(!results.successful());
        assert_eq!(
            results.all_error_messages(),
            "configure: demo-node-2: timeout\ninstall: demo-node-1: apt failed"
        );
    }
}
