//! Recording feature engine

use crate::feature::{
    Feature, FeatureEngine, FeatureSettings, Results, StepResult, Target, Variables,
};
use async_trait::async_trait;
use safescale_utils::scerr::Result;
use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// A feature action seen by [`SimFeatureEngine`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureCall {
    /// `add`, `check` or `remove`
    pub action: &'static str,
    /// Feature name
    pub feature: String,
    /// Name of the target
    pub target: String,
}

#[derive(Debug, Default)]
struct Record {
    calls: Vec<FeatureCall>,
    failing: HashSet<String>,
    installed: HashSet<String>,
}

/// Feature engine accepting any feature name
///
/// Each action runs one command on an available master of the target, so
/// that reachability problems surface like with real features.
#[derive(Debug, Default)]
pub struct SimFeatureEngine {
    record: Arc<Mutex<Record>>,
}

impl SimFeatureEngine {
    /// Engine where every feature succeeds
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every action of feature `name` report a failed step
    pub fn fail_feature(&self, name: impl Into<String>) {
        lock(&self.record).failing.insert(name.into());
    }

    /// Actions performed so far
    pub fn calls(&self) -> Vec<FeatureCall> {
        lock(&self.record).calls.clone()
    }

    /// Names of the features added, in the order they were added
    pub fn added(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|call| call.action == "add")
            .map(|call| call.feature)
            .collect()
    }
}

fn lock(record: &Mutex<Record>) -> MutexGuard<'_, Record> {
    record.lock().unwrap_or_else(PoisonError::into_inner)
}

impl FeatureEngine for SimFeatureEngine {
    fn feature(&self, name: &str) -> Result<Arc<dyn Feature>> {
        Ok(Arc::new(SimFeature {
            name: name.to_string(),
            record: self.record.clone(),
        }))
    }
}

struct SimFeature {
    name: String,
    record: Arc<Mutex<Record>>,
}

impl SimFeature {
    async fn apply(&self, action: &'static str, target: &dyn Target) -> Result<Results> {
        lock(&self.record).calls.push(FeatureCall {
            action,
            feature: self.name.clone(),
            target: target.name().to_string(),
        });

        let output = target
            .run_on_master(&format!("sim-feature {} {}", action, self.name))
            .await?;

        let mut results = Results::new();
        let host = target
            .masters()
            .await?
            .first()
            .map(|m| m.name.clone())
            .unwrap_or_default();
        let failing = lock(&self.record).failing.contains(&self.name);
        if failing || !output.is_success() {
            let message = format!("{} {} failed", action, self.name);
            results.push(action, StepResult::failed(host, message));
        } else {
            results.push(action, StepResult::ok(host));
        }
        Ok(results)
    }
}

#[async_trait]
impl Feature for SimFeature {
    fn name(&self) -> &str {
        &self.name
    }

    async fn add(
        &self,
        target: &dyn Target,
        _variables: &Variables,
        _settings: &FeatureSettings,
    ) -> Result<Results> {
        let results = self.apply("add", target).await?;
        if results.successful() {
            lock(&self.record).installed.insert(self.name.clone());
        }
        Ok(results)
    }

    async fn check(
        &self,
        target: &dyn Target,
        _variables: &Variables,
        _settings: &FeatureSettings,
    ) -> Result<Results> {
        let mut results = self.apply("check", target).await?;
        if !lock(&self.record).installed.contains(&self.name) {
            results.push("check", StepResult::failed(target.name(), "not installed"));
        }
        Ok(results)
    }

    async fn remove(
        &self,
        target: &dyn Target,
        _variables: &Variables,
        _settings: &FeatureSettings,
    ) -> Result<Results> {
        let results = self.apply("remove", target).await?;
        if results.successful() {
            lock(&self.record).installed.remove(&self.name);
        }
        Ok(results)
    }
}
