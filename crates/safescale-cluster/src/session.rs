//! Collaborators shared by every controller call

use crate::feature::FeatureEngine;
use crate::metadata::MetadataBackend;
use crate::provider::Stack;
use safescale_ssh::SshExecutor;
use safescale_utils::concurrency::{JobRegistry, Spawner, ThreadSpawner};
use safescale_utils::temporal::Timeouts;
use std::sync::Arc;

/// Tenant-bound context of a request
///
/// Cloning is cheap: every collaborator is shared.
#[derive(Clone)]
pub struct Session {
    tenant: String,
    stack: Arc<dyn Stack>,
    ssh: Arc<dyn SshExecutor>,
    features: Arc<dyn FeatureEngine>,
    metadata: Arc<dyn MetadataBackend>,
    jobs: Arc<JobRegistry>,
    timeouts: Timeouts,
    spawner: Arc<dyn Spawner>,
}

impl Session {
    /// Session on `tenant` with default timeouts and a thread spawner
    pub fn new(
        tenant: impl Into<String>,
        stack: Arc<dyn Stack>,
        ssh: Arc<dyn SshExecutor>,
        features: Arc<dyn FeatureEngine>,
        metadata: Arc<dyn MetadataBackend>,
    ) -> Self {
        Self {
            tenant: tenant.into(),
            stack,
            ssh,
            features,
            metadata,
            jobs: JobRegistry::new(),
            timeouts: Timeouts::from_env(),
            spawner: Arc::new(ThreadSpawner),
        }
    }

    /// Replace the timeouts
    pub fn with_timeouts(mut self, timeouts: Timeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    /// Replace the spawner used for parallel host operations
    pub fn with_spawner(mut self, spawner: Arc<dyn Spawner>) -> Self {
        self.spawner = spawner;
        self
    }

    /// Share a job registry with other sessions
    pub fn with_jobs(mut self, jobs: Arc<JobRegistry>) -> Self {
        self.jobs = jobs;
        self
    }

    /// Tenant name
    pub fn tenant(&self) -> &str {
        &self.tenant
    }

    /// Provider stack
    pub fn stack(&self) -> &Arc<dyn Stack> {
        &self.stack
    }

    /// SSH executor
    pub fn ssh(&self) -> &Arc<dyn SshExecutor> {
        &self.ssh
    }

    /// Feature engine
    pub fn features(&self) -> &Arc<dyn FeatureEngine> {
        &self.features
    }

    /// Metadata backend
    pub fn metadata(&self) -> &Arc<dyn MetadataBackend> {
        &self.metadata
    }

    /// Registry of in-flight operations
    pub fn jobs(&self) -> &Arc<JobRegistry> {
        &self.jobs
    }

    /// Timeouts
    pub fn timeouts(&self) -> &Timeouts {
        &self.timeouts
    }

    /// Spawner for parallel host operations
    pub fn spawner(&self) -> &Arc<dyn Spawner> {
        &self.spawner
    }
}
