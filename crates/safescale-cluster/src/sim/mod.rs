//! In-process collaborators to drive clusters without a cloud
//!
//! [`SimStack`] keeps networks and hosts in memory and fails on demand,
//! [`SimSsh`] answers commands from a script and [`SimFeatureEngine`] records
//! feature actions. [`session`] wires them into a [`Session`] with short
//! timeouts.

mod features;
mod ssh;
mod stack;

pub use features::{FeatureCall, SimFeatureEngine};
pub use ssh::SimSsh;
pub use stack::SimStack;

use crate::metadata::{MemoryBackend, MetadataBackend};
use crate::session::Session;
use safescale_utils::temporal::Timeouts;
use std::sync::Arc;
use std::time::Duration;

/// Simulated collaborators of a session
#[derive(Clone)]
pub struct Sim {
    /// Provider stack
    pub stack: Arc<SimStack>,
    /// SSH executor
    pub ssh: Arc<SimSsh>,
    /// Feature engine
    pub features: Arc<SimFeatureEngine>,
    /// Metadata backend
    pub metadata: Arc<dyn MetadataBackend>,
}

impl Sim {
    /// Fresh collaborators over an in-memory metadata backend
    pub fn new() -> Self {
        Self::with_metadata(Arc::new(MemoryBackend::new()))
    }

    /// Fresh collaborators over `metadata`
    pub fn with_metadata(metadata: Arc<dyn MetadataBackend>) -> Self {
        Self {
            stack: Arc::new(SimStack::new()),
            ssh: Arc::new(SimSsh::new()),
            features: Arc::new(SimFeatureEngine::new()),
            metadata,
        }
    }

    /// Session on tenant "sim" using these collaborators
    pub fn session(&self) -> Session {
        Session::new(
            "sim",
            self.stack.clone(),
            self.ssh.clone(),
            self.features.clone(),
            self.metadata.clone(),
        )
        .with_timeouts(fast_timeouts())
    }
}

impl Default for Sim {
    fn default() -> Self {
        Self::new()
    }
}

/// Timeouts short enough for tests
pub fn fast_timeouts() -> Timeouts {
    Timeouts {
        host: Duration::from_secs(2),
        host_creation: Duration::from_secs(2),
        connection: Duration::from_millis(200),
        execution: Duration::from_secs(2),
        context: Duration::from_millis(100),
        ssh_connect: Duration::from_secs(1),
        big_delay: Duration::from_secs(1),
        default_delay: Duration::from_millis(10),
        state_collect_interval: Duration::from_secs(300),
    }
}
