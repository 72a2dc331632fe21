//! Registry of in-flight operations
//!
//! Each inbound request registers its task with a description so that a
//! "stop" request can find it and cancel it. The returned [`JobGuard`]
//! deregisters the job when dropped, whatever the outcome of the request.

use super::task::{CancelHandle, Task};
use crate::scerr::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{debug, warn};
use uuid::Uuid;

struct Job {
    description: String,
    started: DateTime<Utc>,
    cancel: CancelHandle,
}

/// Public view of a registered job
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobInfo {
    /// Identifier of the job task
    pub id: Uuid,
    /// What the job does, e.g. "Create cluster demo"
    pub description: String,
    /// Registration time
    pub started: DateTime<Utc>,
}

/// Registry of in-flight jobs
#[derive(Default)]
pub struct JobRegistry {
    jobs: RwLock<HashMap<Uuid, Job>>,
    closed: AtomicBool,
}

impl JobRegistry {
    /// Create an empty registry
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Register `task`; fails if the registry is closed or the task is already known
    pub fn register(
        self: &Arc<Self>,
        task: &Task,
        cancel: CancelHandle,
        description: impl Into<String>,
    ) -> Result<JobGuard> {
        if self.closed.load(Ordering::Acquire) {
            return Err(Error::not_available("job registry is closed"));
        }

        let description = description.into();
        let mut jobs = self.jobs.write().unwrap_or_else(PoisonError::into_inner);
        if jobs.contains_key(&task.id()) {
            return Err(Error::duplicate(format!(
                "job {} already registered",
                task.id()
            )));
        }
        debug!("Registering job {}: {}", task.id(), description);
        jobs.insert(
            task.id(),
            Job {
                description,
                started: Utc::now(),
                cancel,
            },
        );

        Ok(JobGuard {
            registry: self.clone(),
            id: task.id(),
        })
    }

    /// Remove a job; returns whether it was registered
    pub fn deregister(&self, id: Uuid) -> bool {
        let mut jobs = self.jobs.write().unwrap_or_else(PoisonError::into_inner);
        let removed = jobs.remove(&id).is_some();
        if removed {
            debug!("Deregistered job {}", id);
        }
        removed
    }

    /// Cancel a registered job
    pub fn cancel(&self, id: Uuid) -> Result<()> {
        let jobs = self.jobs.read().unwrap_or_else(PoisonError::into_inner);
        match jobs.get(&id) {
            Some(job) => {
                debug!("Cancelling job {}: {}", id, job.description);
                job.cancel.cancel();
                Ok(())
            }
            None => Err(Error::not_found(format!("no job with id {}", id))),
        }
    }

    /// Jobs currently registered, oldest first
    pub fn list(&self) -> Vec<JobInfo> {
        let jobs = self.jobs.read().unwrap_or_else(PoisonError::into_inner);
        let mut list: Vec<JobInfo> = jobs
            .iter()
            .map(|(id, job)| JobInfo {
                id: *id,
                description: job.description.clone(),
                started: job.started,
            })
            .collect();
        list.sort_by_key(|info| info.started);
        list
    }

    /// Refuse further registrations
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }
}

/// Deregisters its job when dropped
#[must_use = "the job is deregistered as soon as the guard is dropped"]
pub struct JobGuard {
    registry: Arc<JobRegistry>,
    id: Uuid,
}

impl JobGuard {
    /// Identifier of the guarded job
    pub fn id(&self) -> Uuid {
        self.id
    }
}

impl Drop for JobGuard {
    fn drop(&mut self) {
        if !self.registry.deregister(self.id) {
            warn!("Job {} was already deregistered", self.id);
        }
    }
}

/// Register a job, logging instead of failing when tracing is unavailable
pub fn register_or_warn(
    registry: &Arc<JobRegistry>,
    task: &Task,
    cancel: CancelHandle,
    description: &str,
) -> Option<JobGuard> {
    match registry.register(task, cancel, description) {
        Ok(guard) => Some(guard),
        Err(e) => {
            warn!("Failed to register job '{}': {}", description, e);
            None
        }
    }
}
